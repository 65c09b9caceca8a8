//! Criterion benchmarks for the tile codec.
//!
//! Measures encode and decode of one tile with every image codec, at the
//! tile sizes renderers typically send.
//!
//! Run with:
//! ```bash
//! cargo bench --package wall-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wall_core::{
    build_codec, decode_tile, encode_tile, Box2i, CodecKind, Eye, PixelTile, Vec2i,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A smooth gradient, closer to rendered content than random noise.
fn gradient(size: i32) -> Vec<u32> {
    (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as u32, (i / size) as u32);
            0xFF00_0000 | ((x + y) & 0xFF) << 16 | (y & 0xFF) << 8 | (x & 0xFF)
        })
        .collect()
}

const CODECS: [CodecKind; 3] = [CodecKind::Raw, CodecKind::Zstd, CodecKind::Quantized];

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_tile");
    for size in [32, 128] {
        let pixels = gradient(size);
        let region = Box2i::from_origin_size(Vec2i::new(64, 64), Vec2i::new(size, size));
        let tile = PixelTile::borrowed(region, size as usize, Eye::Left, &pixels).expect("tile");
        for kind in CODECS {
            let mut compressor = build_codec(kind, 80).create_compressor().expect("compressor");
            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}"), size),
                &tile,
                |b, tile| b.iter(|| encode_tile(compressor.as_mut(), black_box(tile))),
            );
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_tile");
    for size in [32, 128] {
        let pixels = gradient(size);
        let region = Box2i::from_origin_size(Vec2i::new(64, 64), Vec2i::new(size, size));
        let tile = PixelTile::borrowed(region, size as usize, Eye::Left, &pixels).expect("tile");
        for kind in CODECS {
            let codec = build_codec(kind, 80);
            let mut compressor = codec.create_compressor().expect("compressor");
            let wire = encode_tile(compressor.as_mut(), &tile).expect("encode");
            let mut decompressor = codec.create_decompressor().expect("decompressor");
            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}"), size),
                &wire,
                |b, wire| b.iter(|| decode_tile(decompressor.as_mut(), black_box(wire.as_bytes()))),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
