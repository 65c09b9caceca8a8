//! Criterion benchmarks for wall geometry lookups.
//!
//! `affected_displays` and `rank_of_display` run once per tile on the send
//! path, so they must stay far below the cost of compressing the tile.
//!
//! Run with:
//! ```bash
//! cargo bench --package wall-core --bench geometry_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wall_core::{Arrangement, Box2i, Vec2f, Vec2i, WallGeometry};

fn big_wall() -> WallGeometry {
    WallGeometry::new(
        Vec2i::new(16, 8),
        Vec2i::new(1920, 1080),
        Vec2f::new(0.05, 0.05),
        Arrangement::YDecXInc,
        true,
    )
    .expect("valid geometry")
}

fn bench_affected_displays(c: &mut Criterion) {
    let g = big_wall();
    let mut group = c.benchmark_group("affected_displays");
    for size in [32, 256, 2048] {
        let rect = Box2i::from_origin_size(Vec2i::new(5000, 3000), Vec2i::new(size, size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rect, |b, rect| {
            b.iter(|| g.affected_displays(black_box(rect)))
        });
    }
    group.finish();
}

fn bench_rank_of_display(c: &mut Criterion) {
    let g = big_wall();
    c.bench_function("rank_of_display_full_grid", |b| {
        b.iter(|| {
            Box2i::new(Vec2i::ZERO, g.num_displays())
                .cells()
                .map(|coord| g.rank_of_display(black_box(coord)))
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_affected_displays, bench_rank_of_display);
criterion_main!(benches);
