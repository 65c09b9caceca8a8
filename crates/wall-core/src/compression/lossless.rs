//! Lossless codecs: raw packed pixels and zstd-compressed pixels.

use zstd::bulk;

use super::{pack_rows, unpack_pixels, Compressor, Decompressor, ImageCodec, PayloadFormat};
use crate::protocol::codec::CodecError;

/// Default zstd level: fast enough for per-frame streaming.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

// ── Raw ───────────────────────────────────────────────────────────────────────

/// Sends pixels uncompressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

struct RawCompressor;
struct RawDecompressor;

impl ImageCodec for RawCodec {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Raw
    }

    fn create_compressor(&self) -> Result<Box<dyn Compressor>, CodecError> {
        Ok(Box::new(RawCompressor))
    }

    fn create_decompressor(&self) -> Result<Box<dyn Decompressor>, CodecError> {
        Ok(Box::new(RawDecompressor))
    }
}

impl Compressor for RawCompressor {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Raw
    }

    fn compress(
        &mut self,
        pixels: &[u32],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        pack_rows(&mut out, pixels, width, height, pitch);
        Ok(out)
    }
}

impl Decompressor for RawDecompressor {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Raw
    }

    fn decompress(
        &mut self,
        payload: &[u8],
        _width: usize,
        _height: usize,
        out: &mut [u32],
    ) -> Result<(), CodecError> {
        unpack_pixels(payload, out)
    }

    fn decoded_pixel_bound(&self, payload: &[u8]) -> Result<usize, CodecError> {
        Ok(payload.len() / 4)
    }
}

// ── Zstd ──────────────────────────────────────────────────────────────────────

/// Packs pixels little-endian and compresses them with zstd.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

/// Owns a reusable zstd compression context and a packing buffer.
pub(crate) struct ZstdCompressor {
    context: bulk::Compressor<'static>,
    scratch: Vec<u8>,
}

impl ZstdCompressor {
    pub(crate) fn new(level: i32) -> Result<Self, CodecError> {
        let context = bulk::Compressor::new(level)
            .map_err(|e| CodecError::Compression(format!("zstd context: {e}")))?;
        Ok(Self {
            context,
            scratch: Vec::new(),
        })
    }

    /// Compresses already packed bytes.
    pub(crate) fn compress_bytes(&mut self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.context
            .compress(bytes)
            .map_err(|e| CodecError::Compression(format!("zstd encode failed: {e}")))
    }
}

/// Owns a reusable zstd decompression context.
pub(crate) struct ZstdDecompressor {
    context: bulk::Decompressor<'static>,
}

impl ZstdDecompressor {
    pub(crate) fn new() -> Result<Self, CodecError> {
        let context = bulk::Decompressor::new()
            .map_err(|e| CodecError::Compression(format!("zstd context: {e}")))?;
        Ok(Self { context })
    }

    /// Content size a zstd frame declares in its header.
    pub(crate) fn declared_len(payload: &[u8]) -> Result<usize, CodecError> {
        match zstd::zstd_safe::get_frame_content_size(payload) {
            Ok(Some(len)) => usize::try_from(len).map_err(|_| {
                CodecError::CorruptTile(format!("zstd frame declares {len} bytes"))
            }),
            Ok(None) => Err(CodecError::CorruptTile(
                "zstd frame does not declare its size".to_string(),
            )),
            Err(_) => Err(CodecError::CorruptTile(
                "payload is not a zstd frame".to_string(),
            )),
        }
    }

    /// Decompresses into exactly `expected` bytes.
    pub(crate) fn decompress_bytes(
        &mut self,
        payload: &[u8],
        expected: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let bytes = self
            .context
            .decompress(payload, expected)
            .map_err(|e| CodecError::CorruptTile(format!("zstd decode failed: {e}")))?;
        if bytes.len() != expected {
            return Err(CodecError::CorruptTile(format!(
                "zstd payload expands to {} bytes, region needs {expected}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl ImageCodec for ZstdCodec {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Zstd
    }

    fn create_compressor(&self) -> Result<Box<dyn Compressor>, CodecError> {
        Ok(Box::new(ZstdCompressor::new(self.level)?))
    }

    fn create_decompressor(&self) -> Result<Box<dyn Decompressor>, CodecError> {
        Ok(Box::new(ZstdDecompressor::new()?))
    }
}

impl Compressor for ZstdCompressor {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Zstd
    }

    fn compress(
        &mut self,
        pixels: &[u32],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        pack_rows(&mut scratch, pixels, width, height, pitch);
        let result = self.compress_bytes(&scratch);
        self.scratch = scratch;
        result
    }
}

impl Decompressor for ZstdDecompressor {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Zstd
    }

    fn decompress(
        &mut self,
        payload: &[u8],
        width: usize,
        height: usize,
        out: &mut [u32],
    ) -> Result<(), CodecError> {
        let expected = width * height * 4;
        if expected == 0 {
            return Ok(());
        }
        let bytes = self.decompress_bytes(payload, expected)?;
        unpack_pixels(&bytes, out)
    }

    fn decoded_pixel_bound(&self, payload: &[u8]) -> Result<usize, CodecError> {
        Ok(Self::declared_len(payload)? / 4)
    }
}
