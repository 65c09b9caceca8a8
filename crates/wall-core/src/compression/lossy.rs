//! Lossy codec: per-channel bit-depth reduction followed by zstd.
//!
//! Payload layout: `[shift:1][zstd frame]`. Every 8-bit channel keeps its
//! `8 - shift` high bits; decoding restores the dropped bits at the middle
//! of the quantisation step, so the error per channel never exceeds
//! `2^(shift-1)`. Zeroed low bits make the stream far more compressible.

use super::lossless::{ZstdCompressor, ZstdDecompressor, DEFAULT_ZSTD_LEVEL};
use super::{pack_rows, unpack_pixels, Compressor, Decompressor, ImageCodec, PayloadFormat};
use crate::protocol::codec::CodecError;

/// Lossy codec with a quality level in `1..=100`; 100 is lossless.
#[derive(Debug, Clone, Copy)]
pub struct QuantizedCodec {
    shift: u8,
}

impl QuantizedCodec {
    pub fn new(quality: u8) -> Self {
        let quality = quality.clamp(1, 100) as u32;
        // 1 + round(quality * 7 / 100) kept bits, between 1 and 8
        let kept_bits = 1 + (quality * 7 + 50) / 100;
        Self {
            shift: 8 - kept_bits as u8,
        }
    }

    /// Upper bound on the absolute difference of any decoded channel.
    pub fn max_channel_error(&self) -> u8 {
        half_step(self.shift) as u8
    }
}

/// Per-pixel masks with the dropped low bits of every channel cleared / set.
fn channel_masks(shift: u8) -> (u32, u32) {
    let low = (1u32 << shift) - 1;
    let low_all = low | low << 8 | low << 16 | low << 24;
    let half = half_step(shift);
    let half_all = half | half << 8 | half << 16 | half << 24;
    (!low_all, half_all)
}

fn half_step(shift: u8) -> u32 {
    if shift == 0 {
        0
    } else {
        1u32 << (shift - 1)
    }
}

struct QuantizedCompressor {
    shift: u8,
    inner: ZstdCompressor,
    scratch: Vec<u32>,
    packed: Vec<u8>,
}

struct QuantizedDecompressor {
    inner: ZstdDecompressor,
}

impl ImageCodec for QuantizedCodec {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Quantized
    }

    fn create_compressor(&self) -> Result<Box<dyn Compressor>, CodecError> {
        Ok(Box::new(QuantizedCompressor {
            shift: self.shift,
            inner: ZstdCompressor::new(DEFAULT_ZSTD_LEVEL)?,
            scratch: Vec::new(),
            packed: Vec::new(),
        }))
    }

    fn create_decompressor(&self) -> Result<Box<dyn Decompressor>, CodecError> {
        Ok(Box::new(QuantizedDecompressor {
            inner: ZstdDecompressor::new()?,
        }))
    }
}

impl Compressor for QuantizedCompressor {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Quantized
    }

    fn compress(
        &mut self,
        pixels: &[u32],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let (keep, _) = channel_masks(self.shift);
        self.scratch.clear();
        for y in 0..height {
            let row = &pixels[y * pitch..y * pitch + width];
            self.scratch.extend(row.iter().map(|p| p & keep));
        }
        self.packed.clear();
        pack_rows(&mut self.packed, &self.scratch, width, height, width);

        let body = self.inner.compress_bytes(&self.packed)?;
        let mut payload = Vec::with_capacity(1 + body.len());
        payload.push(self.shift);
        payload.extend_from_slice(&body);
        Ok(payload)
    }
}

impl Decompressor for QuantizedDecompressor {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Quantized
    }

    fn decompress(
        &mut self,
        payload: &[u8],
        width: usize,
        height: usize,
        out: &mut [u32],
    ) -> Result<(), CodecError> {
        let (&shift, body) = payload
            .split_first()
            .ok_or_else(|| CodecError::CorruptTile("empty quantized payload".to_string()))?;
        if shift > 7 {
            return Err(CodecError::CorruptTile(format!(
                "quantization shift {shift} out of range"
            )));
        }
        let expected = width * height * 4;
        if expected == 0 {
            return Ok(());
        }
        let bytes = self.inner.decompress_bytes(body, expected)?;
        unpack_pixels(&bytes, out)?;

        let (_, half) = channel_masks(shift);
        for p in out.iter_mut() {
            *p |= half;
        }
        Ok(())
    }

    fn decoded_pixel_bound(&self, payload: &[u8]) -> Result<usize, CodecError> {
        let body = payload.get(1..).unwrap_or_default();
        Ok(ZstdDecompressor::declared_len(body)? / 4)
    }
}
