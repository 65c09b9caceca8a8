//! Image codec handles used by the tile codec.
//!
//! An [`ImageCodec`] is a shareable factory. Each worker thread asks it for
//! its own [`Compressor`] or [`Decompressor`] once and reuses that handle for
//! every tile: handles carry backend contexts and scratch buffers that are
//! expensive to build, and they are not meant to be shared between threads.
//!
//! | Codec              | Format byte | Lossless |
//! |--------------------|-------------|----------|
//! | [`RawCodec`]       | 0           | yes      |
//! | [`ZstdCodec`]      | 1           | yes      |
//! | [`QuantizedCodec`] | 2           | no       |

pub mod lossless;
pub mod lossy;
pub mod pool;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::CodecError;

pub use lossless::{RawCodec, ZstdCodec};
pub use lossy::QuantizedCodec;
pub use pool::{CompressorPool, PooledCompressor};

/// Payload layout tag carried in every tile header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadFormat {
    Raw = 0,
    Zstd = 1,
    Quantized = 2,
}

impl TryFrom<u8> for PayloadFormat {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PayloadFormat::Raw),
            1 => Ok(PayloadFormat::Zstd),
            2 => Ok(PayloadFormat::Quantized),
            other => Err(CodecError::ProtocolMismatch(format!(
                "unknown payload format 0x{other:02X}"
            ))),
        }
    }
}

/// Compresses pixel rectangles into payload bytes.
pub trait Compressor: Send {
    fn format(&self) -> PayloadFormat;

    /// Compresses `height` rows of `width` pixels, `pitch` pixels apart.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Compression`] if the backend fails.
    fn compress(
        &mut self,
        pixels: &[u32],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Restores pixel rectangles from payload bytes.
pub trait Decompressor: Send {
    fn format(&self) -> PayloadFormat;

    /// Decompresses `payload` into `out`, which holds exactly
    /// `width * height` tightly packed pixels.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptTile`] when the payload is malformed or
    /// does not yield exactly `width * height` pixels.
    fn decompress(
        &mut self,
        payload: &[u8],
        width: usize,
        height: usize,
        out: &mut [u32],
    ) -> Result<(), CodecError>;

    /// Most pixels `payload` can restore, read from its framing without
    /// decompressing. Callers check a declared region against it before
    /// allocating the output.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptTile`] when the framing is unreadable.
    fn decoded_pixel_bound(&self, payload: &[u8]) -> Result<usize, CodecError>;
}

/// Factory for compressor and decompressor handles.
pub trait ImageCodec: Send + Sync {
    fn format(&self) -> PayloadFormat;

    /// # Errors
    ///
    /// Returns [`CodecError::Compression`] if the backend context cannot be created.
    fn create_compressor(&self) -> Result<Box<dyn Compressor>, CodecError>;

    /// # Errors
    ///
    /// Returns [`CodecError::Compression`] if the backend context cannot be created.
    fn create_decompressor(&self) -> Result<Box<dyn Decompressor>, CodecError>;
}

/// Codec selection as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    Raw,
    #[default]
    Zstd,
    Quantized,
}

/// Builds the codec named by `kind`. `quality` (1..=100) only affects lossy codecs.
pub fn build_codec(kind: CodecKind, quality: u8) -> Arc<dyn ImageCodec> {
    match kind {
        CodecKind::Raw => Arc::new(RawCodec),
        CodecKind::Zstd => Arc::new(ZstdCodec::default()),
        CodecKind::Quantized => Arc::new(QuantizedCodec::new(quality)),
    }
}

// ── Shared pixel packing ──────────────────────────────────────────────────────

/// Appends `height` rows of `width` pixels as little-endian bytes.
pub(crate) fn pack_rows(out: &mut Vec<u8>, pixels: &[u32], width: usize, height: usize, pitch: usize) {
    out.reserve(width * height * 4);
    for y in 0..height {
        let row = &pixels[y * pitch..y * pitch + width];
        for p in row {
            out.extend_from_slice(&p.to_le_bytes());
        }
    }
}

/// Converts packed little-endian bytes back into pixels.
pub(crate) fn unpack_pixels(bytes: &[u8], out: &mut [u32]) -> Result<(), CodecError> {
    if bytes.len() != out.len() * 4 {
        return Err(CodecError::CorruptTile(format!(
            "payload holds {} bytes, region needs {}",
            bytes.len(),
            out.len() * 4
        )));
    }
    for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *dst = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format_rejects_unknown_byte() {
        assert!(matches!(
            PayloadFormat::try_from(9),
            Err(CodecError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_build_codec_matches_kind() {
        assert_eq!(build_codec(CodecKind::Raw, 90).format(), PayloadFormat::Raw);
        assert_eq!(build_codec(CodecKind::Zstd, 90).format(), PayloadFormat::Zstd);
        assert_eq!(
            build_codec(CodecKind::Quantized, 90).format(),
            PayloadFormat::Quantized
        );
    }

    #[test]
    fn test_pack_rows_skips_padding() {
        let pixels = [1u32, 2, 99, 3, 4, 99];
        let mut out = Vec::new();
        pack_rows(&mut out, &pixels, 2, 2, 3);
        let mut back = [0u32; 4];
        unpack_pixels(&out, &mut back).expect("unpack");
        assert_eq!(back, [1, 2, 3, 4]);
    }
}
