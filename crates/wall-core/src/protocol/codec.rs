//! Binary codec for pixel tiles on the wire.
//!
//! Wire format:
//! ```text
//! [version:1][format:1][eye:1][reserved:1]
//! [lower.x:4][lower.y:4][upper.x:4][upper.y:4]
//! [payload_len:4][payload:N]
//! ```
//! Total header size: 24 bytes. All multi-byte integers are little-endian.
//!
//! The payload is produced by a [`Compressor`] and its layout depends on the
//! `format` byte. A relay can route a tile by reading only the header
//! ([`get_region`]), without touching the payload.

use thiserror::Error;

use crate::compression::{Compressor, Decompressor, PayloadFormat};
use crate::domain::geometry::{Box2i, Vec2i};
use crate::protocol::tile::{Eye, PixelTile};

/// Current tile protocol version.
pub const TILE_PROTOCOL_VERSION: u8 = 1;

/// Size in bytes of the fixed tile header.
pub const TILE_HEADER_SIZE: usize = 24;

/// Errors that can occur while encoding or decoding tiles.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    /// The envelope is shorter than its header or declared payload.
    #[error("truncated tile: need at least {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The payload does not decode to the pixel count its region declares.
    #[error("corrupt tile: {0}")]
    CorruptTile(String),

    /// The tile was produced by an incompatible peer.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The compression backend failed.
    #[error("compression failed: {0}")]
    Compression(String),
}

/// An encoded tile, ready to be sent as one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTile(Vec<u8>);

impl WireTile {
    /// Wraps received bytes. No validation happens until decoding.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The decoded fixed header of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    pub format: PayloadFormat,
    pub eye: Eye,
    pub region: Box2i,
    pub payload_len: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `tile` into a wire envelope using `compressor`.
///
/// # Errors
///
/// Returns [`CodecError::Compression`] if the compressor fails.
pub fn encode_tile(
    compressor: &mut dyn Compressor,
    tile: &PixelTile<'_>,
) -> Result<WireTile, CodecError> {
    let payload = compressor.compress(&tile.pixels, tile.width(), tile.height(), tile.pitch)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::Compression(format!("payload of {} bytes exceeds u32", payload.len()))
    })?;

    let mut buf = Vec::with_capacity(TILE_HEADER_SIZE + payload.len());
    buf.push(TILE_PROTOCOL_VERSION);
    buf.push(compressor.format() as u8);
    buf.push(tile.eye as u8);
    buf.push(0x00); // reserved
    for v in [
        tile.region.lower.x,
        tile.region.lower.y,
        tile.region.upper.x,
        tile.region.upper.y,
    ] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(WireTile(buf))
}

/// Decodes a wire envelope into an owned, tightly packed tile.
///
/// The output buffer is sized from the header's region, but only after the
/// payload's framing shows it can fill that region.
///
/// # Errors
///
/// - [`CodecError::Truncated`] / [`CodecError::CorruptTile`] for malformed
///   envelopes or payloads that do not fill the declared region exactly.
/// - [`CodecError::ProtocolMismatch`] for an unknown version, eye or payload
///   format, or a format this decompressor does not handle.
pub fn decode_tile(
    decompressor: &mut dyn Decompressor,
    bytes: &[u8],
) -> Result<PixelTile<'static>, CodecError> {
    let header = read_header(bytes)?;
    if header.format != decompressor.format() {
        return Err(CodecError::ProtocolMismatch(format!(
            "tile payload is {:?}, decompressor expects {:?}",
            header.format,
            decompressor.format()
        )));
    }

    let width = header.region.width() as usize;
    let height = header.region.height() as usize;
    let payload = &bytes[TILE_HEADER_SIZE..];
    let count = width.checked_mul(height).ok_or_else(|| {
        CodecError::CorruptTile(format!("region {} is too large", header.region))
    })?;
    if count > 0 {
        let bound = decompressor.decoded_pixel_bound(payload)?;
        if count > bound {
            return Err(CodecError::CorruptTile(format!(
                "region {} needs {count} pixels, payload holds at most {bound}",
                header.region
            )));
        }
    }

    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(count)
        .map_err(|e| CodecError::CorruptTile(format!("cannot hold {count} pixels: {e}")))?;
    pixels.resize(count, 0);
    decompressor.decompress(payload, width, height, &mut pixels)?;

    PixelTile::packed(header.region, header.eye, pixels)
}

/// Extracts a tile's region without decompressing it.
///
/// # Errors
///
/// Same header checks as [`decode_tile`].
pub fn get_region(bytes: &[u8]) -> Result<Box2i, CodecError> {
    Ok(read_header(bytes)?.region)
}

/// Parses and validates the fixed header.
///
/// # Errors
///
/// See [`decode_tile`].
pub fn read_header(bytes: &[u8]) -> Result<TileHeader, CodecError> {
    require_len(bytes, TILE_HEADER_SIZE)?;

    let version = bytes[0];
    if version != TILE_PROTOCOL_VERSION {
        return Err(CodecError::ProtocolMismatch(format!(
            "unsupported tile protocol version {version}"
        )));
    }
    let format = PayloadFormat::try_from(bytes[1])?;
    let eye = Eye::try_from(bytes[2])?;

    let region = Box2i::new(
        Vec2i::new(read_i32(bytes, 4), read_i32(bytes, 8)),
        Vec2i::new(read_i32(bytes, 12), read_i32(bytes, 16)),
    );
    // Extents must be non-negative and representable, or later size math overflows.
    let extent = |lo: i32, hi: i32| hi.checked_sub(lo).filter(|d| *d >= 0);
    if extent(region.lower.x, region.upper.x).is_none()
        || extent(region.lower.y, region.upper.y).is_none()
    {
        return Err(CodecError::CorruptTile(format!("invalid region {region}")));
    }

    let payload_len = read_u32(bytes, 20) as usize;
    let available = bytes.len() - TILE_HEADER_SIZE;
    if payload_len != available {
        return Err(CodecError::CorruptTile(format!(
            "header declares {payload_len} payload bytes, envelope carries {available}"
        )));
    }

    Ok(TileHeader {
        format,
        eye,
        region,
        payload_len,
    })
}

// ── Low-level byte helpers ────────────────────────────────────────────────────

fn require_len(bytes: &[u8], needed: usize) -> Result<(), CodecError> {
    if bytes.len() < needed {
        Err(CodecError::Truncated {
            needed,
            available: bytes.len(),
        })
    } else {
        Ok(())
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(b)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(b)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
