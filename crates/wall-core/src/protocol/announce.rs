//! Wire form of the wall geometry announced to connecting clients.
//!
//! ```text
//! [num_displays.x:4][num_displays.y:4]
//! [pixels_per_display.x:4][pixels_per_display.y:4]
//! [bezel.x:f32][bezel.y:f32]
//! [arrangement:4][stereo:4]
//! ```
//! 32 bytes, little-endian, sent as one broadcast from the service root.

use thiserror::Error;

use crate::domain::geometry::{GeometryError, Vec2f, Vec2i, WallGeometry};

/// Size in bytes of an encoded geometry announcement.
pub const ANNOUNCE_SIZE: usize = 32;

/// Errors raised while decoding a geometry announcement.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnnounceError {
    #[error("geometry announcement too short: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("announced geometry is invalid: {0}")]
    Geometry(#[from] GeometryError),
}

/// Encodes the geometry fields in broadcast order.
pub fn encode_geometry(geometry: &WallGeometry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ANNOUNCE_SIZE);
    let nd = geometry.num_displays();
    let ppd = geometry.pixels_per_display();
    let bezel = geometry.relative_bezel();
    for v in [nd.x, nd.y, ppd.x, ppd.y] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&bezel.x.to_le_bytes());
    buf.extend_from_slice(&bezel.y.to_le_bytes());
    buf.extend_from_slice(&geometry.arrangement().code().to_le_bytes());
    buf.extend_from_slice(&i32::from(geometry.stereo()).to_le_bytes());
    buf
}

/// Decodes an announcement and validates the resulting geometry.
///
/// # Errors
///
/// Returns [`AnnounceError::Truncated`] for short buffers and
/// [`AnnounceError::Geometry`] (including `InvalidArrangement`) for field
/// values no valid wall can have.
pub fn decode_geometry(bytes: &[u8]) -> Result<WallGeometry, AnnounceError> {
    if bytes.len() < ANNOUNCE_SIZE {
        return Err(AnnounceError::Truncated {
            needed: ANNOUNCE_SIZE,
            available: bytes.len(),
        });
    }
    let word = |i: usize| {
        let mut b = [0u8; 4];
        b.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
        b
    };
    let int = |i: usize| i32::from_le_bytes(word(i));
    let float = |i: usize| f32::from_le_bytes(word(i));

    let geometry = WallGeometry::from_raw(
        Vec2i::new(int(0), int(1)),
        Vec2i::new(int(2), int(3)),
        Vec2f::new(float(4), float(5)),
        int(6),
        int(7) != 0,
    )?;
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Arrangement;

    #[test]
    fn test_announcement_round_trip_keeps_every_field() {
        let g = WallGeometry::new(
            Vec2i::new(16, 8),
            Vec2i::new(1920, 1080),
            Vec2f::new(0.05, 0.075),
            Arrangement::XIncYDec,
            true,
        )
        .expect("valid");
        let bytes = encode_geometry(&g);
        assert_eq!(bytes.len(), ANNOUNCE_SIZE);
        assert_eq!(decode_geometry(&bytes), Ok(g));
    }

    #[test]
    fn test_announcement_field_order() {
        let g = WallGeometry::new(
            Vec2i::new(3, 2),
            Vec2i::new(640, 480),
            Vec2f::default(),
            Arrangement::YDecXInc,
            false,
        )
        .expect("valid");
        let bytes = encode_geometry(&g);
        assert_eq!(&bytes[0..4], &3i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &640i32.to_le_bytes());
        assert_eq!(&bytes[24..28], &6i32.to_le_bytes());
        assert_eq!(&bytes[28..32], &0i32.to_le_bytes());
    }

    #[test]
    fn test_bad_arrangement_code_is_rejected() {
        let g = WallGeometry::new(
            Vec2i::new(1, 1),
            Vec2i::new(10, 10),
            Vec2f::default(),
            Arrangement::XIncYInc,
            false,
        )
        .expect("valid");
        let mut bytes = encode_geometry(&g);
        bytes[24..28].copy_from_slice(&9i32.to_le_bytes());
        assert_eq!(
            decode_geometry(&bytes),
            Err(AnnounceError::Geometry(GeometryError::InvalidArrangement(9)))
        );
    }

    #[test]
    fn test_short_announcement_is_truncated() {
        assert_eq!(
            decode_geometry(&[0u8; 20]),
            Err(AnnounceError::Truncated {
                needed: ANNOUNCE_SIZE,
                available: 20
            })
        );
    }
}
