//! Service description returned by the info responder.
//!
//! Clients that only know a host and port ask the service for the endpoint
//! name they must connect to. The record is `bincode`-encoded and framed with
//! a `u32` little-endian length prefix.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::{Vec2i, WallGeometry};

/// Upper bound on a framed record; anything larger is rejected unread.
pub const MAX_SERVICE_INFO_LEN: usize = 64 * 1024;

/// What a running wall service tells a prospective client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Rendezvous endpoint name to pass to `connect`.
    pub endpoint_name: String,
    /// Pixel extent of the wall, bezels included.
    pub total_pixels: Vec2i,
    pub stereo: bool,
}

impl ServiceInfo {
    pub fn new(endpoint_name: impl Into<String>, geometry: &WallGeometry) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            total_pixels: geometry.total_pixels(),
            stereo: geometry.stereo(),
        }
    }

    /// The answer for a service that could not be reached: no endpoint and
    /// zero pixels.
    pub fn unavailable() -> Self {
        Self {
            endpoint_name: String::new(),
            total_pixels: Vec2i::ZERO,
            stereo: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.total_pixels.x > 0 && self.total_pixels.y > 0
    }

    /// Serialises the record with its length prefix.
    ///
    /// # Errors
    ///
    /// Returns the `bincode` error if serialisation fails.
    pub fn to_frame(&self) -> Result<Vec<u8>, bincode::Error> {
        let body = bincode::serialize(self)?;
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Deserialises a frame body (the bytes after the length prefix).
    ///
    /// # Errors
    ///
    /// Returns the `bincode` error if the body is malformed.
    pub fn from_frame_body(body: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::{Arrangement, Vec2f};

    #[test]
    fn test_frame_carries_length_prefix_and_body() {
        let g = WallGeometry::new(
            Vec2i::new(2, 1),
            Vec2i::new(100, 50),
            Vec2f::default(),
            Arrangement::XIncYInc,
            true,
        )
        .expect("valid");
        let info = ServiceInfo::new("wall-port-test", &g);

        let frame = info.to_frame().expect("serialize");
        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;

        assert_eq!(len, frame.len() - 4);
        let back = ServiceInfo::from_frame_body(&frame[4..]).expect("deserialize");
        assert_eq!(back, info);
        assert_eq!(back.total_pixels, Vec2i::new(200, 50));
        assert!(back.stereo);
    }

    #[test]
    fn test_unavailable_reports_zero_pixels() {
        let info = ServiceInfo::unavailable();
        assert!(!info.is_available());
        assert_eq!(info.total_pixels, Vec2i::ZERO);
    }

    #[test]
    fn test_garbage_body_is_an_error() {
        assert!(ServiceInfo::from_frame_body(&[0xFF; 3]).is_err());
    }
}
