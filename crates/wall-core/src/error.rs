//! Crate-wide error type.
//!
//! Each module keeps its own error enum; [`WallError`] gathers them for the
//! service and client entry points, and [`ErrorKind`] maps every failure onto
//! the small set of categories callers branch on.

use thiserror::Error;

use crate::domain::geometry::GeometryError;
use crate::protocol::announce::AnnounceError;
use crate::protocol::codec::CodecError;
use crate::transport::TransportError;

/// Coarse failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The wall geometry names an arrangement (or shape) that cannot exist.
    InvalidArrangement,
    /// A transport call failed; the session cannot continue.
    TransportFailure,
    /// A tile envelope or payload is malformed.
    CorruptTile,
    /// The peer speaks a different protocol version or payload format, or
    /// sent data the receiver cannot use (such as a right-eye tile to a mono
    /// wall).
    ProtocolMismatch,
    /// The process topology or local setup does not match the configuration.
    Configuration,
}

/// Any failure of the wall engine.
#[derive(Debug, Error)]
pub enum WallError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Announce(#[from] AnnounceError),

    /// The number of display processes differs from the wall's display count.
    #[error("wall has {expected} displays but {actual} display processes are running")]
    Topology { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker thread could not be started or panicked.
    #[error("worker thread failed: {0}")]
    Worker(String),
}

impl WallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WallError::Geometry(_) | WallError::Announce(AnnounceError::Geometry(_)) => {
                ErrorKind::InvalidArrangement
            }
            WallError::Announce(AnnounceError::Truncated { .. }) => ErrorKind::ProtocolMismatch,
            WallError::Codec(CodecError::ProtocolMismatch(_)) => ErrorKind::ProtocolMismatch,
            WallError::Codec(_) => ErrorKind::CorruptTile,
            WallError::Transport(_) => ErrorKind::TransportFailure,
            WallError::Topology { .. } | WallError::Io(_) | WallError::Worker(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_bad_arrangement() {
        let err = WallError::from(GeometryError::InvalidArrangement(12));
        assert_eq!(err.kind(), ErrorKind::InvalidArrangement);
        let err = WallError::from(AnnounceError::Geometry(GeometryError::InvalidArrangement(-1)));
        assert_eq!(err.kind(), ErrorKind::InvalidArrangement);
    }

    #[test]
    fn test_kind_separates_corrupt_from_mismatch() {
        let corrupt = WallError::from(CodecError::CorruptTile("short".into()));
        let mismatch = WallError::from(CodecError::ProtocolMismatch("v9".into()));
        assert_eq!(corrupt.kind(), ErrorKind::CorruptTile);
        assert_eq!(mismatch.kind(), ErrorKind::ProtocolMismatch);
    }

    #[test]
    fn test_kind_of_transport_failure() {
        let err = WallError::from(TransportError::Disconnected("gone".into()));
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn test_topology_message_names_both_counts() {
        let err = WallError::Topology {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let msg = err.to_string();
        assert!(msg.contains('4') && msg.contains('3'));
    }
}
