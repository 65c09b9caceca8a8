//! # wall-core
//!
//! Shared library for the display wall: the geometry of the wall, the tile
//! wire codec, image codec handles, and the transport interface that links
//! renderers, the optional head-node relay and the display processes.
//!
//! # Architecture overview (for beginners)
//!
//! A display wall is a grid of physical screens driven as one big canvas.
//! Each screen is driven by its own *display process*. Renderers (the
//! *clients*) draw rectangular pieces of the canvas, called *tiles*, and send
//! each tile straight to every display it overlaps. A display assembles the
//! pieces into its part of the frame and, once every pixel of the wall has
//! arrived, all displays swap to the new frame together.
//!
//! This crate is the common foundation:
//!
//! - **`domain`** – The [`WallGeometry`]: display grid, bezels, and the
//!   arrangement that maps display positions to process ranks.
//!
//! - **`protocol`** – How tiles become bytes (a 24-byte header plus a
//!   compressed payload) and back, plus the geometry announcement and the
//!   service info record.
//!
//! - **`compression`** – Pluggable image codecs (raw, zstd, quantized) with
//!   per-thread compressor and decompressor handles.
//!
//! - **`transport`** – The process-group abstraction (ranks, messages,
//!   broadcast, barriers, splits, rendezvous) and an in-process
//!   implementation used by the launcher and the tests.

pub mod compression;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `wall_core::WallGeometry` instead of `wall_core::domain::geometry::WallGeometry`.
pub use compression::{
    build_codec, CodecKind, Compressor, CompressorPool, Decompressor, ImageCodec, PayloadFormat,
};
pub use domain::geometry::{
    Arrangement, Box2i, GeometryError, Vec2f, Vec2i, WallGeometry,
};
pub use error::{ErrorKind, WallError};
pub use protocol::{
    decode_geometry, decode_tile, encode_geometry, encode_tile, get_region, split_side_by_side,
    AnnounceError, CodecError, Eye, PixelTile, ServiceInfo, WireTile,
};
pub use transport::local::LocalFabric;
pub use transport::{BroadcastRole, Envelope, Group, Rendezvous, TransportError};
