//! Everything that crosses a process boundary: pixel tiles and their wire
//! codec, the geometry announcement, and the service info record.

pub mod announce;
pub mod codec;
pub mod service_info;
pub mod tile;

pub use announce::{decode_geometry, encode_geometry, AnnounceError};
pub use codec::{decode_tile, encode_tile, get_region, CodecError, WireTile};
pub use service_info::ServiceInfo;
pub use tile::{split_side_by_side, Eye, PixelTile};
