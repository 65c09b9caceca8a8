//! wall-client library entry point.
//!
//! Shared by the `wall-info` binary, the launcher and the integration tests
//! in `tests/`.
//!
//! # What does wall-client do? (for beginners)
//!
//! A *client* is one rank of a renderer: a group of processes that together
//! draw each frame of the wall image. The client library:
//!
//! 1. Connects the renderer group to a running wall service and receives the
//!    wall geometry the service announces.
//! 2. Takes each rendered pixel tile, works out which displays it overlaps,
//!    compresses it once and sends the same bytes to every one of them.
//! 3. Ends each frame with a barrier against the display side, so no rank
//!    races ahead into the next frame.
//!
//! The `wall-info` binary asks a running service for its endpoint name and
//! wall size over TCP, which is all a renderer needs before connecting.

/// Application layer: the client API and the test-pattern renderer.
pub mod application;

/// Infrastructure layer: port-name file and service info query.
pub mod infrastructure;

pub use application::render_test_pattern::{
    render_test_frame, run_test_render, test_pattern_pixel, TestRender,
};
pub use application::stream_tiles::{share_endpoint, Client};
pub use infrastructure::network::info_query::{
    fetch_service_info, query_service_info, InfoQueryError,
};
pub use infrastructure::storage::port_file::read_port_name;
