//! Application layer use cases for the wall service.
//!
//! Use cases here orchestrate `wall_core` types over the abstract
//! [`wall_core::Group`] and [`wall_core::Rendezvous`] traits; they never touch
//! files or sockets directly.
//!
//! # Sub-modules
//!
//! - **`assemble_frames`** – Runs on every display rank. Decodes incoming
//!   tiles on a pool of worker threads, copies them into the rank's receiving
//!   framebuffer, and presents the frame once every pixel has arrived.
//!
//! - **`dispatch_tiles`** – Runs on the head node, if there is one. Forwards
//!   each tile unchanged to the display ranks it overlaps.
//!
//! - **`bring_up`** – Splits the service world into head node and displays,
//!   accepts the renderers' connection and announces the wall geometry.

pub mod assemble_frames;
pub mod bring_up;
pub mod dispatch_tiles;
