//! wall-launch library entry point.
//!
//! # What does the launcher do? (for beginners)
//!
//! A real display wall runs its service ranks on the cluster nodes that
//! drive the screens and its renderer on other machines. The launcher runs
//! all of them as threads of one process, connected by the in-process
//! transport fabric, so the whole pipeline can be watched end to end:
//!
//! 1. The service ranks come up, split off a head node if configured, and
//!    publish their endpoint name to the port file.
//! 2. The info responder starts answering `wall-info` queries.
//! 3. The render clients read the port file, connect, and stream a moving
//!    test pattern for the configured number of frames.
//! 4. The launcher returns once every display has presented every frame.

pub mod launch;

pub use launch::{launch, LaunchError, LaunchReport};
