//! wall-service library entry point.
//!
//! Everything that runs on the service side of a display wall: the frame
//! assembler on each display rank, the optional head-node relay, the
//! bring-up protocol that connects the service to a group of renderers, and
//! the file and network adapters around them.

pub mod application;
pub mod infrastructure;

pub use application::assemble_frames::{FrameAssembler, FrameSink, FrameView, PixelPlane};
pub use application::bring_up::{
    announce_geometry, serve, setup_communications, wait_for_connection, EndpointPublisher,
    ServicePlan, ServiceRole,
};
pub use application::dispatch_tiles::{DispatchOutcome, Dispatcher};
