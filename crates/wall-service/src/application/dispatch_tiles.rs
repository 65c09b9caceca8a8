//! Head-node tile relay.
//!
//! With a head node, renderers send every tile to one process instead of to
//! the displays directly. The dispatcher reads each tile's region from its
//! header, without decompressing, and forwards the unchanged bytes to every
//! display rank the region overlaps.
//!
//! It also counts the wall pixels it has relayed. Once a whole frame's worth
//! has passed through, it joins the renderers' end-of-frame barrier and then
//! the displays' completion barrier, so no renderer can start the next frame
//! before every display has swapped.

use std::sync::Arc;

use tracing::{debug, info, warn};
use wall_core::{get_region, Box2i, Group, WallError, WallGeometry};

/// Where one tile went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Display ranks the tile was forwarded to.
    pub targets: Vec<usize>,
    /// Whether this tile completed the frame.
    pub frame_completed: bool,
}

/// Relays tiles from the renderers to the displays.
pub struct Dispatcher {
    outside: Arc<dyn Group>,
    displays: Arc<dyn Group>,
    geometry: WallGeometry,
    wall: Box2i,
    expected: usize,
    counted: usize,
    frames: u64,
}

impl Dispatcher {
    /// `outside` is the inter-group to the renderers, `displays` the
    /// inter-group to the display ranks.
    pub fn new(outside: Arc<dyn Group>, displays: Arc<dyn Group>, geometry: WallGeometry) -> Self {
        Self {
            outside,
            displays,
            geometry,
            wall: geometry.wall_region(),
            expected: geometry.total_pixel_count(),
            counted: 0,
            frames: 0,
        }
    }

    /// Pixels relayed so far in the current frame.
    pub fn counted_this_frame(&self) -> usize {
        self.counted
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames
    }

    /// Receives one tile from any renderer and relays it.
    ///
    /// # Errors
    ///
    /// Transport errors, or a codec error if the tile header is malformed.
    pub fn dispatch_one(&mut self) -> Result<DispatchOutcome, WallError> {
        let envelope = self.outside.probe_and_receive()?;
        self.forward(&envelope.bytes)
    }

    /// Relays one encoded tile and accounts for its wall pixels.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch_one`].
    pub fn forward(&mut self, bytes: &[u8]) -> Result<DispatchOutcome, WallError> {
        let region = get_region(bytes)?;
        let targets: Vec<usize> = self
            .geometry
            .affected_displays(&region)
            .cells()
            .map(|coord| self.geometry.rank_of_display(coord))
            .collect();
        for &target in &targets {
            self.displays.send(target, bytes)?;
        }

        self.counted += region.intersection(&self.wall).area();
        let frame_completed = self.counted >= self.expected;
        if frame_completed {
            if self.counted > self.expected {
                warn!(
                    counted = self.counted,
                    expected = self.expected,
                    "relayed more pixels than one frame holds"
                );
            }
            self.outside.barrier()?;
            self.displays.barrier()?;
            self.counted = 0;
            self.frames += 1;
            debug!(frame = self.frames, "dispatcher frame complete");
        }

        Ok(DispatchOutcome {
            targets,
            frame_completed,
        })
    }

    /// Relays tiles until a transport error occurs.
    ///
    /// # Errors
    ///
    /// The first error [`Dispatcher::dispatch_one`] returns.
    pub fn run(mut self) -> Result<(), WallError> {
        info!(
            displays = self.displays.remote_size(),
            renderers = self.outside.remote_size(),
            "dispatcher running"
        );
        loop {
            self.dispatch_one()?;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
