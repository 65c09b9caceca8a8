//! Frame assembly on a display rank.
//!
//! A display rank owns one display's region of the wall. Worker threads
//! receive wire tiles, decode them, and copy the part that overlaps the owned
//! region into the *receiving* framebuffer of the tile's eye. A shared
//! counter, guarded by one mutex, tracks how many pixels arrived this frame.
//! The worker whose tile completes the frame, still holding the counter lock:
//!
//! 1. waits on a barrier with the tile senders,
//! 2. hands the receiving buffers to the [`FrameSink`],
//! 3. resets the counter,
//! 4. swaps the receiving and displaying buffers.
//!
//! While that worker holds the lock the assembler is *swapping*; every other
//! worker blocks before its next copy or count.
//!
//! Tiles from well-behaved renderers never overlap, so copies from different
//! workers go to disjoint pixels. Framebuffer pixels are atomics, which keeps
//! the copies lock-free without `unsafe`; overlapping tiles simply race and the
//! last store wins.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, error, info, warn};
use wall_core::{
    decode_tile, Box2i, CodecError, Decompressor, Group, ImageCodec, PixelTile, Vec2i, WallError,
    WallGeometry,
};

/// Default number of decode workers per display rank.
pub const DEFAULT_DECODE_WORKERS: usize = 8;

// ── Framebuffer ───────────────────────────────────────────────────────────────

/// One eye's pixels for one display.
pub struct PixelPlane {
    size: Vec2i,
    pixels: Box<[AtomicU32]>,
}

impl PixelPlane {
    fn new(size: Vec2i) -> Self {
        Self {
            size,
            pixels: (0..size.product()).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn size(&self) -> Vec2i {
        self.size
    }

    /// Address of the first pixel; identifies which of the two buffers this is.
    pub fn as_ptr(&self) -> *const AtomicU32 {
        self.pixels.as_ptr()
    }

    /// Pixel at display-local `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.size.x as usize + x].load(Ordering::Relaxed)
    }

    /// Copies the plane out, row-major.
    pub fn to_vec(&self) -> Vec<u32> {
        self.pixels.iter().map(|p| p.load(Ordering::Relaxed)).collect()
    }

    fn store_row(&self, x: usize, y: usize, row: &[u32]) {
        let start = y * self.size.x as usize + x;
        for (dst, &src) in self.pixels[start..start + row.len()].iter().zip(row) {
            dst.store(src, Ordering::Relaxed);
        }
    }
}

/// A completed frame as handed to the [`FrameSink`].
pub struct FrameView<'a> {
    /// Zero-based count of frames this rank has presented before this one.
    pub frame_index: u64,
    pub rank: usize,
    /// Wall pixels covered by the planes.
    pub region: Box2i,
    pub left: &'a PixelPlane,
    /// Present on stereo walls only.
    pub right: Option<&'a PixelPlane>,
}

/// Receives every completed frame, synchronously, on the completing worker.
///
/// The planes are only valid for the duration of the call; the next frame's
/// tiles are written into them after the following swap.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &FrameView<'_>);
}

impl<F> FrameSink for F
where
    F: FnMut(&FrameView<'_>) + Send,
{
    fn present(&mut self, frame: &FrameView<'_>) {
        self(frame)
    }
}

struct FrameBuffers {
    /// Indexed by eye, then by buffer.
    eyes: Vec<[PixelPlane; 2]>,
    receiving: usize,
}

struct FrameState {
    written: usize,
    frames_presented: u64,
    sink: Box<dyn FrameSink>,
}

// ── FrameAssembler ────────────────────────────────────────────────────────────

/// Assembles the frames of one display rank.
pub struct FrameAssembler {
    geometry: WallGeometry,
    rank: usize,
    owned: Box2i,
    expected: usize,
    incoming: Arc<dyn Group>,
    buffers: RwLock<FrameBuffers>,
    state: Mutex<FrameState>,
}

impl FrameAssembler {
    /// Creates the assembler for display `rank`.
    ///
    /// `incoming` is the group tiles arrive on; frame completion waits on its
    /// barrier, which the tile senders enter at the end of their frame.
    ///
    /// # Errors
    ///
    /// Returns [`WallError::Topology`] if `rank` drives no display.
    pub fn new(
        geometry: WallGeometry,
        rank: usize,
        incoming: Arc<dyn Group>,
        sink: impl FrameSink + 'static,
    ) -> Result<Self, WallError> {
        if rank >= geometry.display_count() {
            return Err(WallError::Topology {
                expected: geometry.display_count(),
                actual: rank + 1,
            });
        }
        let owned = geometry.region_of_rank(rank);
        let eyes = (0..geometry.eye_count())
            .map(|_| [PixelPlane::new(owned.size()), PixelPlane::new(owned.size())])
            .collect();
        Ok(Self {
            geometry,
            rank,
            owned,
            expected: geometry.display_pixel_count(),
            incoming,
            buffers: RwLock::new(FrameBuffers { eyes, receiving: 0 }),
            state: Mutex::new(FrameState {
                written: 0,
                frames_presented: 0,
                sink: Box::new(sink),
            }),
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The wall pixels this rank displays.
    pub fn owned_region(&self) -> Box2i {
        self.owned
    }

    /// Pixels that complete one frame on this rank.
    pub fn expected_per_frame(&self) -> usize {
        self.expected
    }

    pub fn frames_presented(&self) -> u64 {
        self.lock_state().frames_presented
    }

    pub fn written_this_frame(&self) -> usize {
        self.lock_state().written
    }

    /// Decodes one wire tile and writes it.
    ///
    /// # Errors
    ///
    /// Codec errors from decoding, plus everything [`FrameAssembler::write_tile`]
    /// returns.
    pub fn process_wire_tile(
        &self,
        decompressor: &mut dyn Decompressor,
        bytes: &[u8],
    ) -> Result<usize, WallError> {
        let tile = decode_tile(decompressor, bytes)?;
        self.write_tile(&tile)
    }

    /// Copies the part of `tile` this rank owns into the receiving buffer and
    /// accounts for it, completing the frame if it was the last piece.
    ///
    /// Returns the number of pixels written.
    ///
    /// # Errors
    ///
    /// - [`CodecError::ProtocolMismatch`] for a right-eye tile on a mono wall.
    /// - Transport errors from the completion barrier.
    pub fn write_tile(&self, tile: &PixelTile<'_>) -> Result<usize, WallError> {
        let eye = tile.eye.index();
        if eye >= self.geometry.eye_count() {
            return Err(CodecError::ProtocolMismatch(format!(
                "tile {} is for the right eye but the wall is mono",
                tile.region
            ))
            .into());
        }

        let overlap = tile.region.intersection(&self.owned);
        if overlap.is_empty() {
            return Ok(0);
        }

        {
            let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
            let plane = &buffers.eyes[eye][buffers.receiving];
            let src_x = (overlap.lower.x - tile.region.lower.x) as usize;
            let dst_x = (overlap.lower.x - self.owned.lower.x) as usize;
            let width = overlap.width() as usize;
            for y in overlap.lower.y..overlap.upper.y {
                let src = &tile.row((y - tile.region.lower.y) as usize)[src_x..src_x + width];
                plane.store_row(dst_x, (y - self.owned.lower.y) as usize, src);
            }
        }

        let written = overlap.area();
        self.account(written)?;
        Ok(written)
    }

    fn account(&self, written: usize) -> Result<(), WallError> {
        let mut state = self.lock_state();
        state.written += written;
        if state.written < self.expected {
            return Ok(());
        }
        if state.written > self.expected {
            warn!(
                rank = self.rank,
                written = state.written,
                expected = self.expected,
                "more pixels than expected this frame; tiles overlap or were duplicated"
            );
        }
        self.complete_frame(&mut state)
    }

    fn complete_frame(&self, state: &mut FrameState) -> Result<(), WallError> {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        self.incoming.barrier()?;

        let receiving = buffers.receiving;
        let view = FrameView {
            frame_index: state.frames_presented,
            rank: self.rank,
            region: self.owned,
            left: &buffers.eyes[0][receiving],
            right: buffers.eyes.get(1).map(|planes| &planes[receiving]),
        };
        state.sink.present(&view);

        state.written = 0;
        state.frames_presented += 1;
        buffers.receiving = 1 - receiving;
        debug!(
            rank = self.rank,
            frame = state.frames_presented,
            "frame presented"
        );
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `workers` receive-decode-write loops, each with its own
    /// decompressor, and blocks until one of them fails.
    ///
    /// # Errors
    ///
    /// Returns the first worker's error. The remaining workers keep running
    /// until the process exits; there is no cancellation.
    pub fn run(self: &Arc<Self>, codec: Arc<dyn ImageCodec>, workers: usize) -> Result<(), WallError> {
        let (failures, first_failure) = mpsc::channel();
        for index in 0..workers.max(1) {
            let assembler = Arc::clone(self);
            let codec = Arc::clone(&codec);
            let failures = failures.clone();
            std::thread::Builder::new()
                .name(format!("wall-decode-{}-{index}", self.rank))
                .spawn(move || {
                    if let Err(e) = assembler.worker_loop(codec.as_ref()) {
                        error!(rank = assembler.rank, worker = index, "decode worker failed: {e}");
                        let _ = failures.send(e);
                    }
                })
                .map_err(|e| WallError::Worker(format!("spawning decode worker: {e}")))?;
        }
        drop(failures);
        info!(rank = self.rank, workers, region = %self.owned, "display rank receiving tiles");

        match first_failure.recv() {
            Ok(e) => Err(e),
            Err(_) => Ok(()),
        }
    }

    fn worker_loop(&self, codec: &dyn ImageCodec) -> Result<(), WallError> {
        let mut decompressor = codec.create_decompressor()?;
        loop {
            let envelope = self.incoming.probe_and_receive()?;
            self.process_wire_tile(decompressor.as_mut(), &envelope.bytes)?;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
