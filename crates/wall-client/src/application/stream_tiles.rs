//! The client side of the tile stream.
//!
//! # How a tile reaches the wall (for beginners)
//!
//! The renderer hands the client a rectangle of pixels positioned in wall
//! pixel space. The client asks the geometry which displays that rectangle
//! overlaps, compresses the tile once, and sends the identical bytes to the
//! rank that owns each of those displays. A tile that straddles four
//! displays is sent four times; one that lies entirely past the wall's edge
//! is sent nowhere.
//!
//! After the last tile of a frame every client rank calls
//! [`Client::end_frame`], a barrier against the display side.

use std::io;
use std::sync::Arc;

use tracing::{debug, info};
use wall_core::{
    decode_geometry, encode_tile, split_side_by_side, BroadcastRole, CodecError, CompressorPool,
    Group, ImageCodec, PixelTile, Rendezvous, TransportError, WallError, WallGeometry,
};

/// Makes an endpoint name that only rank 0 of `me` can discover known to
/// every member.
///
/// Collective over `me`. `resolve` runs on rank 0 only.
///
/// # Errors
///
/// [`WallError::Io`] if `resolve` fails, transport errors from the broadcast.
pub fn share_endpoint(
    me: &dyn Group,
    resolve: impl FnOnce() -> io::Result<String>,
) -> Result<String, WallError> {
    let mut name = Vec::new();
    if me.rank() == 0 {
        name = resolve()?.into_bytes();
        me.broadcast(BroadcastRole::Root, &mut name)?;
    } else {
        me.broadcast(BroadcastRole::Receive { root: 0 }, &mut name)?;
    }
    String::from_utf8(name).map_err(|e| {
        TransportError::Failure(format!("endpoint name is not UTF-8: {e}")).into()
    })
}

/// One rank of a renderer connected to a display wall.
///
/// `Client` is `Sync`: render threads may call [`Client::write_tile`]
/// concurrently. Each call borrows a compressor from an internal pool.
pub struct Client {
    rank: usize,
    size: usize,
    displays: Arc<dyn Group>,
    geometry: WallGeometry,
    compressors: CompressorPool,
}

impl Client {
    /// Connects the renderer group `me` to the service accepting on
    /// `endpoint` and receives the wall geometry.
    ///
    /// Collective over `me`.
    ///
    /// # Errors
    ///
    /// - Transport errors from the rendezvous or the geometry broadcast.
    /// - [`WallError::Announce`] if the geometry record is malformed.
    /// - [`WallError::Topology`] if the service has a different number of
    ///   ranks than the announced wall has displays.
    pub fn connect(
        me: &dyn Group,
        rendezvous: &dyn Rendezvous,
        endpoint: &str,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<Self, WallError> {
        me.barrier()?;
        let displays = rendezvous.connect(me, endpoint)?;
        me.barrier()?;

        let mut bytes = Vec::new();
        displays.broadcast(BroadcastRole::Receive { root: 0 }, &mut bytes)?;
        let geometry = decode_geometry(&bytes)?;
        if displays.remote_size() != geometry.display_count() {
            return Err(WallError::Topology {
                expected: geometry.display_count(),
                actual: displays.remote_size(),
            });
        }
        if me.rank() == 0 {
            info!(geometry = %geometry, "connected to display wall");
        }
        Ok(Self::from_parts(me.rank(), me.size(), displays, geometry, codec))
    }

    /// Builds a client around an already established link to the displays.
    pub fn from_parts(
        rank: usize,
        size: usize,
        displays: Arc<dyn Group>,
        geometry: WallGeometry,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self {
            rank,
            size,
            displays,
            geometry,
            compressors: CompressorPool::new(codec),
        }
    }

    /// This rank within the renderer group.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the renderer group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The geometry the service announced.
    pub fn geometry(&self) -> &WallGeometry {
        &self.geometry
    }

    /// Sends `tile` to every display it overlaps and returns how many sends
    /// that took.
    ///
    /// # Errors
    ///
    /// - [`CodecError::ProtocolMismatch`] for a right-eye tile on a mono wall.
    /// - Codec errors from compression, transport errors from the sends.
    pub fn write_tile(&self, tile: &PixelTile<'_>) -> Result<usize, WallError> {
        if tile.eye.index() >= self.geometry.eye_count() {
            return Err(CodecError::ProtocolMismatch(format!(
                "{:?} eye tile for a mono wall",
                tile.eye
            ))
            .into());
        }
        let affected = self.geometry.affected_displays(&tile.region);
        if affected.is_empty() {
            debug!(region = %tile.region, "tile lies outside the wall");
            return Ok(0);
        }

        let wire = {
            let mut compressor = self.compressors.checkout()?;
            encode_tile(&mut *compressor, tile)?
        };
        let mut sent = 0;
        for coord in affected.cells() {
            self.displays
                .send(self.geometry.rank_of_display(coord), wire.as_bytes())?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Sends a tile of a side-by-side stereo image, where the right eye is
    /// drawn to the right of the left one in a picture twice the wall's width.
    ///
    /// # Errors
    ///
    /// See [`Client::write_tile`].
    pub fn write_side_by_side_tile(&self, tile: &PixelTile<'_>) -> Result<usize, WallError> {
        let true_screen_width = self.geometry.total_pixels().x;
        let mut sent = 0;
        for part in split_side_by_side(tile, true_screen_width) {
            sent += self.write_tile(&part)?;
        }
        Ok(sent)
    }

    /// Marks the end of this rank's tiles for the current frame.
    ///
    /// Collective over the renderer group and the display side.
    ///
    /// # Errors
    ///
    /// Transport errors from the barrier.
    pub fn end_frame(&self) -> Result<(), WallError> {
        self.displays.barrier()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    use mockall::mock;
    use wall_core::compression::RawCodec;
    use wall_core::{Arrangement, Box2i, Envelope, ErrorKind, Eye, LocalFabric, Vec2f, Vec2i};

    mock! {
        pub Peers {}

        impl Group for Peers {
            fn rank(&self) -> usize;
            fn size(&self) -> usize;
            fn remote_size(&self) -> usize;
            fn is_inter(&self) -> bool;
            fn send(&self, target: usize, bytes: &[u8]) -> Result<(), TransportError>;
            fn probe_and_receive(&self) -> Result<Envelope, TransportError>;
            fn broadcast(&self, role: BroadcastRole, data: &mut Vec<u8>) -> Result<(), TransportError>;
            fn barrier(&self) -> Result<(), TransportError>;
            fn split(&self, color: u32, key: usize) -> Result<Arc<dyn Group>, TransportError>;
            fn split_with_bridge(
                &self,
                color: u32,
                key: usize,
                peer_color: u32,
            ) -> Result<(Arc<dyn Group>, Arc<dyn Group>), TransportError>;
        }
    }

    type SendLog = Arc<Mutex<Vec<(usize, Vec<u8>)>>>;

    fn geometry(stereo: bool) -> WallGeometry {
        WallGeometry::new(
            Vec2i::new(2, 2),
            Vec2i::new(10, 10),
            Vec2f::default(),
            Arrangement::XIncYInc,
            stereo,
        )
        .expect("valid geometry")
    }

    fn recording_peers(times: usize) -> (MockPeers, SendLog) {
        let log: SendLog = Arc::default();
        let mut peers = MockPeers::new();
        let sink = Arc::clone(&log);
        peers.expect_send().times(times).returning(move |target, bytes| {
            sink.lock().expect("log").push((target, bytes.to_vec()));
            Ok(())
        });
        (peers, log)
    }

    fn client(peers: MockPeers, stereo: bool) -> Client {
        Client::from_parts(0, 1, Arc::new(peers), geometry(stereo), Arc::new(RawCodec))
    }

    fn tile(region: Box2i, eye: Eye) -> PixelTile<'static> {
        PixelTile::packed(region, eye, vec![7; region.area()]).expect("tile")
    }

    #[test]
    fn test_write_tile_sends_identical_bytes_to_each_overlapped_display() {
        // Arrange
        let (peers, log) = recording_peers(4);
        let client = client(peers, false);

        // Act
        let sent = client
            .write_tile(&tile(Box2i::new(Vec2i::new(5, 5), Vec2i::new(15, 15)), Eye::Left))
            .expect("write");

        // Assert
        assert_eq!(sent, 4);
        let log = log.lock().expect("log");
        let targets: Vec<usize> = log.iter().map(|(t, _)| *t).collect();
        assert_eq!(targets, vec![0, 1, 2, 3]);
        assert!(log.iter().all(|(_, bytes)| *bytes == log[0].1));
    }

    #[test]
    fn test_tile_outside_the_wall_is_not_sent() {
        let client = client(MockPeers::new(), false);

        let sent = client
            .write_tile(&tile(Box2i::new(Vec2i::new(30, 0), Vec2i::new(40, 10)), Eye::Left))
            .expect("write");

        assert_eq!(sent, 0);
    }

    #[test]
    fn test_right_eye_tile_on_mono_wall_is_rejected() {
        let client = client(MockPeers::new(), false);

        let err = client
            .write_tile(&tile(Box2i::new(Vec2i::ZERO, Vec2i::new(4, 4)), Eye::Right))
            .expect_err("must fail");

        assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
    }

    #[test]
    fn test_side_by_side_tile_straddling_the_midline_goes_to_both_eyes() {
        // Arrange: the double-wide picture is 40 pixels across; this tile
        // covers x 15..25, so 15..20 is left eye and 0..5 is right eye
        let (peers, log) = recording_peers(2);
        let client = client(peers, true);

        // Act
        let sent = client
            .write_side_by_side_tile(&tile(
                Box2i::new(Vec2i::new(15, 0), Vec2i::new(25, 5)),
                Eye::Left,
            ))
            .expect("write");

        // Assert: header byte 2 carries the eye
        assert_eq!(sent, 2);
        let log = log.lock().expect("log");
        assert_eq!((log[0].0, log[0].1[2]), (1, Eye::Left as u8));
        assert_eq!((log[1].0, log[1].1[2]), (0, Eye::Right as u8));
    }

    #[test]
    fn test_end_frame_is_a_barrier_on_the_display_link() {
        let mut peers = MockPeers::new();
        peers.expect_barrier().times(1).returning(|| Ok(()));
        let client = client(peers, false);

        client.end_frame().expect("barrier");
    }

    #[test]
    fn test_share_endpoint_resolves_on_rank_zero_only() {
        let fabric = LocalFabric::new();

        let names: Vec<String> = thread::scope(|s| {
            let handles: Vec<_> = fabric
                .world(3)
                .into_iter()
                .map(|member| {
                    s.spawn(move || {
                        let rank = member.rank();
                        share_endpoint(member.as_ref(), || {
                            assert_eq!(rank, 0, "only rank 0 resolves");
                            Ok("wall-port-shared".to_string())
                        })
                        .expect("share")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("thread")).collect()
        });

        assert!(names.iter().all(|n| n == "wall-port-shared"));
    }
}
