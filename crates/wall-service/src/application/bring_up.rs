//! Service bring-up.
//!
//! # Topologies (for beginners)
//!
//! Without a head node every service rank is a display, and the displays
//! together accept the renderers' connection. Renderers then send tiles
//! straight to the displays they overlap.
//!
//! With a head node, world rank 0 becomes a relay: the world is split into a
//! one-member dispatch group and the display group, linked by a bridge
//! (an inter-group). Only the dispatch group faces outward, so renderers see
//! a single-display wall covering the true wall size and send everything to
//! the head node, which forwards each tile to the right displays.
//!
//! ```text
//! no head node:   renderers ══ displays
//! head node:      renderers ══ head ══ displays
//! ```

use std::sync::Arc;

use tracing::info;
use wall_core::{
    encode_geometry, BroadcastRole, Group, ImageCodec, Rendezvous, TransportError, WallError,
    WallGeometry,
};

use super::assemble_frames::{FrameAssembler, FrameSink};
use super::dispatch_tiles::Dispatcher;

/// Makes a freshly opened endpoint name known to prospective clients.
pub trait EndpointPublisher: Send + Sync {
    /// # Errors
    ///
    /// Returns the I/O error if the name cannot be published.
    fn publish(&self, endpoint: &str) -> std::io::Result<()>;
}

/// What a service rank does after the world has been split.
pub enum ServiceRole {
    /// The head node: accepts renderers on `dispatch` and relays to `displays`.
    Dispatcher {
        /// One-member intra-group facing the renderers.
        dispatch: Arc<dyn Group>,
        /// Bridge to the display group.
        displays: Arc<dyn Group>,
    },
    /// A display rank.
    Display {
        /// Intra-group of all display ranks.
        displays: Arc<dyn Group>,
        /// Bridge to the head node, if there is one.
        head: Option<Arc<dyn Group>>,
    },
}

/// Splits the service world according to the topology.
///
/// Collective over `world`.
///
/// # Errors
///
/// Transport errors from the split or the closing barrier.
pub fn setup_communications(
    world: &Arc<dyn Group>,
    head_node: bool,
) -> Result<ServiceRole, WallError> {
    if !head_node {
        if world.rank() == 0 {
            info!(displays = world.size(), "service running without head node");
        }
        return Ok(ServiceRole::Display {
            displays: Arc::clone(world),
            head: None,
        });
    }

    let is_head = world.rank() == 0;
    let (color, peer_color) = if is_head { (1, 2) } else { (2, 1) };
    let (local, bridge) = world.split_with_bridge(color, world.rank(), peer_color)?;
    world.barrier()?;
    if is_head {
        info!(
            displays = bridge.remote_size(),
            "world rank 0 is the head node"
        );
        Ok(ServiceRole::Dispatcher {
            dispatch: local,
            displays: bridge,
        })
    } else {
        Ok(ServiceRole::Display {
            displays: local,
            head: Some(bridge),
        })
    }
}

/// Waits for a client group to connect to the outward-facing group `me` and
/// announces the wall geometry to it.
///
/// Collective over `me`. Rank 0 opens the endpoint and publishes its name;
/// every member then takes part in the accept.
///
/// # Errors
///
/// Transport errors, and [`WallError::Io`] if publishing fails.
pub fn wait_for_connection(
    me: &dyn Group,
    rendezvous: &dyn Rendezvous,
    geometry: &WallGeometry,
    publisher: &dyn EndpointPublisher,
) -> Result<Arc<dyn Group>, WallError> {
    me.barrier()?;
    info!(
        rank = me.rank(),
        size = me.size(),
        "outward facing rank waiting for outside connection"
    );
    me.barrier()?;

    let mut name = Vec::new();
    if me.rank() == 0 {
        let endpoint = rendezvous.listen()?;
        publisher.publish(&endpoint)?;
        info!(endpoint = %endpoint, "endpoint published");
        name = endpoint.into_bytes();
        me.broadcast(BroadcastRole::Root, &mut name)?;
    } else {
        me.broadcast(BroadcastRole::Receive { root: 0 }, &mut name)?;
    }
    let endpoint = String::from_utf8(name)
        .map_err(|e| TransportError::Failure(format!("endpoint name is not UTF-8: {e}")))?;

    let outside = rendezvous.accept(me, &endpoint)?;
    if me.rank() == 0 {
        info!("communication established");
    }
    announce_geometry(me, outside.as_ref(), geometry)?;
    me.barrier()?;
    Ok(outside)
}

/// Broadcasts the wall geometry from `me`'s rank 0 across `outside`.
///
/// A lone outward-facing rank (the head node) announces a single display the
/// size of the whole wall instead, hiding the internal tiling.
///
/// # Errors
///
/// Transport errors from the broadcast.
pub fn announce_geometry(
    me: &dyn Group,
    outside: &dyn Group,
    geometry: &WallGeometry,
) -> Result<(), WallError> {
    let announced = if me.size() == 1 {
        geometry.faked_single_display()
    } else {
        *geometry
    };
    let mut bytes = encode_geometry(&announced);
    let role = if me.rank() == 0 {
        BroadcastRole::Root
    } else {
        BroadcastRole::Idle
    };
    outside.broadcast(role, &mut bytes)?;
    if me.rank() == 0 {
        info!(geometry = %announced, "geometry announced to client");
    }
    Ok(())
}

/// How a service world is laid out and what it runs.
#[derive(Clone)]
pub struct ServicePlan {
    pub geometry: WallGeometry,
    pub head_node: bool,
    pub codec: Arc<dyn ImageCodec>,
    pub decode_workers: usize,
}

/// Brings up one service rank and runs it until a fatal error.
///
/// The head node relays tiles; every display rank assembles frames and hands
/// them to `sink`.
///
/// # Errors
///
/// [`WallError::Topology`] if the number of display ranks differs from the
/// wall's display count, plus every error of the steps above.
pub fn serve(
    world: &Arc<dyn Group>,
    rendezvous: &dyn Rendezvous,
    publisher: &dyn EndpointPublisher,
    plan: &ServicePlan,
    sink: impl FrameSink + 'static,
) -> Result<(), WallError> {
    let geometry = plan.geometry;
    match setup_communications(world, plan.head_node)? {
        ServiceRole::Dispatcher { dispatch, displays } => {
            let outside = wait_for_connection(dispatch.as_ref(), rendezvous, &geometry, publisher)?;
            Dispatcher::new(outside, displays, geometry).run()
        }
        ServiceRole::Display { displays, head } => {
            if displays.size() != geometry.display_count() {
                return Err(WallError::Topology {
                    expected: geometry.display_count(),
                    actual: displays.size(),
                });
            }
            let incoming = match head {
                Some(bridge) => bridge,
                None => wait_for_connection(displays.as_ref(), rendezvous, &geometry, publisher)?,
            };
            let assembler = Arc::new(FrameAssembler::new(
                geometry,
                displays.rank(),
                incoming,
                sink,
            )?);
            assembler.run(Arc::clone(&plan.codec), plan.decode_workers)
        }
    }
}
