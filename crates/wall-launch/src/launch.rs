//! One-process bring-up of service, head node and renderers.
//!
//! Every rank runs on its own OS thread; the async side only waits for
//! events from them and hosts the info responder.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info};

use wall_client::{read_port_name, run_test_render, share_endpoint, Client, TestRender};
use wall_core::{build_codec, Group, ImageCodec, LocalFabric, Rendezvous, ServiceInfo, WallError};
use wall_service::infrastructure::network::info_server::{InfoServer, InfoServerError};
use wall_service::infrastructure::storage::config::{ConfigError, ServiceConfig};
use wall_service::infrastructure::storage::port_file::PortFile;
use wall_service::{serve, EndpointPublisher, FrameView, ServicePlan};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for [`launch`].
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("info responder: {0}")]
    InfoServer(#[from] InfoServerError),

    #[error("failed to start thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("service rank {rank} stopped: {source}")]
    Service {
        rank: usize,
        #[source]
        source: WallError,
    },

    #[error("render rank {rank} failed: {source}")]
    Client {
        rank: usize,
        #[source]
        source: WallError,
    },

    #[error("at least one render client is required")]
    NoClients,

    #[error("all ranks went away before the run finished")]
    ChannelClosed,
}

// ── Events ────────────────────────────────────────────────────────────────────

enum Event {
    Published(String),
    Presented { rank: usize, frame: u64, checksum: u32 },
    ServiceStopped { rank: usize, error: WallError },
    ClientsDone(Result<(), LaunchError>),
}

/// Writes the port file, then tells the launcher the endpoint name.
struct AnnouncingPortFile {
    file: PortFile,
    events: UnboundedSender<Event>,
}

impl EndpointPublisher for AnnouncingPortFile {
    fn publish(&self, endpoint: &str) -> std::io::Result<()> {
        self.file.publish(endpoint)?;
        self.events
            .send(Event::Published(endpoint.to_string()))
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "launcher gone"))
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// What a completed run looked like.
#[derive(Debug, Clone)]
pub struct LaunchReport {
    /// Frames presented, indexed by display rank.
    pub frames_per_display: Vec<u64>,
    /// Where the info responder listened.
    pub info_addr: SocketAddr,
    pub elapsed: Duration,
}

/// Runs a wall described by `config` until every display has presented
/// `config.render.frames` frames.
///
/// Service rank threads keep running after this returns; they end with the
/// process.
///
/// # Errors
///
/// Configuration and responder errors, or the first failure of any rank.
pub async fn launch(config: &ServiceConfig) -> Result<LaunchReport, LaunchError> {
    let started = Instant::now();
    if config.render.clients == 0 {
        return Err(LaunchError::NoClients);
    }
    let geometry = config.geometry()?;
    let codec = build_codec(config.compression.codec, config.compression.quality);
    let fabric = Arc::new(LocalFabric::new());
    let (events_tx, mut events) = mpsc::unbounded_channel();

    info!(
        geometry = %geometry,
        service_ranks = config.service_ranks(),
        clients = config.render.clients,
        head_node = config.service.head_node,
        "launching display wall"
    );

    let plan = ServicePlan {
        geometry,
        head_node: config.service.head_node,
        codec: Arc::clone(&codec),
        decode_workers: config.service.decode_workers,
    };
    let publisher = Arc::new(AnnouncingPortFile {
        file: PortFile::new(&config.service.port_file),
        events: events_tx.clone(),
    });
    for member in fabric.world(config.service_ranks()) {
        spawn_service_rank(member, &fabric, &publisher, &plan, events_tx.clone())?;
    }

    let endpoint = loop {
        match events.recv().await {
            Some(Event::Published(name)) => break name,
            Some(Event::ServiceStopped { rank, error }) => {
                return Err(LaunchError::Service { rank, source: error })
            }
            Some(_) => {}
            None => return Err(LaunchError::ChannelClosed),
        }
    };

    let info = InfoServer::start(
        &config.service.info_bind_address,
        config.service.info_port,
        &ServiceInfo::new(&endpoint, &geometry),
    )
    .await?;

    let render = TestRender {
        frames: config.render.frames,
        tile_size: config.render.tile_size,
    };
    spawn_clients(
        &fabric,
        config.render.clients,
        render,
        config.service.port_file.clone(),
        codec,
        events_tx,
    )?;

    let mut presented = vec![0u64; geometry.display_count()];
    let mut clients_done = false;
    while !(clients_done && presented.iter().all(|&n| n >= render.frames)) {
        match events.recv().await {
            Some(Event::Presented {
                rank,
                frame,
                checksum,
            }) => {
                debug!(rank, frame, checksum = %format!("{checksum:08x}"), "frame presented");
                if let Some(count) = presented.get_mut(rank) {
                    *count += 1;
                }
            }
            Some(Event::ClientsDone(result)) => {
                result?;
                clients_done = true;
            }
            Some(Event::ServiceStopped { rank, error }) => {
                return Err(LaunchError::Service { rank, source: error })
            }
            Some(Event::Published(_)) => {}
            None => return Err(LaunchError::ChannelClosed),
        }
    }

    let info_addr = info.local_addr();
    info.shutdown();
    Ok(LaunchReport {
        frames_per_display: presented,
        info_addr,
        elapsed: started.elapsed(),
    })
}

// ── Rank threads ──────────────────────────────────────────────────────────────

fn spawn_service_rank(
    member: Arc<dyn Group>,
    fabric: &Arc<LocalFabric>,
    publisher: &Arc<AnnouncingPortFile>,
    plan: &ServicePlan,
    events: UnboundedSender<Event>,
) -> Result<(), LaunchError> {
    let rank = member.rank();
    let (fabric, publisher, plan) = (Arc::clone(fabric), Arc::clone(publisher), plan.clone());
    thread::Builder::new()
        .name(format!("wall-service-{rank}"))
        .spawn(move || {
            let presented = events.clone();
            let sink = move |frame: &FrameView<'_>| {
                let _ = presented.send(Event::Presented {
                    rank: frame.rank,
                    frame: frame.frame_index,
                    checksum: checksum(frame),
                });
            };
            if let Err(e) = serve(&member, fabric.as_ref(), publisher.as_ref(), &plan, sink) {
                error!(rank, "service rank stopped: {e}");
                let _ = events.send(Event::ServiceStopped { rank, error: e });
            }
        })?;
    Ok(())
}

fn spawn_clients(
    fabric: &Arc<LocalFabric>,
    clients: usize,
    render: TestRender,
    port_file: PathBuf,
    codec: Arc<dyn ImageCodec>,
    events: UnboundedSender<Event>,
) -> Result<(), LaunchError> {
    let fabric = Arc::clone(fabric);
    thread::Builder::new()
        .name("wall-render".into())
        .spawn(move || {
            let outcomes: Vec<Result<(), WallError>> = thread::scope(|s| {
                let handles: Vec<_> = fabric
                    .world(clients)
                    .into_iter()
                    .map(|member| {
                        let (fabric, codec, port_file) = (&fabric, &codec, &port_file);
                        s.spawn(move || {
                            render_client(
                                member.as_ref(),
                                fabric.as_ref(),
                                port_file,
                                codec,
                                &render,
                            )
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(WallError::Worker("render thread panicked".into()))
                        })
                    })
                    .collect()
            });
            let result = outcomes
                .into_iter()
                .enumerate()
                .try_for_each(|(rank, outcome)| {
                    outcome.map_err(|source| LaunchError::Client { rank, source })
                });
            let _ = events.send(Event::ClientsDone(result));
        })?;
    Ok(())
}

fn render_client(
    me: &dyn Group,
    rendezvous: &dyn Rendezvous,
    port_file: &Path,
    codec: &Arc<dyn ImageCodec>,
    render: &TestRender,
) -> Result<(), WallError> {
    let endpoint = share_endpoint(me, || read_port_name(port_file))?;
    let client = Client::connect(me, rendezvous, &endpoint, Arc::clone(codec))?;
    run_test_render(&client, render)
}

/// Order-sensitive hash of the left-eye plane, for spotting frames that
/// differ between runs.
fn checksum(frame: &FrameView<'_>) -> u32 {
    let size = frame.left.size();
    let mut hash = 0x811c_9dc5u32;
    for y in 0..size.y.max(0) as usize {
        for x in 0..size.x.max(0) as usize {
            hash = (hash ^ frame.left.get(x, y)).wrapping_mul(0x0100_0193);
        }
    }
    hash
}
