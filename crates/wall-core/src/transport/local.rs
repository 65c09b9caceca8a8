//! In-process transport fabric.
//!
//! Every "process" is a thread holding an [`Arc<dyn Group>`]. Point-to-point
//! traffic and broadcasts use separate unbounded `crossbeam-channel`
//! mailboxes per member, so a broadcast never interleaves with tile traffic.
//! Collectives (barrier, split) share one `std::sync::Barrier` per group.
//! Rendezvous endpoints live in a registry owned by [`LocalFabric`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Barrier, Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};
use uuid::Uuid;

use super::{BroadcastRole, Envelope, Group, Rendezvous, TransportError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Shared group state ────────────────────────────────────────────────────────

struct Channel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Channel<T> {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

/// The mailboxes of one side of a group.
struct Side {
    mailboxes: Vec<Channel<Envelope>>,
    broadcasts: Vec<Channel<Vec<u8>>>,
}

impl Side {
    fn new(size: usize) -> Self {
        Self {
            mailboxes: (0..size).map(|_| Channel::new()).collect(),
            broadcasts: (0..size).map(|_| Channel::new()).collect(),
        }
    }

    fn size(&self) -> usize {
        self.mailboxes.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitRequest {
    color: u32,
    key: usize,
    peer: Option<u32>,
}

struct SplitOutcome {
    intra: LocalGroup,
    bridge: Option<LocalGroup>,
}

/// Rendezvous point for collective splits: requests in, outcomes out.
struct SplitBoard {
    requests: Vec<Option<SplitRequest>>,
    outcomes: Vec<Option<Result<SplitOutcome, TransportError>>>,
}

/// State shared by every member handle of one group.
struct Comm {
    id: Uuid,
    sides: Vec<Side>,
    barrier: Barrier,
    board: Mutex<SplitBoard>,
}

impl Comm {
    fn intra(size: usize) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sides: vec![Side::new(size)],
            barrier: Barrier::new(size),
            board: Mutex::new(SplitBoard {
                requests: vec![None; size],
                outcomes: (0..size).map(|_| None).collect(),
            }),
        })
    }

    fn inter(local: usize, remote: usize) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sides: vec![Side::new(local), Side::new(remote)],
            barrier: Barrier::new(local + remote),
            board: Mutex::new(SplitBoard {
                requests: Vec::new(),
                outcomes: Vec::new(),
            }),
        })
    }
}

// ── Member handle ─────────────────────────────────────────────────────────────

/// One member's handle on an in-process group.
#[derive(Clone)]
pub struct LocalGroup {
    comm: Arc<Comm>,
    side: usize,
    rank: usize,
}

impl std::fmt::Debug for LocalGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGroup")
            .field("comm", &self.comm.id)
            .field("side", &self.side)
            .field("rank", &self.rank)
            .finish()
    }
}

impl LocalGroup {
    fn local(&self) -> &Side {
        &self.comm.sides[self.side]
    }

    fn remote(&self) -> &Side {
        let index = if self.comm.sides.len() == 2 {
            1 - self.side
        } else {
            self.side
        };
        &self.comm.sides[index]
    }

    fn collective_split(&self, request: SplitRequest) -> Result<SplitOutcome, TransportError> {
        if self.is_inter() {
            return Err(TransportError::Failure(
                "split is only defined on intra-groups".to_string(),
            ));
        }

        lock(&self.comm.board).requests[self.rank] = Some(request);

        if self.comm.barrier.wait().is_leader() {
            let mut board = lock(&self.comm.board);
            let requests: Option<Vec<SplitRequest>> =
                board.requests.iter_mut().map(Option::take).collect();
            let outcomes = match requests {
                Some(requests) => build_split(&requests),
                None => (0..board.outcomes.len())
                    .map(|_| {
                        Err(TransportError::Failure(
                            "split called by only part of the group".to_string(),
                        ))
                    })
                    .collect(),
            };
            for (slot, outcome) in board.outcomes.iter_mut().zip(outcomes) {
                *slot = Some(outcome);
            }
        }
        self.comm.barrier.wait();

        lock(&self.comm.board).outcomes[self.rank]
            .take()
            .unwrap_or_else(|| Err(TransportError::Failure("split outcome missing".to_string())))
    }
}

/// Computes every member's subgroup (and bridge) handle for one split.
fn build_split(requests: &[SplitRequest]) -> Vec<Result<SplitOutcome, TransportError>> {
    let mut by_color: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (old_rank, request) in requests.iter().enumerate() {
        by_color.entry(request.color).or_default().push(old_rank);
    }
    let mut new_rank = vec![0; requests.len()];
    for members in by_color.values_mut() {
        members.sort_by_key(|&old| (requests[old].key, old));
        for (rank, &old) in members.iter().enumerate() {
            new_rank[old] = rank;
        }
    }

    let intra: BTreeMap<u32, Arc<Comm>> = by_color
        .iter()
        .map(|(&color, members)| (color, Comm::intra(members.len())))
        .collect();
    let side_size = |color: u32| by_color.get(&color).map_or(0, Vec::len);
    let mut bridges: HashMap<(u32, u32), Arc<Comm>> = HashMap::new();

    requests
        .iter()
        .enumerate()
        .map(|(old_rank, request)| {
            let comm = intra.get(&request.color).cloned().ok_or_else(|| {
                TransportError::Failure(format!("no subgroup for color {}", request.color))
            })?;
            let intra_group = LocalGroup {
                comm,
                side: 0,
                rank: new_rank[old_rank],
            };

            let bridge = match request.peer {
                None => None,
                Some(peer) if peer == request.color => {
                    return Err(TransportError::Failure(format!(
                        "color {peer} cannot bridge to itself"
                    )));
                }
                Some(peer) if side_size(peer) == 0 => {
                    return Err(TransportError::Failure(format!(
                        "no member chose bridge color {peer}"
                    )));
                }
                Some(peer) => {
                    let pair = (request.color.min(peer), request.color.max(peer));
                    let comm = bridges
                        .entry(pair)
                        .or_insert_with(|| Comm::inter(side_size(pair.0), side_size(pair.1)))
                        .clone();
                    Some(LocalGroup {
                        comm,
                        side: usize::from(request.color != pair.0),
                        rank: new_rank[old_rank],
                    })
                }
            };
            Ok(SplitOutcome {
                intra: intra_group,
                bridge,
            })
        })
        .collect()
}

impl Group for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.local().size()
    }

    fn remote_size(&self) -> usize {
        self.remote().size()
    }

    fn is_inter(&self) -> bool {
        self.comm.sides.len() == 2
    }

    fn send(&self, target: usize, bytes: &[u8]) -> Result<(), TransportError> {
        let remote = self.remote();
        let mailbox = remote.mailboxes.get(target).ok_or(TransportError::UnknownRank {
            rank: target,
            size: remote.size(),
        })?;
        mailbox
            .tx
            .send(Envelope {
                bytes: bytes.to_vec(),
                source: self.rank,
            })
            .map_err(|_| TransportError::Disconnected(format!("mailbox of rank {target} closed")))
    }

    fn probe_and_receive(&self) -> Result<Envelope, TransportError> {
        self.local().mailboxes[self.rank]
            .rx
            .recv()
            .map_err(|_| TransportError::Disconnected(format!("mailbox of rank {} closed", self.rank)))
    }

    fn broadcast(&self, role: BroadcastRole, data: &mut Vec<u8>) -> Result<(), TransportError> {
        match role {
            BroadcastRole::Root => {
                let inter = self.is_inter();
                for (rank, channel) in self.remote().broadcasts.iter().enumerate() {
                    if !inter && rank == self.rank {
                        continue;
                    }
                    channel.tx.send(data.clone()).map_err(|_| {
                        TransportError::Disconnected(format!("broadcast to rank {rank} failed"))
                    })?;
                }
                Ok(())
            }
            BroadcastRole::Receive { root } => {
                if root >= self.remote_size() {
                    return Err(TransportError::UnknownRank {
                        rank: root,
                        size: self.remote_size(),
                    });
                }
                *data = self.local().broadcasts[self.rank].rx.recv().map_err(|_| {
                    TransportError::Disconnected("broadcast channel closed".to_string())
                })?;
                Ok(())
            }
            BroadcastRole::Idle => Ok(()),
        }
    }

    fn barrier(&self) -> Result<(), TransportError> {
        self.comm.barrier.wait();
        Ok(())
    }

    fn split(&self, color: u32, key: usize) -> Result<Arc<dyn Group>, TransportError> {
        let outcome = self.collective_split(SplitRequest {
            color,
            key,
            peer: None,
        })?;
        debug!(
            color,
            rank = outcome.intra.rank,
            size = outcome.intra.size(),
            "group split"
        );
        Ok(Arc::new(outcome.intra))
    }

    fn split_with_bridge(
        &self,
        color: u32,
        key: usize,
        peer_color: u32,
    ) -> Result<(Arc<dyn Group>, Arc<dyn Group>), TransportError> {
        let outcome = self.collective_split(SplitRequest {
            color,
            key,
            peer: Some(peer_color),
        })?;
        let bridge = outcome.bridge.ok_or_else(|| {
            TransportError::Failure(format!("no bridge to color {peer_color}"))
        })?;
        debug!(
            color,
            peer_color,
            rank = outcome.intra.rank,
            size = outcome.intra.size(),
            remote_size = bridge.remote_size(),
            "group split with bridge"
        );
        Ok((Arc::new(outcome.intra), Arc::new(bridge)))
    }
}

// ── Fabric and rendezvous ─────────────────────────────────────────────────────

#[derive(Default)]
struct PortState {
    accept_size: Option<usize>,
    connect_size: usize,
    comm: Option<Arc<Comm>>,
    accepted: usize,
    connected: usize,
}

#[derive(Default)]
struct Port {
    state: Mutex<PortState>,
    changed: Condvar,
}

impl Port {
    fn wait<'a>(&self, guard: MutexGuard<'a, PortState>) -> MutexGuard<'a, PortState> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets the port once both sides hold their handles, so it can accept again.
    fn finish_if_done(&self, state: &mut PortState) {
        if state.accept_size == Some(state.accepted) && state.connected == state.connect_size {
            *state = PortState::default();
        }
    }
}

/// Creates in-process worlds and brokers rendezvous between them.
#[derive(Default)]
pub struct LocalFabric {
    ports: Mutex<HashMap<String, Arc<Port>>>,
}

impl LocalFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh intra-group of `size` members and returns one handle
    /// per rank, in rank order.
    pub fn world(&self, size: usize) -> Vec<Arc<dyn Group>> {
        let comm = Comm::intra(size);
        info!(world = %comm.id, size, "created in-process world");
        (0..size)
            .map(|rank| {
                Arc::new(LocalGroup {
                    comm: Arc::clone(&comm),
                    side: 0,
                    rank,
                }) as Arc<dyn Group>
            })
            .collect()
    }

    fn port(&self, endpoint: &str) -> Result<Arc<Port>, TransportError> {
        lock(&self.ports)
            .get(endpoint)
            .cloned()
            .ok_or_else(|| TransportError::UnknownEndpoint(endpoint.to_string()))
    }
}

impl Rendezvous for LocalFabric {
    fn listen(&self) -> Result<String, TransportError> {
        let name = format!("wall-port-{}", Uuid::new_v4());
        lock(&self.ports).insert(name.clone(), Arc::new(Port::default()));
        info!(endpoint = %name, "rendezvous endpoint open");
        Ok(name)
    }

    fn accept(&self, group: &dyn Group, endpoint: &str) -> Result<Arc<dyn Group>, TransportError> {
        let port = self.port(endpoint)?;
        let mut state = lock(&port.state);
        state.accept_size = Some(group.size());
        port.changed.notify_all();
        let comm = loop {
            if let Some(comm) = &state.comm {
                break Arc::clone(comm);
            }
            state = port.wait(state);
        };
        state.accepted += 1;
        port.finish_if_done(&mut state);
        if group.rank() == 0 {
            info!(endpoint, "accepted outside connection");
        }
        Ok(Arc::new(LocalGroup {
            comm,
            side: 0,
            rank: group.rank(),
        }))
    }

    fn connect(&self, group: &dyn Group, endpoint: &str) -> Result<Arc<dyn Group>, TransportError> {
        let port = self.port(endpoint)?;
        let mut state = lock(&port.state);
        let accept_size = loop {
            if let Some(size) = state.accept_size {
                break size;
            }
            state = port.wait(state);
        };
        let comm = match &state.comm {
            Some(comm) => Arc::clone(comm),
            None => {
                let comm = Comm::inter(accept_size, group.size());
                state.comm = Some(Arc::clone(&comm));
                state.connect_size = group.size();
                port.changed.notify_all();
                comm
            }
        };
        state.connected += 1;
        port.finish_if_done(&mut state);
        if group.rank() == 0 {
            info!(endpoint, "connected to endpoint");
        }
        Ok(Arc::new(LocalGroup {
            comm,
            side: 1,
            rank: group.rank(),
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_send_delivers_with_source_rank() {
        let fabric = LocalFabric::new();
        let world = fabric.world(3);

        world[2].send(0, b"hello").expect("send");

        let env = world[0].probe_and_receive().expect("receive");
        assert_eq!(env.bytes, b"hello");
        assert_eq!(env.source, 2);
    }

    #[test]
    fn test_send_to_unknown_rank_fails() {
        let world = LocalFabric::new().world(2);
        assert_eq!(
            world[0].send(5, b"x"),
            Err(TransportError::UnknownRank { rank: 5, size: 2 })
        );
    }

    #[test]
    fn test_intra_broadcast_reaches_every_other_member() {
        let world = LocalFabric::new().world(4);
        thread::scope(|s| {
            for member in &world[1..] {
                s.spawn(move || {
                    let mut data = Vec::new();
                    member
                        .broadcast(BroadcastRole::Receive { root: 0 }, &mut data)
                        .expect("receive");
                    assert_eq!(data, b"geometry");
                });
            }
            let mut data = b"geometry".to_vec();
            world[0].broadcast(BroadcastRole::Root, &mut data).expect("root");
        });
    }

    #[test]
    fn test_barrier_holds_until_all_arrive() {
        let world = LocalFabric::new().world(4);
        let arrived = AtomicUsize::new(0);
        thread::scope(|s| {
            for member in &world {
                let arrived = &arrived;
                s.spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    member.barrier().expect("barrier");
                    assert_eq!(arrived.load(Ordering::SeqCst), 4);
                });
            }
        });
    }

    #[test]
    fn test_split_orders_members_by_key() {
        // Arrange: odd ranks form color 1, keys reverse the order
        let world = LocalFabric::new().world(4);

        // Act
        let subgroups: Vec<(usize, Arc<dyn Group>)> = thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|member| {
                    s.spawn(move || {
                        let color = (member.rank() % 2) as u32;
                        let key = 10 - member.rank();
                        (member.rank(), member.split(color, key).expect("split"))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("thread")).collect()
        });

        // Assert
        for (old, sub) in &subgroups {
            assert_eq!(sub.size(), 2);
            let expected = if *old >= 2 { 0 } else { 1 };
            assert_eq!(sub.rank(), expected, "old rank {old}");
        }
    }

    #[test]
    fn test_split_with_bridge_links_head_and_displays() {
        let world = LocalFabric::new().world(4);
        let results: Vec<(usize, Arc<dyn Group>, Arc<dyn Group>)> = thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|member| {
                    s.spawn(move || {
                        let color = if member.rank() == 0 { 1 } else { 2 };
                        let peer = if member.rank() == 0 { 2 } else { 1 };
                        let (intra, bridge) = member
                            .split_with_bridge(color, member.rank(), peer)
                            .expect("split");
                        (member.rank(), intra, bridge)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("thread")).collect()
        });

        let (_, head_intra, head_bridge) = &results[0];
        assert_eq!(head_intra.size(), 1);
        assert!(head_bridge.is_inter());
        assert_eq!(head_bridge.remote_size(), 3);

        for (old, intra, bridge) in &results[1..] {
            assert_eq!(intra.size(), 3);
            assert_eq!(intra.rank(), old - 1);
            assert_eq!(bridge.remote_size(), 1);
        }

        // head node sends to display rank 2 across the bridge
        head_bridge.send(2, b"tile").expect("send");
        let env = results[3].2.probe_and_receive().expect("receive");
        assert_eq!(env.bytes, b"tile");
        assert_eq!(env.source, 0);
    }

    #[test]
    fn test_split_on_inter_group_fails() {
        let fabric = LocalFabric::new();
        let service = fabric.world(1);
        let clients = fabric.world(1);
        let endpoint = fabric.listen().expect("listen");
        let (inter, _) = thread::scope(|s| {
            let a = s.spawn(|| fabric.accept(service[0].as_ref(), &endpoint).expect("accept"));
            let c = s.spawn(|| fabric.connect(clients[0].as_ref(), &endpoint).expect("connect"));
            (a.join().expect("thread"), c.join().expect("thread"))
        });
        assert!(matches!(inter.split(0, 0), Err(TransportError::Failure(_))));
    }

    #[test]
    fn test_rendezvous_connects_two_worlds() {
        // Arrange
        let fabric = LocalFabric::new();
        let service = fabric.world(2);
        let clients = fabric.world(3);
        let endpoint = fabric.listen().expect("listen");

        // Act / Assert
        thread::scope(|s| {
            for member in &service {
                let (fabric, endpoint) = (&fabric, &endpoint);
                s.spawn(move || {
                    let outside = fabric.accept(member.as_ref(), endpoint).expect("accept");
                    assert!(outside.is_inter());
                    assert_eq!(outside.remote_size(), 3);
                    let mut data = b"announce".to_vec();
                    let role = if member.rank() == 0 {
                        BroadcastRole::Root
                    } else {
                        BroadcastRole::Idle
                    };
                    outside.broadcast(role, &mut data).expect("broadcast");
                    outside.barrier().expect("barrier");
                });
            }
            for member in &clients {
                let (fabric, endpoint) = (&fabric, &endpoint);
                s.spawn(move || {
                    let service = fabric.connect(member.as_ref(), endpoint).expect("connect");
                    assert_eq!(service.remote_size(), 2);
                    let mut data = Vec::new();
                    service
                        .broadcast(BroadcastRole::Receive { root: 0 }, &mut data)
                        .expect("receive");
                    assert_eq!(data, b"announce");
                    service.barrier().expect("barrier");
                });
            }
        });
    }

    #[test]
    fn test_connect_to_unknown_endpoint_fails() {
        let fabric = LocalFabric::new();
        let clients = fabric.world(1);
        assert!(matches!(
            fabric.connect(clients[0].as_ref(), "wall-port-missing"),
            Err(TransportError::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn test_inter_group_messages_cross_sides() {
        let fabric = LocalFabric::new();
        let service = fabric.world(2);
        let clients = fabric.world(1);
        let endpoint = fabric.listen().expect("listen");

        let (outside, inside) = thread::scope(|s| {
            let accepts: Vec<_> = service
                .iter()
                .map(|m| {
                    let (fabric, endpoint) = (&fabric, &endpoint);
                    s.spawn(move || fabric.accept(m.as_ref(), endpoint).expect("accept"))
                })
                .collect();
            let client = fabric.connect(clients[0].as_ref(), &endpoint).expect("connect");
            let accepted: Vec<_> = accepts.into_iter().map(|h| h.join().expect("thread")).collect();
            (accepted, client)
        });

        inside.send(1, b"to display 1").expect("send");
        let env = outside[1].probe_and_receive().expect("receive");
        assert_eq!(env.bytes, b"to display 1");
        assert_eq!(env.source, 0);
    }
}
