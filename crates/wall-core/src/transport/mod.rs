//! Transport interface between renderers, relay and displays.
//!
//! The wall does not care how bytes travel; it needs process groups with
//! ranks, point-to-point messages, rooted broadcast, barriers, group splits,
//! and a rendezvous through which two independent groups find each other.
//!
//! A group handle is either an *intra-group* (all members are peers) or an
//! *inter-group* connecting a local side to a remote side. On an inter-group,
//! `send` targets remote ranks, `probe_and_receive` returns messages from
//! remote ranks, broadcasts flow from one side to the other, and a barrier
//! waits for the members of both sides.
//!
//! [`local::LocalFabric`] implements the interface over threads of one
//! process.

pub mod local;

use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by a transport. All of them are fatal to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer side of a channel is gone.
    #[error("transport disconnected: {0}")]
    Disconnected(String),

    /// A message was addressed to a rank the group does not have.
    #[error("rank {rank} out of range for group of size {size}")]
    UnknownRank { rank: usize, size: usize },

    /// No listener is registered under the endpoint name.
    #[error("unknown rendezvous endpoint: {0}")]
    UnknownEndpoint(String),

    /// Any other failure of a transport call.
    #[error("transport failure: {0}")]
    Failure(String),
}

/// One received message and the rank it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub bytes: Vec<u8>,
    /// Sender's rank within its own side of the group.
    pub source: usize,
}

/// This member's part in a rooted broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastRole {
    /// Supplies the data. On an inter-group the root is on the sending side.
    Root,
    /// Receives the data sent by `root`.
    Receive { root: usize },
    /// Takes no part; used by non-root members of the sending side of an
    /// inter-group broadcast.
    Idle,
}

/// A handle on a set of cooperating processes, as seen by one member.
pub trait Group: Send + Sync {
    /// This member's rank on its side of the group.
    fn rank(&self) -> usize;

    /// Number of members on this member's side.
    fn size(&self) -> usize;

    /// Number of members that `send` can address: the remote side of an
    /// inter-group, or `size()` for an intra-group.
    fn remote_size(&self) -> usize;

    fn is_inter(&self) -> bool;

    /// Sends one message to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownRank`] for out-of-range targets.
    fn send(&self, target: usize, bytes: &[u8]) -> Result<(), TransportError>;

    /// Blocks until a message from any sender arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] when no sender can ever
    /// deliver again.
    fn probe_and_receive(&self) -> Result<Envelope, TransportError>;

    /// Rooted broadcast. The root's `data` is read; every receiver's `data` is
    /// replaced with the root's bytes; idle members leave it untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the broadcast cannot complete.
    fn broadcast(&self, role: BroadcastRole, data: &mut Vec<u8>) -> Result<(), TransportError>;

    /// Blocks until every member (of both sides, for an inter-group) calls it.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the barrier cannot complete.
    fn barrier(&self) -> Result<(), TransportError>;

    /// Collective over an intra-group: members passing the same `color` form
    /// one subgroup, ranked by ascending `key` (ties by old rank).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Failure`] on inter-groups.
    fn split(&self, color: u32, key: usize) -> Result<Arc<dyn Group>, TransportError>;

    /// Like [`Group::split`], and additionally returns an inter-group linking
    /// this member's subgroup with the subgroup of `peer_color`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Failure`] on inter-groups or when no member
    /// chose `peer_color`.
    fn split_with_bridge(
        &self,
        color: u32,
        key: usize,
        peer_color: u32,
    ) -> Result<(Arc<dyn Group>, Arc<dyn Group>), TransportError>;
}

/// Out-of-band rendezvous between two independently started groups.
pub trait Rendezvous: Send + Sync {
    /// Opens a new endpoint and returns its name.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no endpoint can be opened.
    fn listen(&self) -> Result<String, TransportError>;

    /// Collective over `group`: waits for a peer group to connect to
    /// `endpoint` and returns the inter-group to it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownEndpoint`] if `endpoint` is not open.
    fn accept(&self, group: &dyn Group, endpoint: &str) -> Result<Arc<dyn Group>, TransportError>;

    /// Collective over `group`: connects to the group accepting on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownEndpoint`] if `endpoint` is not open.
    fn connect(&self, group: &dyn Group, endpoint: &str) -> Result<Arc<dyn Group>, TransportError>;
}
