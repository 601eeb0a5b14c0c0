//! Peer selection over a consistent-hash ring

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::context::LoadContext;
use crate::error::{Error, Result};
use crate::ring::{crc32_ieee, HashFn, HashRing};

/// Virtual replicas per peer used by the daemon
pub const DEFAULT_REPLICAS: usize = 50;

/// Client for fetching a group's value from another node
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetch the raw value for `key` in `group` from the peer
    async fn fetch(&self, ctx: &LoadContext, group: &str, key: &str) -> Result<Vec<u8>>;

    /// Identity of the peer this client talks to
    fn peer(&self) -> &str;
}

/// Decides which node owns a key
pub trait PeerPicker: Send + Sync {
    /// `Ok(None)` when this node owns `key`, otherwise the owner's client
    fn pick_peer(&self, key: &str) -> Result<Option<Arc<dyn PeerGetter>>>;
}

/// Builds a client for a peer id
pub type Connector = Box<dyn Fn(&str) -> Arc<dyn PeerGetter> + Send + Sync>;

/// Ring plus clients, replaced as a unit
struct Membership {
    ring: HashRing,
    getters: HashMap<String, Arc<dyn PeerGetter>, RandomState>,
}

/// The cluster as seen from this node
///
/// Shared by every group in the process. Membership is swapped wholesale by
/// [`set_peers`](PeerPool::set_peers); readers always see a complete ring.
pub struct PeerPool {
    self_id: String,
    replicas: usize,
    hash: HashFn,
    connect: Connector,
    membership: RwLock<Arc<Membership>>,
}

impl PeerPool {
    /// Create a pool for node `self_id` with no peers
    ///
    /// `connect` builds the remote client for each non-self peer.
    pub fn new<F>(self_id: impl Into<String>, replicas: usize, connect: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn PeerGetter> + Send + Sync + 'static,
    {
        Self::with_hash(self_id, replicas, crc32_ieee, connect)
    }

    /// Same as [`new`](PeerPool::new) with a custom ring hash
    pub fn with_hash<F>(
        self_id: impl Into<String>,
        replicas: usize,
        hash: HashFn,
        connect: F,
    ) -> Self
    where
        F: Fn(&str) -> Arc<dyn PeerGetter> + Send + Sync + 'static,
    {
        Self {
            self_id: self_id.into(),
            replicas,
            hash,
            connect: Box::new(connect),
            membership: RwLock::new(Arc::new(Membership {
                ring: HashRing::with_hash(replicas, hash),
                getters: HashMap::with_hasher(RandomState::new()),
            })),
        }
    }

    /// Replace the peer set, rebuilding the ring and clients from scratch
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers.into_iter().map(|p| p.as_ref().to_string()).collect();

        let mut ring = HashRing::with_hash(self.replicas, self.hash);
        ring.add(&peers);

        let mut getters = HashMap::with_capacity_and_hasher(peers.len(), RandomState::new());
        for peer in peers.iter().filter(|p| **p != self.self_id) {
            getters.insert(peer.clone(), (self.connect)(peer.as_str()));
        }

        *self.membership.write() = Arc::new(Membership { ring, getters });
        info!(self_id = %self.self_id, peers = ?peers, "peer set updated");
    }

    /// This node's id
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Current peers, sorted
    pub fn peers(&self) -> Vec<String> {
        let membership = self.membership.read().clone();
        let mut peers: Vec<String> = membership.ring.peers().map(str::to_string).collect();
        peers.sort();
        peers
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Result<Option<Arc<dyn PeerGetter>>> {
        let membership = self.membership.read().clone();

        let owner = membership
            .ring
            .get(key)
            .ok_or_else(|| Error::NotFound("no peers available".to_string()))?;

        if owner == self.self_id {
            return Ok(None);
        }

        debug!(self_id = %self.self_id, peer = owner, key, "pick peer");
        membership
            .getters
            .get(owner)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::NotFound(format!("no client for peer {}", owner)))
    }
}
