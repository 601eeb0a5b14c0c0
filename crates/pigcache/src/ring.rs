//! Consistent-hash ring for key ownership
//!
//! Each peer is placed on the ring `replicas` times, at
//! `hash("<replica index><peer id>")`. A key belongs to the first point at or
//! after `hash(key)`, wrapping to the first point past the end.

use std::collections::{HashMap, HashSet};

use ahash::RandomState;

/// Maps bytes to a ring position
pub type HashFn = fn(&[u8]) -> u32;

/// CRC-32/IEEE, the default ring hash
pub fn crc32_ieee(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Consistent-hash ring over a set of peer ids
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted ascending
    points: Vec<u32>,
    owners: HashMap<u32, String, RandomState>,
    peers: HashSet<String, RandomState>,
}

impl HashRing {
    /// Create an empty ring using CRC-32/IEEE
    pub fn new(replicas: usize) -> Self {
        Self::with_hash(replicas, crc32_ieee)
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hash(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            points: Vec::new(),
            owners: HashMap::with_hasher(RandomState::new()),
            peers: HashSet::with_hasher(RandomState::new()),
        }
    }

    /// Place peers on the ring
    ///
    /// Colliding points keep the peer inserted last.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let point = (self.hash)(format!("{}{}", i, peer).as_bytes());
                self.points.push(point);
                self.owners.insert(point, peer.to_string());
            }
            self.peers.insert(peer.to_string());
        }

        self.points.sort_unstable();
    }

    /// Peer owning `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.points.partition_point(|&point| point < hash);
        let point = self.points[idx % self.points.len()];

        self.owners.get(&point).map(String::as_str)
    }

    /// Whether no peer has been added
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points on the ring
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Virtual replicas per peer
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Whether `peer` has been added
    pub fn contains(&self, peer: &str) -> bool {
        self.peers.contains(peer)
    }

    /// Peers on the ring, in no particular order
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }
}
