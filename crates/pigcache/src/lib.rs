//! # pigcache
//!
//! Distributed in-memory cache node.
//!
//! ## Architecture
//! - **LruCache**: byte-bounded LRU store, index-linked list + AHash map
//! - **HashRing**: consistent hashing with virtual replicas (CRC-32/IEEE)
//! - **PeerPool**: ring + per-peer clients, swapped atomically on membership change
//! - **Group**: local hit → owning peer → local data source
//!
//! Values loaded from a peer are returned but not cached locally; values
//! loaded from the local data source are.

#![warn(missing_docs)]

mod byteview;
mod context;
mod error;
mod group;
mod lru;
mod peers;
mod registry;
mod ring;
mod stats;

pub use byteview::ByteView;
pub use context::LoadContext;
pub use error::{BoxError, Error, Result};
pub use group::{Getter, GetterFn, Group};
pub use lru::{EvictionCallback, LruCache, Value};
pub use peers::{Connector, PeerGetter, PeerPicker, PeerPool, DEFAULT_REPLICAS};
pub use registry::GroupRegistry;
pub use ring::{crc32_ieee, HashFn, HashRing};
pub use stats::{CacheStats, StatsSnapshot};
