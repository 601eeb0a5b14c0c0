//! Cache groups: a named namespace over one local store

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::byteview::ByteView;
use crate::context::LoadContext;
use crate::error::{BoxError, Error, Result};
use crate::lru::LruCache;
use crate::peers::{PeerGetter, PeerPicker};
use crate::stats::CacheStats;

/// Loads the value for a key from the data source behind a group
///
/// Only called on a local miss for a key this node owns.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Produce the value for `key`
    async fn get(&self, ctx: &LoadContext, key: &str) -> std::result::Result<Vec<u8>, BoxError>;
}

/// Adapts a plain function into a [`Getter`]
///
/// ```
/// use pigcache::{GetterFn, GroupRegistry};
///
/// let registry = GroupRegistry::new();
/// registry.new_group("scores", 2 << 10, GetterFn(|key: &str| match key {
///     "Tom" => Ok(b"630".to_vec()),
///     _ => Err(format!("{} not exist", key)),
/// }));
/// ```
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F, E> Getter for GetterFn<F>
where
    F: Fn(&str) -> std::result::Result<Vec<u8>, E> + Send + Sync,
    E: Into<BoxError>,
{
    async fn get(&self, _ctx: &LoadContext, key: &str) -> std::result::Result<Vec<u8>, BoxError> {
        (self.0)(key).map_err(Into::into)
    }
}

/// A named cache namespace with its own store and data source
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    peers: Option<Arc<dyn PeerPicker>>,
    main_cache: Mutex<LruCache<ByteView>>,
    stats: Arc<CacheStats>,
}

impl Group {
    pub(crate) fn new(
        name: String,
        cache_bytes: usize,
        getter: Arc<dyn Getter>,
        peers: Option<Arc<dyn PeerPicker>>,
    ) -> Self {
        let stats = Arc::new(CacheStats::new());
        let evictions = Arc::clone(&stats);
        let main_cache =
            LruCache::with_eviction_callback(cache_bytes, move |key: &str, _: &ByteView| {
                trace!(key, "evicted");
                evictions.record_eviction();
            });

        Self {
            name,
            getter,
            peers,
            main_cache: Mutex::new(main_cache),
            stats,
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the value for `key` with no deadline
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.get_with(&LoadContext::background(), key).await
    }

    /// Get the value for `key`
    ///
    /// Local hit first; on a miss the owning peer is asked, or the data
    /// source when this node owns the key. Only locally loaded values are
    /// stored in this group's cache.
    pub async fn get_with(&self, ctx: &LoadContext, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("key is required".to_string()));
        }
        self.stats.record_get();

        if let Some(value) = self.lookup_cache(key) {
            debug!(group = %self.name, key, "cache hit");
            self.stats.record_hit();
            return Ok(value);
        }
        self.stats.record_miss();

        self.load(ctx, key).await
    }

    async fn load(&self, ctx: &LoadContext, key: &str) -> Result<ByteView> {
        if let Some(peers) = &self.peers {
            if let Some(peer) = peers.pick_peer(key)? {
                return self.get_from_peer(ctx, peer.as_ref(), key).await;
            }
        }

        self.get_locally(ctx, key).await
    }

    async fn get_from_peer(
        &self,
        ctx: &LoadContext,
        peer: &dyn PeerGetter,
        key: &str,
    ) -> Result<ByteView> {
        match ctx.run(peer.fetch(ctx, &self.name, key)).await {
            Ok(bytes) => {
                self.stats.record_peer_load();
                Ok(ByteView::from(bytes))
            }
            Err(e) => {
                self.stats.record_peer_error();
                warn!(group = %self.name, key, peer = peer.peer(), error = %e, "peer fetch failed");
                Err(e)
            }
        }
    }

    async fn get_locally(&self, ctx: &LoadContext, key: &str) -> Result<ByteView> {
        debug!(group = %self.name, key, "loading from data source");
        let loaded = ctx
            .run(async { self.getter.get(ctx, key).await.map_err(Error::Loader) })
            .await;

        match loaded {
            Ok(bytes) => {
                self.stats.record_local_load();
                // the loader handed over its buffer, nothing else can alias it
                let value = ByteView::from(bytes);
                self.populate_cache(key, value.clone());
                Ok(value)
            }
            Err(e) => {
                self.stats.record_loader_error();
                Err(e)
            }
        }
    }

    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        self.main_cache.lock().get(key).cloned()
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.lock().add(key, value);
    }

    /// Group statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Entries in the local store
    pub fn cache_len(&self) -> usize {
        self.main_cache.lock().len()
    }

    /// Bytes held by the local store
    pub fn cache_bytes(&self) -> usize {
        self.main_cache.lock().used_bytes()
    }

    /// Byte budget of the local store (0 = unbounded)
    pub fn max_bytes(&self) -> usize {
        self.main_cache.lock().max_bytes()
    }
}
