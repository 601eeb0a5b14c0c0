//! Name → group lookup

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::group::{Getter, Group};
use crate::peers::PeerPicker;

/// Registry of the groups served by this node
///
/// Constructed once and handed to whatever serves requests. Groups are only
/// ever added; registering a name again replaces the earlier group.
#[derive(Default)]
pub struct GroupRegistry {
    peers: Option<Arc<dyn PeerPicker>>,
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    /// Registry whose groups always load locally
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose groups consult `peers` for key ownership
    pub fn with_peers(peers: Arc<dyn PeerPicker>) -> Self {
        Self {
            peers: Some(peers),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a group
    ///
    /// # Arguments
    /// * `name` - Group name, unique within the registry
    /// * `cache_bytes` - Local store budget in bytes (0 = unbounded)
    /// * `getter` - Data source for locally owned misses
    pub fn new_group<G>(&self, name: impl Into<String>, cache_bytes: usize, getter: G) -> Arc<Group>
    where
        G: Getter + 'static,
    {
        let name = name.into();
        let group = Arc::new(Group::new(
            name.clone(),
            cache_bytes,
            Arc::new(getter),
            self.peers.clone(),
        ));

        info!(group = %name, cache_bytes, "group registered");
        self.groups.write().insert(name, Arc::clone(&group));
        group
    }

    /// Look up a group by name
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered groups
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Check if no group is registered
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}
