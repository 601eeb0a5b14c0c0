//! Demo data source backing the default group

use std::collections::HashMap;

use async_trait::async_trait;
use pigcache::{BoxError, Getter, LoadContext};
use tracing::info;

/// Slow in-memory "database" of scores
pub struct SlowDb {
    rows: HashMap<String, String>,
}

impl SlowDb {
    pub fn new() -> Self {
        let rows = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { rows }
    }
}

#[async_trait]
impl Getter for SlowDb {
    async fn get(&self, _ctx: &LoadContext, key: &str) -> Result<Vec<u8>, BoxError> {
        info!("[SlowDB] search key {}", key);
        match self.rows.get(key) {
            Some(value) => Ok(value.clone().into_bytes()),
            None => Err(format!("{} not exist", key).into()),
        }
    }
}
