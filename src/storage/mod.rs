//! Record storage
//!
//! Definitions and actions live in two independent partitions. Each partition
//! is a [`RecordStore`]; the eviction engine only ever sees the trait, so the
//! in-memory store used by tests and the redb store used on disk are
//! interchangeable.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which of the two partitions a store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Definitions,
    Actions,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Definitions => "definitions",
            Partition::Actions => "actions",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted definition config or action return value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub value: serde_json::Value,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl StoredRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            created: Utc::now(),
            expires: None,
        }
    }

    /// Set an absolute expiry instant
    pub fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|e| e <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Bytes this record occupies under `key`: key length plus the encoded value
    pub fn footprint(&self, key: &str) -> usize {
        key.len() + serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

/// Key-value store for one partition.
///
/// Sizes are reported in kilobytes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of this store (for logging)
    fn name(&self) -> &str;

    fn partition(&self) -> Partition;

    /// Whether records survive the process
    fn is_persistent(&self) -> bool;

    /// Capacity in KB
    fn max_size_kb(&self) -> f64;

    /// Every record whose key starts with `prefix` (all records if `None`)
    async fn get_all(
        &self,
        prefix: Option<&str>,
        include_expired: bool,
    ) -> StoreResult<IndexMap<String, StoredRecord>>;

    /// Current size in KB
    async fn size_kb(&self) -> StoreResult<f64>;

    /// Insert or fully replace records
    async fn put(&self, records: Vec<(String, StoredRecord)>) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    async fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()>;
}

/// The pair of stores the engine manages
#[derive(Clone)]
pub struct Partitions {
    pub definitions: Arc<dyn RecordStore>,
    pub actions: Arc<dyn RecordStore>,
}

impl Partitions {
    pub fn new(definitions: Arc<dyn RecordStore>, actions: Arc<dyn RecordStore>) -> Self {
        Self {
            definitions,
            actions,
        }
    }

    /// Two fresh in-memory partitions with the given capacities
    pub fn in_memory(definitions_max_kb: f64, actions_max_kb: f64) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(Partition::Definitions, definitions_max_kb)),
            Arc::new(MemoryStore::new(Partition::Actions, actions_max_kb)),
        )
    }

    pub fn get(&self, partition: Partition) -> &Arc<dyn RecordStore> {
        match partition {
            Partition::Definitions => &self.definitions,
            Partition::Actions => &self.actions,
        }
    }

    /// Both partitions persist across runs
    pub fn is_persistent(&self) -> bool {
        self.definitions.is_persistent() && self.actions.is_persistent()
    }

    /// Combined capacity in KB
    pub fn max_size_kb(&self) -> f64 {
        self.definitions.max_size_kb() + self.actions.max_size_kb()
    }

    /// Combined size in KB, both partitions measured concurrently
    pub async fn size_kb(&self) -> StoreResult<f64> {
        let (defs, actions) =
            tokio::try_join!(self.definitions.size_kb(), self.actions.size_kb())?;
        Ok(defs + actions)
    }

    /// Wipe both partitions, actions first
    pub async fn clear(&self) -> StoreResult<()> {
        self.actions.clear().await?;
        self.definitions.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let fresh = StoredRecord::new(json!({}));
        assert!(!fresh.is_expired_at(now));

        let stale = StoredRecord::new(json!({})).with_expiry(now - Duration::seconds(1));
        assert!(stale.is_expired_at(now));
    }

    #[test]
    fn test_footprint_grows_with_value() {
        let small = StoredRecord::new(json!({"a": 1}));
        let large = StoredRecord::new(json!({"a": "x".repeat(2048)}));
        assert!(large.footprint("k") > small.footprint("k") + 2000);
        assert!(small.footprint("longer-key") > small.footprint("k"));
    }

    #[test]
    fn test_partition_display() {
        assert_eq!(Partition::Definitions.to_string(), "definitions");
        assert_eq!(Partition::Actions.to_string(), "actions");
    }
}
