//! In-memory record store
//!
//! Keeps records in insertion order. Not persistent unless told otherwise,
//! which lets tests drive the eviction path without touching disk.

use super::{Partition, RecordStore, StoredRecord};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::RwLock;

pub struct MemoryStore {
    partition: Partition,
    name: String,
    max_size_kb: f64,
    persistent: bool,
    records: RwLock<IndexMap<String, StoredRecord>>,
}

impl MemoryStore {
    pub fn new(partition: Partition, max_size_kb: f64) -> Self {
        Self {
            partition,
            name: format!("memory:{}", partition),
            max_size_kb,
            persistent: false,
            records: RwLock::new(IndexMap::new()),
        }
    }

    /// Report this store as persistent
    pub fn with_persistence(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    // Poisoning means a writer panicked mid-update; there is nothing sane to recover.

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, StoredRecord>> {
        self.records
            .read()
            .expect("memory store lock poisoned, a thread panicked while holding this lock")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, StoredRecord>> {
        self.records
            .write()
            .expect("memory store lock poisoned, a thread panicked while holding this lock")
    }

    /// Number of records, expired ones included
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn partition(&self) -> Partition {
        self.partition
    }

    fn is_persistent(&self) -> bool {
        self.persistent
    }

    fn max_size_kb(&self) -> f64 {
        self.max_size_kb
    }

    async fn get_all(
        &self,
        prefix: Option<&str>,
        include_expired: bool,
    ) -> StoreResult<IndexMap<String, StoredRecord>> {
        let now = Utc::now();
        Ok(self
            .read()
            .iter()
            .filter(|(k, _)| prefix.map_or(true, |p| k.starts_with(p)))
            .filter(|(_, r)| include_expired || !r.is_expired_at(now))
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }

    async fn size_kb(&self) -> StoreResult<f64> {
        let bytes: usize = self.read().iter().map(|(k, r)| r.footprint(k)).sum();
        Ok(bytes as f64 / 1024.0)
    }

    async fn put(&self, records: Vec<(String, StoredRecord)>) -> StoreResult<()> {
        let mut map = self.write();
        for (key, record) in records {
            map.insert(key, record);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.write().shift_remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.write().clear();
        Ok(())
    }
}
