//! Persistence path for definitions and actions
//!
//! [`DefStorage`] is what the component-loading layer talks to. Every mutation
//! runs through the [`MutationGate`], makes room first when the store is near
//! capacity, and falls back to wiping both partitions whenever graph eviction
//! is disabled or fails.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::eviction::{evict, target_size_kb, EvictionReport};
use crate::gate::MutationGate;
use crate::graph::{self, eviction_order, upstream_of, DependencyGraph};
use crate::storage::{Partition, Partitions, RecordStore, RedbStore, StoredRecord};
use chrono::{Duration, Utc};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::BTreeSet;

/// Marker written before a multi-record definition put and removed after it.
/// Finding it on open means a write was interrupted.
pub const TRANSACTION_SENTINEL_KEY: &str = "$defstore$transaction-sentinel";

pub struct DefStorage {
    partitions: Partitions,
    gate: MutationGate,
    config: StoreConfig,
}

impl DefStorage {
    /// Open the redb store described by `config`
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        let partitions = RedbStore::open_pair(
            &config.store_file(),
            config.definitions_max_kb,
            config.actions_max_kb,
        )?;
        Self::open_with(partitions, config).await
    }

    /// Wrap existing partitions, clearing them if an interrupted write left
    /// its sentinel behind
    pub async fn open_with(partitions: Partitions, config: StoreConfig) -> StoreResult<Self> {
        let storage = Self::new(partitions, config);
        let leftover = storage
            .partitions
            .definitions
            .get_all(Some(TRANSACTION_SENTINEL_KEY), true)
            .await?;
        if leftover.contains_key(TRANSACTION_SENTINEL_KEY) {
            tracing::warn!("Found transaction sentinel from an interrupted write, clearing store");
            storage.partitions.clear().await?;
        }
        Ok(storage)
    }

    /// Wrap partitions without any startup checks
    pub fn new(partitions: Partitions, config: StoreConfig) -> Self {
        Self {
            partitions,
            gate: MutationGate::new(),
            config,
        }
    }

    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    // ==================== Space Management ====================

    /// Make sure `required_kb` more fits, evicting or clearing as needed
    pub async fn ensure_free_space(&self, required_kb: f64) -> StoreResult<EvictionReport> {
        self.gate
            .with_exclusive_access(|| self.ensure_free_space_locked(required_kb))
            .await
    }

    /// Unconditionally wipe both partitions
    pub async fn clear_all(&self, reason: &str) -> StoreResult<()> {
        self.gate
            .with_exclusive_access(|| self.clear_locked(reason))
            .await
    }

    async fn ensure_free_space_locked(&self, required_kb: f64) -> StoreResult<EvictionReport> {
        if !self.partitions.is_persistent() {
            tracing::debug!("Store is not persistent, nothing to prune");
            return Ok(EvictionReport::default());
        }

        let size = match self.partitions.size_kb().await {
            Ok(size) => size,
            Err(e) if e.is_unavailable() => {
                tracing::debug!("Store unavailable, nothing to prune: {}", e);
                return Ok(EvictionReport::default());
            }
            Err(e) => return self.clear_after_failure(e, 0.0).await,
        };

        let target = target_size_kb(self.partitions.max_size_kb(), required_kb);
        if size <= target {
            return Ok(EvictionReport::untouched(size));
        }

        if !self.config.graph_eviction {
            tracing::info!(
                size_kb = size,
                target_kb = target,
                required_kb,
                "Store near capacity, clearing"
            );
            self.clear_locked("store near capacity").await?;
            return Ok(EvictionReport {
                cleared: true,
                size_before_kb: size,
                size_after_kb: self.measure_after("clear").await,
                ..EvictionReport::default()
            });
        }

        match self.evict_by_graph(required_kb).await {
            Ok(evicted) => {
                let after = self.measure_after("graph eviction").await;
                if let Some(after) = after.filter(|&after| after > target) {
                    tracing::warn!(
                        size_kb = after,
                        target_kb = target,
                        "Still above target after graph eviction; remaining records are not evictable"
                    );
                }
                Ok(EvictionReport {
                    evicted,
                    cleared: false,
                    size_before_kb: size,
                    size_after_kb: after,
                })
            }
            Err(e) => self.clear_after_failure(e, size).await,
        }
    }

    async fn evict_by_graph(&self, required_kb: f64) -> StoreResult<Vec<String>> {
        let graph = graph::build(&self.partitions, &self.config.bootstrap_actions).await?;
        let order = eviction_order(&graph)?;
        evict(&self.partitions, &order, &graph, required_kb).await
    }

    /// Clear-and-continue: the eviction pipeline failed, so wipe the store.
    /// Only a failing clear is reported to the caller.
    async fn clear_after_failure(&self, cause: StoreError, size_before: f64) -> StoreResult<EvictionReport> {
        tracing::warn!("Eviction failed ({}), falling back to clearing the store", cause);
        if let Err(clear_err) = self.clear_locked("eviction failed").await {
            tracing::warn!("Clearing the store failed too: {}", clear_err);
            return Err(clear_err);
        }
        Ok(EvictionReport {
            cleared: true,
            size_before_kb: size_before,
            size_after_kb: self.measure_after("fallback clear").await,
            ..EvictionReport::default()
        })
    }

    async fn clear_locked(&self, reason: &str) -> StoreResult<()> {
        tracing::info!(reason, "Clearing definitions and actions");
        self.partitions.clear().await
    }

    /// Size after a completed eviction or clear. The work already happened,
    /// so a failed measurement is logged rather than returned.
    async fn measure_after(&self, step: &str) -> Option<f64> {
        match self.partitions.size_kb().await {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::warn!(step, "Could not measure store size afterwards: {}", e);
                None
            }
        }
    }

    // ==================== Writes ====================

    /// Persist definitions, making room first.
    ///
    /// Multi-record puts are bracketed by the transaction sentinel.
    pub async fn store_definitions(&self, records: Vec<(String, Value)>) -> StoreResult<EvictionReport> {
        let records = self.stamp(records);
        self.gate
            .with_exclusive_access(|| async move {
                let report = self.ensure_free_space_locked(required_kb(&records)).await?;
                let bracketed = records.len() > 1;
                let defs = &self.partitions.definitions;

                if bracketed {
                    let sentinel = StoredRecord::new(Value::Bool(true));
                    defs.put(vec![(TRANSACTION_SENTINEL_KEY.to_string(), sentinel)]).await?;
                }
                let count = records.len();
                defs.put(records).await?;
                if bracketed {
                    defs.remove(TRANSACTION_SENTINEL_KEY).await?;
                }
                tracing::debug!("Stored {} definitions", count);
                Ok::<_, StoreError>(report)
            })
            .await
    }

    /// Persist action results, making room first
    pub async fn store_actions(&self, records: Vec<(String, Value)>) -> StoreResult<EvictionReport> {
        let records = self.stamp(records);
        self.gate
            .with_exclusive_access(|| async move {
                let report = self.ensure_free_space_locked(required_kb(&records)).await?;
                let count = records.len();
                self.partitions.actions.put(records).await?;
                tracing::debug!("Stored {} actions", count);
                Ok::<_, StoreError>(report)
            })
            .await
    }

    /// Remove definitions together with everything that depends on them.
    ///
    /// Returns the removed keys, actions first.
    pub async fn remove_definitions(&self, keys: &[String]) -> StoreResult<Vec<String>> {
        self.gate
            .with_exclusive_access(|| async move {
                let graph = graph::build(&self.partitions, &self.config.bootstrap_actions).await?;
                let closure: BTreeSet<String> = keys
                    .iter()
                    .flat_map(|key| upstream_of(key, &graph))
                    .collect();
                let (actions, definitions) = graph.split_by_partition(closure);

                self.partitions.actions.remove_many(&actions).await?;
                self.partitions.definitions.remove_many(&definitions).await?;
                tracing::debug!(
                    "Removed {} definitions and {} dependent actions",
                    definitions.len(),
                    actions.len()
                );

                // A key stored in both partitions is reported once
                let mut seen = FxHashSet::default();
                let removed: Vec<String> = actions
                    .into_iter()
                    .chain(definitions)
                    .filter(|key| seen.insert(key.clone()))
                    .collect();
                Ok::<_, StoreError>(removed)
            })
            .await
    }

    fn stamp(&self, records: Vec<(String, Value)>) -> Vec<(String, StoredRecord)> {
        let expires = self
            .config
            .expiration_secs
            .map(|secs| Utc::now() + Duration::seconds(secs));
        records
            .into_iter()
            .map(|(key, value)| {
                let record = StoredRecord::new(value);
                let record = match expires {
                    Some(at) => record.with_expiry(at),
                    None => record,
                };
                (key, record)
            })
            .collect()
    }

    // ==================== Reads ====================

    /// Every unexpired definition, for warming the in-memory registry at startup
    pub async fn restore_all(&self) -> StoreResult<IndexMap<String, Value>> {
        let prefix = self.config.key_prefix.as_deref();
        let records = self.partitions.definitions.get_all(prefix, false).await?;
        Ok(records
            .into_iter()
            .filter(|(key, _)| key != TRANSACTION_SENTINEL_KEY)
            .map(|(key, record)| (key, record.value))
            .collect())
    }

    /// Unexpired action results
    pub async fn restore_actions(&self) -> StoreResult<IndexMap<String, Value>> {
        let records = self.partitions.actions.get_all(None, false).await?;
        Ok(records.into_iter().map(|(k, r)| (k, r.value)).collect())
    }

    /// Snapshot of the current dependency graph, taken under the gate
    pub async fn dependency_graph(&self) -> StoreResult<DependencyGraph> {
        self.gate
            .with_exclusive_access(|| graph::build(&self.partitions, &self.config.bootstrap_actions))
            .await
    }

    /// Per-partition sizes in KB
    pub async fn sizes(&self) -> StoreResult<Vec<(Partition, f64, f64)>> {
        let mut out = Vec::with_capacity(2);
        for store in [&self.partitions.definitions, &self.partitions.actions] {
            out.push((store.partition(), store.size_kb().await?, store.max_size_kb()));
        }
        Ok(out)
    }
}

/// KB the records will occupy once stored
fn required_kb(records: &[(String, StoredRecord)]) -> f64 {
    records.iter().map(|(k, r)| r.footprint(k)).sum::<usize>() as f64 / 1024.0
}
