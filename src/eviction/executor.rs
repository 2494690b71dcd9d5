//! Removes upstream closures until the store fits its target size

use super::target_size_kb;
use crate::error::{StoreError, StoreResult};
use crate::graph::{upstream_of, DependencyGraph};
use crate::storage::{Partition, Partitions};
use rustc_hash::FxHashSet;

/// Evict records so that `required_kb` more will fit.
///
/// Walks `ordered` (normally [`crate::graph::eviction_order`]); each candidate
/// is expanded to its upstream closure, actions are removed before
/// definitions, and the store is re-measured after every closure. Returns the
/// removed keys in removal order, or an empty list without touching the store
/// when it is already at or below target.
///
/// A failed removal aborts the run. Keys removed before the failure stay
/// removed.
pub async fn evict(
    partitions: &Partitions,
    ordered: &[String],
    graph: &DependencyGraph,
    required_kb: f64,
) -> StoreResult<Vec<String>> {
    let target = target_size_kb(partitions.max_size_kb(), required_kb);
    let mut size = partitions.size_kb().await?;
    let mut evicted: Vec<String> = Vec::new();

    if size <= target {
        tracing::debug!(size_kb = size, target_kb = target, "Store within target, nothing to evict");
        return Ok(evicted);
    }

    let mut gone: FxHashSet<String> = FxHashSet::default();
    for candidate in ordered {
        if size <= target {
            break;
        }
        if gone.contains(candidate) {
            continue;
        }
        if !graph.contains(candidate) {
            tracing::debug!("Skipping eviction candidate `{}`: not in graph", candidate);
            continue;
        }

        let closure = upstream_of(candidate, graph)
            .into_iter()
            .filter(|key| !gone.contains(key));
        let (actions, definitions) = graph.split_by_partition(closure);

        tracing::debug!(
            "Evicting `{}` with {} action and {} definition records",
            candidate,
            actions.len(),
            definitions.len()
        );

        // Actions first: an action left behind would reference a missing definition.
        // A key stored in both partitions is removed from both but reported once.
        remove_all(partitions, Partition::Actions, &actions).await?;
        for key in actions {
            if gone.insert(key.clone()) {
                evicted.push(key);
            }
        }

        remove_all(partitions, Partition::Definitions, &definitions).await?;
        for key in definitions {
            if gone.insert(key.clone()) {
                evicted.push(key);
            }
        }

        size = partitions.size_kb().await?;
    }

    tracing::info!(
        evicted = evicted.len(),
        size_kb = size,
        target_kb = target,
        "Graph eviction finished"
    );
    Ok(evicted)
}

async fn remove_all(partitions: &Partitions, partition: Partition, keys: &[String]) -> StoreResult<()> {
    if keys.is_empty() {
        return Ok(());
    }
    partitions
        .get(partition)
        .remove_many(keys)
        .await
        .map_err(|e| match e {
            e @ StoreError::RemovalFailed { .. } => e,
            other => StoreError::RemovalFailed {
                partition,
                key: keys.join(", "),
                reason: other.to_string(),
            },
        })
}
