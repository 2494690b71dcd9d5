//! Dry-run eviction planning from per-record size estimates

use crate::graph::{upstream_of, DependencyGraph};
use rustc_hash::{FxHashMap, FxHashSet};

/// Keys [`super::evict`] would remove, assuming each key frees
/// `footprints[key]` KB (summed over both partitions) and nothing else
/// changes the store meanwhile.
pub fn plan(
    ordered: &[String],
    graph: &DependencyGraph,
    footprints: &FxHashMap<String, f64>,
    size_kb: f64,
    target_kb: f64,
) -> Vec<String> {
    let mut size = size_kb;
    let mut gone: FxHashSet<String> = FxHashSet::default();
    let mut planned = Vec::new();

    for candidate in ordered {
        if size <= target_kb {
            break;
        }
        if gone.contains(candidate) || !graph.contains(candidate) {
            continue;
        }
        let closure = upstream_of(candidate, graph)
            .into_iter()
            .filter(|key| !gone.contains(key));
        let (actions, definitions) = graph.split_by_partition(closure);

        for key in actions.into_iter().chain(definitions) {
            if gone.insert(key.clone()) {
                size -= footprints.get(&key).copied().unwrap_or(0.0);
                planned.push(key);
            }
        }
    }
    planned
}
