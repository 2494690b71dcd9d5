//! Builds the dependency graph from a snapshot of both partitions

use super::{extract, DependencyGraph, GraphNode};
use crate::error::StoreResult;
use crate::storage::Partitions;
use rustc_hash::FxHashSet;

/// Read every definition and action (expired ones included, they still take
/// space) and turn them into a [`DependencyGraph`].
///
/// Bootstrap actions are left out entirely: they are never nodes and never
/// dependency targets. Definitions are inserted before actions, each in the
/// order the store returns them. Fails without a partial graph if either
/// read fails.
pub async fn build(partitions: &Partitions, bootstrap_actions: &[String]) -> StoreResult<DependencyGraph> {
    let (definitions, actions) = tokio::try_join!(
        partitions.definitions.get_all(None, true),
        partitions.actions.get_all(None, true),
    )?;

    let excluded: FxHashSet<&str> = bootstrap_actions.iter().map(String::as_str).collect();
    let actions: Vec<_> = actions
        .into_iter()
        .filter(|(key, _)| !excluded.contains(key.as_str()))
        .collect();

    let candidates: FxHashSet<String> = definitions
        .keys()
        .cloned()
        .chain(actions.iter().map(|(k, _)| k.clone()))
        .collect();

    let mut nodes = Vec::with_capacity(definitions.len() + actions.len());
    for (key, record) in &definitions {
        let deps = extract(key, &record.value, &candidates);
        nodes.push(GraphNode::definition(key.clone()).with_dependencies(deps));
    }
    for (key, record) in &actions {
        let deps = extract(key, &record.value, &candidates);
        nodes.push(GraphNode::action(key.clone()).with_dependencies(deps));
    }

    let graph = DependencyGraph::from_nodes(nodes);
    tracing::debug!(
        "Built dependency graph: {} nodes, {} edges ({} bootstrap actions excluded)",
        graph.len(),
        graph.edge_count(),
        excluded.len()
    );
    Ok(graph)
}
