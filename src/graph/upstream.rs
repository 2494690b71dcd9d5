//! Upstream closure: everything that would dangle if a record went away

use super::DependencyGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BTreeSet;

/// `root` plus every node that depends on it, directly or transitively.
///
/// Evicting `root` without this whole set would leave stored records pointing
/// at a missing record. An unknown `root` yields just `{root}`.
pub fn upstream_of(root: &str, graph: &DependencyGraph) -> BTreeSet<String> {
    let mut closure = BTreeSet::from([root.to_string()]);
    let Some(start) = graph.node_index(root) else {
        return closure;
    };

    let g = graph.inner();
    let mut queue = vec![start];
    while let Some(current) = queue.pop() {
        for edge in g.edges_directed(current, Direction::Incoming) {
            let dependent = edge.source();
            if closure.insert(g[dependent].id.clone()) {
                queue.push(dependent);
            }
        }
    }
    closure
}
