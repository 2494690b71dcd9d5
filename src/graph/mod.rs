//! Dependency graph over stored records
//!
//! Nodes are record keys (definitions and actions share one namespace), edges
//! point from a record to each record it depends on. The graph is rebuilt from
//! storage on every eviction pass and never cached.

pub mod builder;
pub mod extract;
pub mod sort;
pub mod upstream;

pub use builder::build;
pub use extract::{extract, DESCRIPTOR_FIELD};
pub use sort::{eviction_order, topological_order};
pub use upstream::upstream_of;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// A record key as seen by the eviction engine.
///
/// The partitions are independent, so one key can be stored as both a
/// definition and an action. Such a key is a single node carrying both flags
/// and the union of both records' dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub dependencies: BTreeSet<String>,
    pub is_action: bool,
    pub is_definition: bool,
}

impl GraphNode {
    pub fn definition(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dependencies: BTreeSet::new(),
            is_action: false,
            is_definition: true,
        }
    }

    pub fn action(id: impl Into<String>) -> Self {
        Self {
            is_action: true,
            is_definition: false,
            ..Self::definition(id)
        }
    }

    /// Short label for output: `action`, `definition` or `both`
    pub fn kind(&self) -> &'static str {
        match (self.is_action, self.is_definition) {
            (true, true) => "both",
            (true, false) => "action",
            _ => "definition",
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }
}

/// Record key -> node, with "depends on" edges
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, ()>,
    index: FxHashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes; edges are added for every dependency that is
    /// itself a node. Self references and dangling references are dropped.
    ///
    /// Nodes sharing an id are merged: kind flags are OR-ed and dependencies
    /// united, so a node's `dependencies` always match its outgoing edges.
    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = GraphNode>,
    {
        let mut graph = Self::new();
        let nodes: Vec<GraphNode> = nodes.into_iter().collect();
        for node in &nodes {
            graph.insert_node(node);
        }

        for node in nodes {
            let Some(&from) = graph.index.get(&node.id) else {
                continue;
            };
            for dep in node.dependencies {
                if dep == node.id {
                    continue;
                }
                if let Some(&to) = graph.index.get(&dep) {
                    graph.graph.update_edge(from, to, ());
                    graph.graph[from].dependencies.insert(dep);
                }
            }
        }
        graph
    }

    fn insert_node(&mut self, node: &GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            let existing = &mut self.graph[idx];
            existing.is_action |= node.is_action;
            existing.is_definition |= node.is_definition;
            return idx;
        }
        let idx = self.graph.add_node(GraphNode {
            id: node.id.clone(),
            dependencies: BTreeSet::new(),
            is_action: node.is_action,
            is_definition: node.is_definition,
        });
        self.index.insert(node.id.clone(), idx);
        idx
    }

    // ==================== Queries ====================

    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Stored in the actions partition
    pub fn is_action(&self, id: &str) -> bool {
        self.get(id).is_some_and(|n| n.is_action)
    }

    /// Stored in the definitions partition
    pub fn is_definition(&self, id: &str) -> bool {
        self.get(id).is_some_and(|n| n.is_definition)
    }

    /// Split `keys` into (action keys, definition keys) by where each is
    /// stored. A key held by both partitions lands in both lists; unknown
    /// keys land in neither.
    pub fn split_by_partition<I>(&self, keys: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = String>,
    {
        let mut actions = Vec::new();
        let mut definitions = Vec::new();
        for key in keys {
            let Some(node) = self.get(&key) else {
                continue;
            };
            match (node.is_action, node.is_definition) {
                (true, true) => {
                    actions.push(key.clone());
                    definitions.push(key);
                }
                (true, false) => actions.push(key),
                (false, true) => definitions.push(key),
                (false, false) => {}
            }
        }
        (actions, definitions)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Keys in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes().map(|n| n.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Records this one depends on
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Records that depend directly on this one
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return vec![];
        };
        let mut out: Vec<&str> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Outgoing => e.target(),
                Direction::Incoming => e.source(),
            })
            .map(|n| self.graph[n].id.as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, ()> {
        &self.graph
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nodes_drops_dangling_and_self_edges() {
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("a").with_dependencies(["a", "b", "missing"]),
            GraphNode::definition("b"),
        ]);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependencies_of("a"), vec!["b"]);
        assert_eq!(graph.dependents_of("b"), vec!["a"]);
        assert_eq!(
            graph.get("a").unwrap().dependencies,
            BTreeSet::from(["b".to_string()])
        );
    }

    #[test]
    fn test_kinds_and_order() {
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("plant"),
            GraphNode::action("getTree").with_dependencies(["plant"]),
        ]);
        assert!(graph.is_action("getTree"));
        assert!(!graph.is_action("plant"));
        assert!(!graph.is_action("nope"));
        assert_eq!(graph.ids().collect::<Vec<_>>(), vec!["plant", "getTree"]);
    }

    #[test]
    fn test_shared_key_merges_both_records() {
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("p"),
            GraphNode::definition("q"),
            GraphNode::definition("x").with_dependencies(["p"]),
            GraphNode::action("x").with_dependencies(["q"]),
        ]);

        assert_eq!(graph.len(), 3);
        assert!(graph.is_action("x"));
        assert!(graph.is_definition("x"));
        assert_eq!(graph.get("x").unwrap().kind(), "both");
        assert_eq!(graph.dependencies_of("x"), vec!["p", "q"]);
        assert_eq!(
            graph.get("x").unwrap().dependencies,
            BTreeSet::from(["p".to_string(), "q".to_string()])
        );

        let (actions, definitions) =
            graph.split_by_partition(["x", "p", "ghost"].map(String::from));
        assert_eq!(actions, vec!["x"]);
        assert_eq!(definitions, vec!["x", "p"]);
    }

    #[test]
    fn test_unknown_node_has_no_neighbors() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.dependencies_of("x").is_empty());
        assert!(graph.dependents_of("x").is_empty());
    }
}
