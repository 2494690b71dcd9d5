//! Cycle-safe topological ordering
//!
//! Depth-first walk that tracks the current ancestor path, not just a visited
//! set: reaching a node that is still on the path is a real cycle, reaching a
//! finished node through another branch is not.
//!
//! Order convention: [`topological_order`] emits a node only after all of its
//! dependencies, so it reads dependencies first and dependents last.
//! [`eviction_order`] is the reverse, dependents first, so the records that
//! nothing else depends on come out ahead of the records they use.

use super::DependencyGraph;
use crate::error::{StoreError, StoreResult};
use petgraph::graph::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Every node, each after all of its dependencies.
///
/// Fails with [`StoreError::CycleDetected`] naming the edge that closes a cycle.
pub fn topological_order(graph: &DependencyGraph) -> StoreResult<Vec<String>> {
    let g = graph.inner();
    let mut marks = vec![Mark::Unvisited; g.node_count()];
    let mut order = Vec::with_capacity(g.node_count());

    // Pending dependencies are reversed so popping visits them in key order.
    let pending = |idx: NodeIndex| -> Vec<NodeIndex> {
        g[idx]
            .dependencies
            .iter()
            .rev()
            .filter_map(|dep| graph.node_index(dep))
            .collect()
    };

    for root in g.node_indices() {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }
        marks[root.index()] = Mark::OnPath;
        let mut stack = vec![(root, pending(root))];

        loop {
            let Some(top) = stack.last_mut() else {
                break;
            };
            let node = top.0;
            match top.1.pop() {
                Some(next) => match marks[next.index()] {
                    Mark::OnPath => {
                        return Err(StoreError::CycleDetected {
                            from: g[node].id.clone(),
                            to: g[next].id.clone(),
                        });
                    }
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[next.index()] = Mark::OnPath;
                        stack.push((next, pending(next)));
                    }
                },
                None => {
                    stack.pop();
                    marks[node.index()] = Mark::Done;
                    order.push(g[node].id.clone());
                }
            }
        }
    }

    Ok(order)
}

/// Dependents first: the order the eviction planner walks
pub fn eviction_order(graph: &DependencyGraph) -> StoreResult<Vec<String>> {
    let mut order = topological_order(graph)?;
    order.reverse();
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;
    use std::collections::HashMap;

    fn positions(order: &[String]) -> HashMap<&str, usize> {
        order.iter().enumerate().map(|(i, k)| (k.as_str(), i)).collect()
    }

    fn assert_dependencies_first(graph: &DependencyGraph, order: &[String]) {
        assert_eq!(order.len(), graph.len(), "order must be a permutation");
        let pos = positions(order);
        assert_eq!(pos.len(), graph.len(), "order must not repeat nodes");
        for node in graph.nodes() {
            for dep in &node.dependencies {
                assert!(
                    pos[dep.as_str()] < pos[node.id.as_str()],
                    "{} should come before {}",
                    dep,
                    node.id
                );
            }
        }
    }

    #[test]
    fn test_chain_and_diamond() {
        // d depends on b and c, both depend on a: a diamond is not a cycle
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("d").with_dependencies(["b", "c"]),
            GraphNode::definition("b").with_dependencies(["a"]),
            GraphNode::definition("c").with_dependencies(["a"]),
            GraphNode::definition("a"),
            GraphNode::definition("lonely"),
        ]);
        let order = topological_order(&graph).unwrap();
        assert_dependencies_first(&graph, &order);
    }

    #[test]
    fn test_worked_example_order() {
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("plant"),
            GraphNode::definition("tree").with_dependencies(["plant"]),
            GraphNode::definition("leaf"),
            GraphNode::action("getTree").with_dependencies(["tree", "plant", "leaf"]),
        ]);
        assert_eq!(
            topological_order(&graph).unwrap(),
            vec!["plant", "tree", "leaf", "getTree"]
        );
        assert_eq!(
            eviction_order(&graph).unwrap(),
            vec!["getTree", "leaf", "tree", "plant"]
        );
    }

    #[test]
    fn test_two_node_cycle_names_both_ends() {
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("A").with_dependencies(["B"]),
            GraphNode::definition("B").with_dependencies(["A"]),
        ]);
        match topological_order(&graph) {
            Err(StoreError::CycleDetected { from, to }) => {
                let mut ends = [from, to];
                ends.sort();
                assert_eq!(ends, ["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_longer_cycle_behind_acyclic_prefix() {
        let graph = DependencyGraph::from_nodes([
            GraphNode::definition("root").with_dependencies(["x"]),
            GraphNode::definition("x").with_dependencies(["y"]),
            GraphNode::definition("y").with_dependencies(["z"]),
            GraphNode::definition("z").with_dependencies(["x"]),
        ]);
        match eviction_order(&graph) {
            Err(StoreError::CycleDetected { from, to }) => {
                assert_eq!(from, "z");
                assert_eq!(to, "x");
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_graph() {
        assert!(topological_order(&DependencyGraph::new()).unwrap().is_empty());
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let nodes = (0..20_000).map(|i| {
            let node = GraphNode::definition(format!("n{}", i));
            if i > 0 {
                node.with_dependencies([format!("n{}", i - 1)])
            } else {
                node
            }
        });
        let graph = DependencyGraph::from_nodes(nodes.rev().collect::<Vec<_>>());
        let order = topological_order(&graph).unwrap();
        assert_eq!(order.first().map(String::as_str), Some("n0"));
        assert_eq!(order.last().map(String::as_str), Some("n19999"));
    }
}
