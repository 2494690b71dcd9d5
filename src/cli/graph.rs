//! Graph command - dependency graph in eviction order

use anyhow::Result;
use console::style;
use defstore::{eviction_order, DefStorage, StoreError};
use serde_json::json;

pub async fn run(storage: &DefStorage, format: &str) -> Result<()> {
    let graph = storage.dependency_graph().await?;

    let order = match eviction_order(&graph) {
        Ok(order) => order,
        Err(StoreError::CycleDetected { from, to }) => {
            if format == "json" {
                println!("{}", json!({ "cycle": { "from": from, "to": to } }));
            } else {
                println!(
                    "{} Dependency cycle: {} -> {}",
                    style("✗").red(),
                    style(&from).cyan(),
                    style(&to).cyan()
                );
                println!("  Graph eviction cannot order this store; it will be cleared instead.");
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if format == "json" {
        let nodes: Vec<_> = order
            .iter()
            .filter_map(|id| graph.get(id))
            .map(|node| {
                json!({
                    "id": node.id,
                    "kind": node.kind(),
                    "dependencies": node.dependencies,
                    "dependents": graph.dependents_of(&node.id),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    println!(
        "\n{} nodes, {} edges (eviction order, dependents first)\n",
        graph.len(),
        graph.edge_count()
    );
    for (i, id) in order.iter().enumerate() {
        let Some(node) = graph.get(id) else {
            continue;
        };
        let kind = match node.kind() {
            "definition" => style("def").blue(),
            other => style(other).magenta(),
        };
        println!("  {:>4}. [{}] {}", i + 1, kind, node.id);
        for dep in &node.dependencies {
            println!("        -> {}", style(dep).dim());
        }
    }
    Ok(())
}
