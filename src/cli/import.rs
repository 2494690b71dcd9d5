//! Import command - load definitions and actions from a JSON file

use anyhow::{Context, Result};
use console::style;
use defstore::DefStorage;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportFile {
    definitions: indexmap::IndexMap<String, Value>,
    actions: indexmap::IndexMap<String, Value>,
}

pub async fn run(storage: &DefStorage, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let import: ImportFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let defs = import.definitions.len();
    let actions = import.actions.len();
    if defs == 0 && actions == 0 {
        println!("{} Nothing to import", style("!").yellow());
        return Ok(());
    }

    // Definitions go first so actions can reference them
    let mut evicted = 0;
    let mut cleared = false;
    if defs > 0 {
        let report = storage
            .store_definitions(import.definitions.into_iter().collect())
            .await?;
        evicted += report.evicted.len();
        cleared |= report.cleared;
    }
    if actions > 0 {
        let report = storage
            .store_actions(import.actions.into_iter().collect())
            .await?;
        evicted += report.evicted.len();
        cleared |= report.cleared;
    }

    println!(
        "{} Imported {} definitions and {} actions",
        style("✓").green(),
        defs,
        actions
    );
    if cleared {
        println!("  {} Store was cleared to make room", style("!").yellow());
    } else if evicted > 0 {
        println!("  {} records evicted to make room", evicted);
    }
    Ok(())
}
