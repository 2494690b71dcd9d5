//! Init command - write an example config file

use anyhow::{Context, Result};
use console::style;
use defstore::config::user_config_path;
use defstore::StoreConfig;
use std::path::PathBuf;

pub fn run(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => user_config_path().context("Could not determine the user config directory")?,
    };

    let existed = path.exists();
    let written = StoreConfig::init_config(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if existed {
        println!(
            "{} Config already exists at {}",
            style("✓").green(),
            style(written.display()).cyan()
        );
    } else {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(written.display()).cyan()
        );
        println!("  Set graph_eviction = true to evict by dependency graph instead of clearing.");
    }
    Ok(())
}
