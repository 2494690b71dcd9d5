//! Evict and clear commands

use anyhow::{Context, Result};
use console::style;
use defstore::eviction::plan;
use defstore::{eviction_order, target_size_kb, DefStorage, EvictionReport};
use rustc_hash::FxHashMap;

/// Make room for `required_kb`, or with `dry_run` only list what graph
/// eviction would remove
pub async fn run(storage: &DefStorage, required_kb: f64, dry_run: bool) -> Result<()> {
    if dry_run {
        return preview(storage, required_kb).await;
    }

    let report = storage.ensure_free_space(required_kb).await?;
    print_report(&report, required_kb);
    Ok(())
}

pub async fn clear(storage: &DefStorage, reason: &str) -> Result<()> {
    let before = storage.partitions().size_kb().await.unwrap_or(0.0);
    storage.clear_all(reason).await?;
    println!(
        "{} Cleared definitions and actions ({:.1} KB freed)",
        style("✓").green(),
        before
    );
    Ok(())
}

async fn preview(storage: &DefStorage, required_kb: f64) -> Result<()> {
    let partitions = storage.partitions();
    let size = partitions.size_kb().await?;
    let target = target_size_kb(partitions.max_size_kb(), required_kb);

    if size <= target {
        println!(
            "{} {:.1} KB used, target {:.1} KB: nothing to evict",
            style("✓").green(),
            size,
            target
        );
        return Ok(());
    }

    let graph = storage.dependency_graph().await?;
    let order = eviction_order(&graph).context("Graph eviction would fall back to clearing")?;

    let mut footprints: FxHashMap<String, f64> = FxHashMap::default();
    for store in [&partitions.definitions, &partitions.actions] {
        for (key, record) in store.get_all(None, true).await? {
            let kb = record.footprint(&key) as f64 / 1024.0;
            *footprints.entry(key).or_insert(0.0) += kb;
        }
    }

    let planned = plan(&order, &graph, &footprints, size, target);
    let freed: f64 = planned.iter().filter_map(|k| footprints.get(k)).sum();

    println!(
        "\n{} {:.1} KB used, target {:.1} KB for {:.1} KB more\n",
        style("Dry run:").bold(),
        size,
        target,
        required_kb
    );
    for key in &planned {
        let kind = graph.get(key).map_or("definition", |node| node.kind());
        println!(
            "  {} [{}] {} ({:.1} KB)",
            style("-").red(),
            kind,
            key,
            footprints.get(key).copied().unwrap_or(0.0)
        );
    }
    println!("\n  {} records, ~{:.1} KB would be freed", planned.len(), freed);
    if size - freed > target {
        println!(
            "  {} Still above target afterwards; the rest is not evictable",
            style("!").yellow()
        );
    }
    Ok(())
}

fn print_report(report: &EvictionReport, required_kb: f64) {
    if report.cleared {
        println!(
            "{} Store cleared ({:.1} KB -> {})",
            style("✓").yellow(),
            report.size_before_kb,
            format_kb(report.size_after_kb)
        );
    } else if report.evicted.is_empty() {
        println!(
            "{} {:.1} KB more fits, nothing evicted",
            style("✓").green(),
            required_kb
        );
    } else {
        println!(
            "{} Evicted {} records, freed {}",
            style("✓").green(),
            report.evicted.len(),
            format_kb(report.freed_kb())
        );
        for key in &report.evicted {
            println!("  {} {}", style("-").red(), key);
        }
    }
}

fn format_kb(kb: Option<f64>) -> String {
    match kb {
        Some(kb) => format!("{:.1} KB", kb),
        None => "unknown size".to_string(),
    }
}
