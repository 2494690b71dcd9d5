//! Stats command - partition sizes and eviction target

use anyhow::Result;
use console::style;
use defstore::{target_size_kb, DefStorage};

pub async fn run(storage: &DefStorage) -> Result<()> {
    let config = storage.config();
    println!("\n{}\n", style("defstore").bold());
    println!("  Store file: {}", style(config.store_file().display()).cyan());
    println!(
        "  Graph eviction: {}",
        if config.graph_eviction {
            style("enabled").green()
        } else {
            style("disabled (clear when full)").yellow()
        }
    );
    println!();

    let mut total = 0.0;
    for (partition, size, max) in storage.sizes().await? {
        let records = storage.partitions().get(partition).get_all(None, true).await?.len();
        let pct = if max > 0.0 { size / max * 100.0 } else { 0.0 };
        println!(
            "  {:<12} {:>10.1} KB / {:>8.0} KB ({:>5.1}%)  {} records",
            partition.as_str(),
            size,
            max,
            pct,
            records
        );
        total += size;
    }

    let max = storage.partitions().max_size_kb();
    println!(
        "\n  Total {:.1} KB, eviction target {:.1} KB",
        total,
        target_size_kb(max, 0.0)
    );
    Ok(())
}
