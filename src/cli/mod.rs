//! CLI command definitions and handlers

mod evict;
mod graph;
mod import;
mod init;
mod stats;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use defstore::{DefStorage, StoreConfig};
use std::path::PathBuf;

/// Parse and validate a size in KB (non-negative, finite)
fn parse_kb(s: &str) -> Result<f64, String> {
    let kb: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if !kb.is_finite() || kb < 0.0 {
        Err("size must be a non-negative number of KB".to_string())
    } else {
        Ok(kb)
    }
}

/// defstore - inspect and maintain a persistent definition store
#[derive(Parser, Debug)]
#[command(name = "defstore")]
#[command(
    version,
    about = "Inspect and maintain a persistent component definition store",
    after_help = "\
Examples:
  defstore stats                       Partition sizes and eviction target
  defstore graph                       Eviction order with dependencies
  defstore evict 512 --dry-run         What making room for 512 KB would remove
  defstore import defs.json            Load definitions and actions from JSON
  defstore clear                       Wipe both partitions"
)]
pub struct Cli {
    /// Config file (default: ~/.config/defstore/config.toml)
    #[arg(long, short = 'c', global = true, env = "DEFSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example config file
    Init {
        /// Where to write it (default: user config path)
        path: Option<PathBuf>,
    },

    /// Show partition sizes, capacities and the eviction target
    Stats,

    /// Show the dependency graph in eviction order (dependents first)
    Graph {
        /// Output format (table, json)
        #[arg(long, default_value = "table", value_parser = ["table", "json"])]
        format: String,
    },

    /// Make room for REQUIRED_KB more, evicting or clearing per config
    #[command(after_help = "\
Examples:
  defstore evict 256                  Free space the way the store would on a put
  defstore evict 256 --graph          Force dependency-graph eviction
  defstore evict 256 --dry-run        Only show what graph eviction would remove")]
    Evict {
        /// KB that must fit after eviction
        #[arg(value_parser = parse_kb)]
        required_kb: f64,

        /// Use graph eviction even if the config disables it
        #[arg(long)]
        graph: bool,

        /// Preview without removing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every definition and action
    Clear {
        /// Reason recorded in the log
        #[arg(long, default_value = "manual clear")]
        reason: String,
    },

    /// Store definitions and actions from a JSON file
    /// ({"definitions": {key: value}, "actions": {key: value}})
    Import {
        file: PathBuf,
    },

    /// Show version information
    Version,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    let load = || StoreConfig::load(config_path.as_deref());
    match cli.command {
        Commands::Init { path } => init::run(path.or(config_path.clone())),
        Commands::Version => {
            println!("defstore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Stats => {
            let config = load()?;
            block_on(async { stats::run(&open(config).await?).await })
        }
        Commands::Graph { format } => {
            let config = load()?;
            block_on(async { graph::run(&open(config).await?, &format).await })
        }
        Commands::Evict {
            required_kb,
            graph,
            dry_run,
        } => {
            let config = with_graph_flag(load()?, graph);
            block_on(async { evict::run(&open(config).await?, required_kb, dry_run).await })
        }
        Commands::Clear { reason } => {
            let config = load()?;
            block_on(async { evict::clear(&open(config).await?, &reason).await })
        }
        Commands::Import { file } => {
            let config = load()?;
            block_on(async { import::run(&open(config).await?, &file).await })
        }
    }
}

/// Drive a store command to completion on a fresh tokio runtime
fn block_on<F>(command: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::runtime::Runtime::new()?.block_on(command)
}

/// `--graph` turns graph eviction on; it never turns it off
fn with_graph_flag(config: StoreConfig, graph: bool) -> StoreConfig {
    StoreConfig {
        graph_eviction: config.graph_eviction || graph,
        ..config
    }
}

async fn open(config: StoreConfig) -> Result<DefStorage> {
    let file = config.store_file();
    DefStorage::open(config)
        .await
        .with_context(|| format!("Failed to open store at {}", file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kb() {
        assert_eq!(parse_kb("512"), Ok(512.0));
        assert_eq!(parse_kb("0.5"), Ok(0.5));
        assert!(parse_kb("-1").is_err());
        assert!(parse_kb("lots").is_err());
    }

    #[test]
    fn test_cli_parses_evict() {
        let cli = Cli::try_parse_from(["defstore", "evict", "64", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Evict {
                required_kb,
                graph,
                dry_run,
            } => {
                assert_eq!(required_kb, 64.0);
                assert!(!graph);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_graph_flag_only_enables_graph_eviction() {
        let off = StoreConfig::default();
        assert!(!with_graph_flag(off.clone(), false).graph_eviction);
        assert!(with_graph_flag(off, true).graph_eviction);

        let on = StoreConfig {
            graph_eviction: true,
            ..StoreConfig::default()
        };
        assert!(with_graph_flag(on, false).graph_eviction);
    }

    #[test]
    fn test_version_runs_without_a_store() {
        let cli = Cli::try_parse_from(["defstore", "version"]).unwrap();
        assert!(run(cli).is_ok());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
