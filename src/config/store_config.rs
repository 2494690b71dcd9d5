//! Store configuration
//!
//! Supports loading config from:
//! - Environment variables
//! - An explicit TOML file, or ~/.config/defstore/config.toml

use super::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Actions the framework needs on every start; never evicted
pub const DEFAULT_BOOTSTRAP_ACTIONS: &[&str] = &[
    "framework://ComponentController/ACTION$getGlobalValueProviders",
    "framework://ComponentController/ACTION$getApplication",
];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Application name, used to derive the default data directory
    pub app_name: String,

    /// Where the database lives (default: per-app cache directory)
    pub data_dir: Option<PathBuf>,

    /// Capacity of the definitions partition
    pub definitions_max_kb: f64,

    /// Capacity of the actions partition
    pub actions_max_kb: f64,

    /// Evict by dependency graph instead of clearing everything when space
    /// runs out
    pub graph_eviction: bool,

    /// Action keys that are never evicted
    pub bootstrap_actions: Vec<String>,

    /// Only restore definitions whose key starts with this prefix
    pub key_prefix: Option<String>,

    /// Lifetime of newly stored records (none = never expire)
    pub expiration_secs: Option<i64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            app_name: "default".to_string(),
            data_dir: None,
            definitions_max_kb: 4096.0,
            actions_max_kb: 4096.0,
            graph_eviction: false,
            bootstrap_actions: DEFAULT_BOOTSTRAP_ACTIONS.iter().map(|s| s.to_string()).collect(),
            key_prefix: None,
            expiration_secs: None,
        }
    }
}

impl StoreConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. `explicit` file if given, else the user config file
    /// 3. Defaults
    ///
    /// A missing default file is fine; an explicit file must exist and parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match paths::user_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path).unwrap_or_else(|e| {
                    tracing::warn!("Ignoring {}: {:#}", path.display(), e);
                    Self::default()
                }),
                None => Self::default(),
            },
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: StoreConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded store config from {}", path.display());
        Ok(config)
    }

    /// Apply `DEFSTORE_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DEFSTORE_GRAPH_EVICTION") {
            self.graph_eviction = parse_bool(&v)
                .with_context(|| format!("DEFSTORE_GRAPH_EVICTION: invalid value `{}`", v))?;
        }
        if let Some(v) = lookup("DEFSTORE_MAX_SIZE_KB") {
            let kb: f64 = v
                .trim()
                .parse()
                .with_context(|| format!("DEFSTORE_MAX_SIZE_KB: invalid value `{}`", v))?;
            self.definitions_max_kb = kb;
            self.actions_max_kb = kb;
        }
        if let Some(v) = lookup("DEFSTORE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Configured data directory, or the per-app default
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| paths::default_data_dir(&self.app_name))
    }

    pub fn store_file(&self) -> PathBuf {
        paths::store_file(&self.data_dir())
    }

    /// Combined capacity of both partitions
    pub fn max_size_kb(&self) -> f64 {
        self.definitions_max_kb + self.actions_max_kb
    }

    /// Write a commented example config to `path` unless one exists
    pub fn init_config(path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if !path.exists() {
            let example = r#"# defstore configuration

# Application name (selects the default data directory)
# app_name = "default"

# Database location (default: ~/.cache/defstore/<app>/)
# data_dir = "/var/lib/myapp/defstore"

# Partition capacities in KB
definitions_max_kb = 4096
actions_max_kb = 4096

# Evict by dependency graph instead of clearing the whole store when space
# runs out. Off by default: clearing is always safe.
graph_eviction = false

# Actions that are never evicted
# bootstrap_actions = ["framework://ComponentController/ACTION$getApplication"]

# Lifetime of stored records in seconds (default: never expire)
# expiration_secs = 86400
"#;
            std::fs::write(path, example)?;
        }

        Ok(path.to_path_buf())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(!config.graph_eviction);
        assert_eq!(config.max_size_kb(), 8192.0);
        assert_eq!(config.bootstrap_actions.len(), 2);
        assert!(config.expiration_secs.is_none());
    }

    #[test]
    fn test_toml_parsing_partial() {
        let toml_str = r#"
app_name = "checkout"
graph_eviction = true
definitions_max_kb = 512
bootstrap_actions = ["boot"]
"#;
        let config: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app_name, "checkout");
        assert!(config.graph_eviction);
        assert_eq!(config.definitions_max_kb, 512.0);
        assert_eq!(config.actions_max_kb, 4096.0);
        assert_eq!(config.bootstrap_actions, vec!["boot"]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DEFSTORE_GRAPH_EVICTION", "yes"),
            ("DEFSTORE_MAX_SIZE_KB", "100"),
            ("DEFSTORE_DATA_DIR", "/tmp/defstore-test"),
        ]
        .into_iter()
        .collect();

        let mut config = StoreConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert!(config.graph_eviction);
        assert_eq!(config.max_size_kb(), 200.0);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/defstore-test"));
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = StoreConfig::default();
        let err = config
            .apply_env(|k| (k == "DEFSTORE_GRAPH_EVICTION").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("DEFSTORE_GRAPH_EVICTION"));
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "graph_eviction = \"sometimes\"").unwrap();
        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
        assert!(StoreConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        StoreConfig::init_config(&path).unwrap();
        let config = StoreConfig::from_file(&path).unwrap();
        assert!(!config.graph_eviction);
        assert_eq!(config.definitions_max_kb, 4096.0);
    }
}
