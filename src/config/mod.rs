//! Configuration module for defstore
//!
//! This module handles:
//! - Store configuration (defstore.toml / environment)
//! - Data directory and database file locations

pub mod paths;
mod store_config;

pub use paths::{default_data_dir, store_file, user_config_path};
pub use store_config::{StoreConfig, DEFAULT_BOOTSTRAP_ACTIONS};
