//! defstore - persistent component definition cache
//!
//! Stores component definitions and server action results across runs, and
//! decides what to remove when storage runs out: records are evicted in whole
//! upstream closures over a dependency graph built from the `"descriptor"`
//! references inside each record, so the store never holds a record without
//! everything it depends on.
//!
//! # Example
//!
//! ```rust,ignore
//! use defstore::{DefStorage, StoreConfig};
//!
//! let storage = DefStorage::open(StoreConfig::load(None)?).await?;
//! storage.store_definitions(vec![("markup://ui:button".into(), config)]).await?;
//! ```

pub mod config;
pub mod def_storage;
pub mod error;
pub mod eviction;
pub mod gate;
pub mod graph;
pub mod storage;

pub use config::StoreConfig;
pub use def_storage::{DefStorage, TRANSACTION_SENTINEL_KEY};
pub use error::{StoreError, StoreResult};
pub use eviction::{evict, target_size_kb, EvictionReport, HEADROOM, LOAD_FACTOR};
pub use gate::MutationGate;
pub use graph::{
    build, eviction_order, extract, topological_order, upstream_of, DependencyGraph, GraphNode,
    DESCRIPTOR_FIELD,
};
pub use storage::{MemoryStore, Partition, Partitions, RecordStore, RedbStore, StoredRecord};
