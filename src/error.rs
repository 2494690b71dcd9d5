//! Error types for the definition store
//!
//! Every failure inside the eviction pipeline bubbles up as a [`StoreError`]
//! to the single caller that asked for space. That caller decides whether to
//! fall back to a full clear; nothing in here retries.

use crate::storage::Partition;
use thiserror::Error;

/// Errors raised by record stores, the graph engine and the eviction planner
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store is absent or not persistent. Callers treat this as
    /// "nothing to prune" rather than a failure.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("dependency cycle detected: `{from}` -> `{to}`")]
    CycleDetected { from: String, to: String },

    #[error("failed to remove `{key}` from {partition}: {reason}")]
    RemovalFailed {
        partition: Partition,
        key: String,
        reason: String,
    },

    #[error("failed to measure {partition} size: {reason}")]
    SizeQueryFailed { partition: Partition, reason: String },

    #[error("failed to read {partition} records: {reason}")]
    ReadFailed { partition: Partition, reason: String },

    #[error("failed to write {partition} records: {reason}")]
    WriteFailed { partition: Partition, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for conditions that mean "there is no persistent store to manage"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
