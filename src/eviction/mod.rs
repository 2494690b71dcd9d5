//! Eviction planning and execution
//!
//! When the store nears capacity, records are removed in whole upstream
//! closures (a record never goes without everything that depends on it) until
//! the combined size of both partitions drops to the target.

mod executor;
mod plan;

pub use executor::evict;
pub use plan::plan;

use serde::Serialize;

/// Fraction of capacity the store is trimmed down to
pub const LOAD_FACTOR: f64 = 0.75;

/// Fraction of capacity kept free for writes that follow immediately
pub const HEADROOM: f64 = 0.1;

/// Size (KB) the store must be at or below so `required_kb` more fits.
///
/// `min(max * LOAD_FACTOR, max - max * HEADROOM - required_kb)`; negative when
/// the request cannot fit even in an empty store.
pub fn target_size_kb(max_kb: f64, required_kb: f64) -> f64 {
    (max_kb * LOAD_FACTOR).min(max_kb - max_kb * HEADROOM - required_kb)
}

/// What a space request did to the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvictionReport {
    /// Keys removed by graph eviction, in removal order
    pub evicted: Vec<String>,
    /// Whether both partitions were wiped instead
    pub cleared: bool,
    pub size_before_kb: f64,
    /// `None` when the store could not be measured afterwards
    pub size_after_kb: Option<f64>,
}

impl EvictionReport {
    /// Nothing had to be done
    pub fn untouched(size_kb: f64) -> Self {
        Self {
            size_before_kb: size_kb,
            size_after_kb: Some(size_kb),
            ..Self::default()
        }
    }

    /// KB freed, if the size afterwards is known
    pub fn freed_kb(&self) -> Option<f64> {
        self.size_after_kb
            .map(|after| (self.size_before_kb - after).max(0.0))
    }
}
