//! Dependency extraction from serialized records
//!
//! A record references another record by carrying its key under the reserved
//! `"descriptor"` field, at any depth. Extraction is structural recursion over
//! plain JSON, so it always terminates.

use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::BTreeSet;

/// Field name that marks a cross-reference to another record
pub const DESCRIPTOR_FIELD: &str = "descriptor";

/// Keys referenced by `value` that are members of `candidates`.
///
/// Never returns `self_key`.
pub fn extract(self_key: &str, value: &Value, candidates: &FxHashSet<String>) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect(self_key, value, candidates, &mut found);
    found
}

fn collect(self_key: &str, value: &Value, candidates: &FxHashSet<String>, found: &mut BTreeSet<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(self_key, item, candidates, found);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                if key == DESCRIPTOR_FIELD {
                    if let Value::String(target) = child {
                        if target != self_key && candidates.contains(target) {
                            found.insert(target.clone());
                        }
                        continue;
                    }
                }
                collect(self_key, child, candidates, found);
            }
        }
        _ => {}
    }
}
