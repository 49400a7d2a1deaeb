//! bpk-config
//!
//! Layered YAML configuration for the persistence engine:
//! - merge layers (later overrides earlier), canonicalize, hash
//! - refuse literal secrets (only env var NAMES belong in config)
//! - report keys nothing reads
//! - typed [`EngineSettings`] extraction

mod layers;
mod secrets;
mod settings;
mod unused;

pub use layers::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
pub use secrets::{resolve_database_url, DatabaseUrl};
pub use settings::{EngineSettings, DEFAULT_DATABASE_URL_ENV};
pub use unused::{consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};

use serde_json::Value;

/// Every scalar leaf of `v` with its JSON pointer, in document order.
/// An empty object or array counts as a leaf.
pub(crate) fn leaves(v: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), v)];

    while let Some((ptr, node)) = stack.pop() {
        match node {
            Value::Object(map) if !map.is_empty() => {
                for (k, child) in map.iter().rev() {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    stack.push((format!("{ptr}/{token}"), child));
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push((format!("{ptr}/{i}"), child));
                }
            }
            leaf => {
                let ptr = if ptr.is_empty() { "/".to_string() } else { ptr };
                out.push((ptr, leaf));
            }
        }
    }
    out
}
