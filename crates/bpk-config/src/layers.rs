use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::leaves;

/// Leaf values starting with one of these are credentials, not config.
const SECRET_PREFIXES: &[&str] = &["-----BEGIN", "ghp_", "glpat-", "AKIA"];

/// A connection string in config would carry its password with it.
const CONNECTION_SCHEMES: &[&str] = &["postgres://", "postgresql://"];

/// Merged configuration plus its stable identity.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// sha256 (hex) of `canonical_json`.
    pub config_hash: String,
    /// Compact JSON with keys sorted at every level.
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("read config layer {p}")))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Merge YAML layers in order; later layers win key by key.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(serde_json::Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("config layer {i} is not valid yaml"))?;
        let layer = serde_json::to_value(layer)
            .with_context(|| format!("config layer {i} has no json form"))?;
        merge_into(&mut merged, layer);
    }

    reject_secret_literals(&merged)?;

    let canonical_json = serde_json::to_string(&canonical(&merged))
        .context("canonical config serialization failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge recursively; anything else is replaced by the overlay.
fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(slot) => merge_into(slot, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn canonical(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn reject_secret_literals(v: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(v) {
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    CONNECTION_SCHEMES.iter().any(|p| t.starts_with(p))
        || (t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_replaces_scalars_and_merges_objects() {
        let mut base = json!({ "a": { "x": 1, "y": 2 }, "b": [1, 2] });
        merge_into(&mut base, json!({ "a": { "y": 3 }, "b": [9] }));
        assert_eq!(base, json!({ "a": { "x": 1, "y": 3 }, "b": [9] }));
    }

    #[test]
    fn connection_strings_look_like_secrets() {
        assert!(looks_like_secret("postgres://u:p@host/db"));
        assert!(looks_like_secret("  postgresql://host/db"));
        assert!(!looks_like_secret("BPK_DATABASE_URL"));
        assert!(!looks_like_secret("AKIA"));
    }
}
