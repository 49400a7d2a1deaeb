use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::leaves;

/// Pointer prefixes the engine reads. Any leaf outside them is unused.
const CONSUMED_POINTERS: &[&str] = &[
    "/engine/region",
    "/store/database_url_env",
    "/store/max_connections",
    "/reconcile/search_radius",
    "/logging/filter",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumed: Vec<String>,
    /// Sorted, unique.
    pub unused: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused.is_empty()
    }
}

pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED_POINTERS
}

/// List config leaves no consumer reads. `Fail` turns a non-empty list into
/// an error; `Warn` leaves reporting to the caller.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !CONSUMED_POINTERS.iter().any(|c| covers(c, ptr)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed: CONSUMED_POINTERS.iter().map(|s| s.to_string()).collect(),
        unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report.unused.iter().take(12).map(String::as_str).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) are not read by anything: {shown:?}",
            report.unused.len()
        );
    }
    Ok(report)
}

/// Segment-wise prefix test: "/a/b" covers "/a/b" and "/a/b/c", not "/a/bc".
fn covers(prefix: &str, leaf: &str) -> bool {
    let mut leaf_segments = leaf.split('/').filter(|s| !s.is_empty());
    prefix
        .split('/')
        .filter(|s| !s.is_empty())
        .all(|p| leaf_segments.next() == Some(p))
}
