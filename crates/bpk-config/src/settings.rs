use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use bpk_schemas::RegionId;

pub const DEFAULT_DATABASE_URL_ENV: &str = "BPK_DATABASE_URL";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_SEARCH_RADIUS: f32 = 0.5;
const DEFAULT_LOG_FILTER: &str = "info";

/// Typed engine settings.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub region: RegionId,
    /// Name of the env var holding the Postgres URL (never the URL itself).
    pub database_url_env: String,
    pub max_connections: u32,
    /// Spatial fallback radius when an instance id no longer resolves.
    pub search_radius: f32,
    pub log_filter: String,
}

impl EngineSettings {
    /// Build from canonical config JSON (produced by `load_layered_yaml*`).
    ///
    /// Required: `engine.region`. Everything else has a default.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let region = cfg
            .pointer("/engine/region")
            .and_then(Value::as_u64)
            .context("config missing engine.region")?;
        let region = u16::try_from(region)
            .map_err(|_| anyhow!("engine.region must fit in 16 bits (got {region})"))?;

        let database_url_env = cfg
            .pointer("/store/database_url_env")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_DATABASE_URL_ENV)
            .to_string();
        if database_url_env.trim().is_empty() {
            return Err(anyhow!("store.database_url_env must not be empty"));
        }

        let max_connections = match cfg.pointer("/store/max_connections") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .context("store.max_connections must be a positive integer")?,
        };

        let search_radius = match cfg.pointer("/reconcile/search_radius") {
            None => DEFAULT_SEARCH_RADIUS,
            Some(v) => {
                let r = v
                    .as_f64()
                    .context("reconcile.search_radius must be a number")?;
                if !(r.is_finite() && r >= 0.0) {
                    return Err(anyhow!(
                        "reconcile.search_radius must be finite and >= 0 (got {r})"
                    ));
                }
                r as f32
            }
        };

        let log_filter = cfg
            .pointer("/logging/filter")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LOG_FILTER)
            .to_string();

        Ok(Self {
            region: RegionId(region),
            database_url_env,
            max_connections,
            search_radius,
            log_filter,
        })
    }
}
