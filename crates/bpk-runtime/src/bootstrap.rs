//! Process bootstrap: env, config, store, simulation thread, engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use bpk_config::{
    load_layered_yaml, report_unused_keys, resolve_database_url, EngineSettings, LoadedConfig,
    UnusedKeyPolicy,
};
use bpk_db::PgSnapshotStore;
use bpk_reconcile::{AssetResolver, LiveContext, LiveWorldIndex, OwnershipReplicator};

use crate::engine::ReconciliationEngine;
use crate::sim::SimThread;

pub const DOTENV_FILE: &str = ".env.local";
pub const SIM_THREAD_NAME: &str = "bpk-sim";

/// Load `.env.local` if present. A missing file is not an error.
pub fn load_dotenv() {
    match dotenvy::from_filename(DOTENV_FILE) {
        Ok(path) => info!(path = %path.display(), "loaded env file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable env file"),
    }
}

/// Load layered config, warn on unused keys and extract typed settings.
pub fn load_settings(paths: &[&str]) -> Result<(LoadedConfig, EngineSettings)> {
    let loaded = load_layered_yaml(paths)?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &unused.unused {
        warn!(key = %key, "config key is not read by anything");
    }
    let settings = EngineSettings::from_config_json(&loaded.config_json)?;
    info!(
        config_hash = %loaded.config_hash,
        region = %settings.region,
        "config loaded"
    );
    Ok((loaded, settings))
}

/// Connect and migrate the Postgres store named by `settings`.
pub async fn connect_store(settings: &EngineSettings) -> Result<PgSnapshotStore> {
    let url = resolve_database_url(settings)?;
    let pool = bpk_db::connect(url.expose(), settings.max_connections)
        .await
        .with_context(|| format!("connecting via {}", url.env_name()))?;
    bpk_db::migrate(&pool).await?;
    Ok(PgSnapshotStore::new(pool))
}

/// Wire a Postgres-backed engine whose live context runs on a dedicated
/// simulation thread.
pub async fn open_engine<W, A, O>(
    settings: &EngineSettings,
    live: LiveContext<W, A, O>,
) -> Result<ReconciliationEngine<PgSnapshotStore, W, A, O>>
where
    W: LiveWorldIndex + Send + 'static,
    A: AssetResolver + Send + 'static,
    O: OwnershipReplicator + Send + 'static,
{
    let store = connect_store(settings).await?;
    let sim = SimThread::spawn(SIM_THREAD_NAME, live)?;
    Ok(ReconciliationEngine::from_settings(
        Arc::new(store),
        sim,
        settings,
    ))
}
