//! bpk-db
//!
//! Snapshot persistence: the [`SnapshotStore`] trait and its Postgres adapter.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

mod pg;
mod store;

pub use pg::PgSnapshotStore;
pub use store::{InstanceKey, ReplaceOutcome, SnapshotStore};

pub const ENV_DB_URL: &str = "BPK_DATABASE_URL";

/// Connect to Postgres.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Snapshot tables the store needs.
pub const SNAPSHOT_TABLES: &[&str] = &[
    "placed_objects",
    "placed_object_instances",
    "placed_object_items",
    "placed_object_displays",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStatus {
    pub ok: bool,
    /// Every table in [`SNAPSHOT_TABLES`] exists.
    pub has_snapshot_tables: bool,
}

/// Connectivity plus schema presence, in one round trip.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let names: Vec<String> = SNAPSHOT_TABLES.iter().map(|t| format!("public.{t}")).collect();
    let row = sqlx::query(
        "select count(*) filter (where to_regclass(t) is not null) as present \
         from unnest($1::text[]) as t",
    )
    .bind(&names)
    .fetch_one(pool)
    .await
    .context("snapshot schema check failed")?;

    let present: i64 = row.try_get("present").context("decode schema check")?;
    Ok(DbStatus {
        ok: true,
        has_snapshot_tables: present == SNAPSHOT_TABLES.len() as i64,
    })
}
