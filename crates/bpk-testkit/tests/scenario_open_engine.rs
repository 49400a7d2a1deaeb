//! Scenario: a Postgres-backed engine is opened from settings.
//!
//! - The database URL comes from the env var the settings name; an unset var
//!   fails before anything connects.
//! - With a database available the engine runs a full load/save/restore
//!   cycle against it.
//!
//! The second test is DB-backed. Skips if `BPK_DATABASE_URL` is not set.

use bpk_config::EngineSettings;
use bpk_reconcile::LiveContext;
use bpk_runtime::bootstrap::open_engine;
use bpk_schemas::{MapId, ObjectRef, RegionId, Vec3};
use bpk_testkit::fixtures::{asset, structure};
use bpk_testkit::{FakeAssets, FakeOwnership, FakeWorld};
use uuid::Uuid;

fn settings(database_url_env: &str) -> EngineSettings {
    EngineSettings {
        region: RegionId(3),
        database_url_env: database_url_env.to_string(),
        max_connections: 2,
        search_radius: 0.5,
        log_filter: "info".to_string(),
    }
}

fn live() -> (LiveContext<FakeWorld, FakeAssets, FakeOwnership>, ObjectRef) {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(asset(1), Vec3::new(1.0, 0.0, 1.0), Vec3::ZERO));
    let ctx = LiveContext::new(
        world,
        FakeAssets::new().with(asset(1), "wall"),
        FakeOwnership::new(),
    );
    (ctx, wall)
}

#[tokio::test]
async fn unset_url_env_fails_before_connecting() {
    let (ctx, _) = live();
    let err = match open_engine(&settings("BPK_TEST_DB_URL_NEVER_SET"), ctx).await {
        Ok(_) => panic!("engine opened without a database URL"),
        Err(e) => e,
    };
    assert!(
        err.to_string().contains("BPK_TEST_DB_URL_NEVER_SET"),
        "{err}"
    );
}

#[tokio::test]
async fn engine_round_trips_through_postgres() {
    if std::env::var(bpk_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: BPK_DATABASE_URL not set");
        return;
    }

    let (ctx, wall) = live();
    let engine = open_engine(&settings(bpk_db::ENV_DB_URL), ctx).await.unwrap();
    assert_eq!(engine.region(), RegionId(3));

    // Fresh map id per run so concurrent test runs do not collide.
    let map = MapId((Uuid::new_v4().as_u128() & 0x7FFF_FFFF) as u32);
    engine.on_map_load(map).await.unwrap();
    assert!(engine.save_or_update(wall).await.unwrap());
    assert!(engine
        .is_saved(wall.instance_id, wall.kind)
        .await
        .unwrap());

    let summary = engine.restore_all().await.unwrap();
    assert_eq!((summary.inspected, summary.dirty), (1, 0));

    assert!(engine.discard(wall.instance_id, wall.kind).await.unwrap());
    assert!(engine.get_all_snapshots().await.unwrap().is_empty());
}
