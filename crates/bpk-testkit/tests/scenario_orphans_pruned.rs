//! Scenario: snapshots that can never be restored are deleted.
//!
//! - Asset no longer resolves and no live object exists: pruned.
//! - Asset resolves but the host refuses to place the object: pruned.
//! - Asset no longer resolves but the live object still exists: kept.

use bpk_reconcile::capture_snapshot;
use bpk_schemas::Vec3;
use bpk_testkit::fixtures::{asset, barricade, structure};
use bpk_testkit::{
    FakeAssets, FakeOwnership, FakeWorld, Harness, StoreOp, WorldCall, TEST_MAP, TEST_REGION,
};

fn assets() -> FakeAssets {
    FakeAssets::new()
        .with(asset(1), "wall")
        .with(asset(2), "sign")
}

#[tokio::test]
async fn unresolvable_asset_without_live_object_is_pruned() {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(asset(1), Vec3::new(5.0, 0.0, 5.0), Vec3::ZERO));
    let sign = world.place(barricade(asset(2), Vec3::new(9.0, 0.0, 9.0), b"x"));
    let h = Harness::new(world, assets(), FakeOwnership::new()).unwrap();

    h.engine.on_map_load(TEST_MAP).await.unwrap();
    h.engine.save_or_update(wall).await.unwrap();
    h.engine.save_or_update(sign).await.unwrap();

    h.live(move |ctx| {
        ctx.world.forget(wall);
        ctx.assets.remove(asset(1));
    })
    .await
    .unwrap();

    let summary = h.engine.restore_all().await.unwrap();
    assert_eq!(summary.inspected, 2);
    assert_eq!(summary.pruned, 1);

    let rows = h.store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].asset, asset(2));

    let calls = h.world(|w| w.take_calls()).await.unwrap();
    assert!(!calls.iter().any(|c| matches!(c, WorldCall::Spawn { .. })));

    // Not retried: the next pass has nothing left to prune.
    let again = h.engine.restore_all().await.unwrap();
    assert_eq!((again.inspected, again.pruned), (1, 0));
}

#[tokio::test]
async fn rejected_recreation_is_pruned() {
    let mut world = FakeWorld::new();
    let sign = world.place(barricade(asset(2), Vec3::new(9.0, 0.0, 9.0), b"x"));
    let h = Harness::new(world, assets(), FakeOwnership::new()).unwrap();

    h.engine.on_map_load(TEST_MAP).await.unwrap();
    h.engine.save_or_update(sign).await.unwrap();

    h.world(move |w| {
        w.forget(sign);
        w.reject_spawns("placement blocked");
    })
    .await
    .unwrap();

    let summary = h.engine.restore_all().await.unwrap();
    assert_eq!(summary.pruned, 1);
    assert!(h.store.is_empty());
    assert_eq!(h.store.count(StoreOp::CommitPass), 1);
}

#[tokio::test]
async fn unresolvable_asset_with_live_object_is_kept() {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(asset(1), Vec3::new(5.0, 0.0, 5.0), Vec3::ZERO));
    let h = Harness::new(world, assets(), FakeOwnership::new()).unwrap();

    h.engine.on_map_load(TEST_MAP).await.unwrap();
    h.engine.save_or_update(wall).await.unwrap();
    h.live(|ctx| ctx.assets.remove(asset(1))).await.unwrap();

    let summary = h.engine.restore_all().await.unwrap();
    assert_eq!(summary.pruned, 0);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn seeded_orphan_from_an_old_session_is_pruned_on_load() {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(asset(1), Vec3::new(5.0, 0.0, 5.0), Vec3::ZERO));
    let orphan_live = world.get(wall).cloned().unwrap();
    world.forget(wall);

    let h = Harness::new(world, FakeAssets::new(), FakeOwnership::new()).unwrap();
    h.store
        .seed(capture_snapshot(&orphan_live, TEST_MAP, TEST_REGION));

    let summary = h.engine.on_map_load(TEST_MAP).await.unwrap();
    assert_eq!(summary.pruned, 1);
    assert!(h.store.is_empty());
}
