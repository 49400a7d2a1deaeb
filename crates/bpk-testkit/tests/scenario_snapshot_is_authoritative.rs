//! Scenario: live drift is corrected toward the snapshot, never the reverse.
//!
//! Position, rotation, health, state and ownership changes made to the live
//! object between sessions are all undone, and the stored snapshot stays
//! exactly as captured.

use bpk_reconcile::quantize::same_rotation;
use bpk_schemas::Vec3;
use bpk_testkit::fixtures::{asset, barricade, structure, GROUP, OWNER};
use bpk_testkit::{FakeAssets, FakeOwnership, FakeWorld, Harness, WorldCall, TEST_MAP};

fn assets() -> FakeAssets {
    FakeAssets::new()
        .with(asset(1), "wall")
        .with(asset(2), "sign")
}

#[tokio::test]
async fn every_kind_of_drift_is_reverted() {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(
        asset(1),
        Vec3::new(4.0, 0.5, 4.0),
        Vec3::new(0.0, 180.0, 0.0),
    ));
    let sign = world.place(barricade(asset(2), Vec3::new(8.0, 0.0, 8.0), b"KEEP OUT"));

    let h = Harness::new(world, assets(), FakeOwnership::new()).unwrap();
    h.engine.on_map_load(TEST_MAP).await.unwrap();
    h.engine.save_or_update(wall).await.unwrap();
    h.engine.save_or_update(sign).await.unwrap();
    let stored = h.store.rows();

    h.world(move |w| {
        let o = w.get_mut(wall).unwrap();
        o.position = Vec3::new(40.0, 0.5, 4.0);
        o.rotation = Vec3::new(0.0, 10.0, 0.0);
        o.health = 3;

        let s = w.get_mut(sign).unwrap();
        s.state = b"hacked".to_vec();
        s.owner = 999;
        s.group = 0;
    })
    .await
    .unwrap();
    h.world(|w| w.take_calls()).await.unwrap();

    let summary = h.engine.restore_all().await.unwrap();
    assert_eq!(summary.dirty, 0);
    assert_eq!(summary.pruned, 0);
    assert_eq!(h.store.rows(), stored, "snapshots are the source of truth");

    let (w_obj, s_obj, calls) = h
        .world(move |w| {
            (
                w.get(wall).cloned().unwrap(),
                w.get(sign).cloned().unwrap(),
                w.take_calls(),
            )
        })
        .await
        .unwrap();

    assert_eq!(w_obj.position, Vec3::new(4.0, 0.5, 4.0));
    assert!(same_rotation(w_obj.rotation, Vec3::new(0.0, 180.0, 0.0)));
    assert_eq!(w_obj.health, w_obj.max_health);

    assert_eq!(s_obj.state, b"KEEP OUT".to_vec());
    assert_eq!((s_obj.owner, s_obj.group), (OWNER, GROUP));
    assert!(calls.contains(&WorldCall::Broadcast { object: sign }));
    assert!(!calls.contains(&WorldCall::Broadcast { object: wall }));
}

#[tokio::test]
async fn sub_quantum_noise_is_not_drift() {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(
        asset(1),
        Vec3::new(4.0, 0.5, 4.0),
        Vec3::new(0.0, 90.0, 0.0),
    ));
    let h = Harness::new(world, assets(), FakeOwnership::new()).unwrap();
    h.engine.on_map_load(TEST_MAP).await.unwrap();
    h.engine.save_or_update(wall).await.unwrap();

    h.world(move |w| {
        let o = w.get_mut(wall).unwrap();
        o.rotation.y = 90.0001;
        o.position.x = 4.0001;
    })
    .await
    .unwrap();

    let summary = h.engine.restore_all().await.unwrap();
    assert_eq!(summary.corrections, 0);
}
