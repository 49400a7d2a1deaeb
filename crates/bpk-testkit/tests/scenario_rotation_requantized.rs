//! Scenario: a stored rotation that is not on the quantized grid is rewritten.
//!
//! Snapshots written by older builds may hold raw rotations. The first pass
//! rewrites the stored value to its canonical form and marks the snapshot
//! dirty without touching a live object that already matches at quantized
//! resolution. The next pass is a no-op.

use bpk_reconcile::quantize::canonical_rotation;
use bpk_reconcile::{capture_snapshot, reconcile_snapshot, Correction, ReconcileScope};
use bpk_schemas::{ObjectRef, Snapshot, Vec3};
use bpk_testkit::fixtures::{asset, structure};
use bpk_testkit::{
    FakeAssets, FakeOwnership, FakeWorld, Harness, TEST_MAP, TEST_REGION, TEST_SEARCH_RADIUS,
};

fn raw_rotation() -> Vec3 {
    Vec3::new(0.0, 10.00001, 0.0)
}

async fn setup() -> (Harness, ObjectRef, Snapshot) {
    let mut world = FakeWorld::new();
    let wall = world.place(structure(
        asset(1),
        Vec3::new(4.0, 0.5, 4.0),
        raw_rotation(),
    ));
    let h = Harness::new(
        world,
        FakeAssets::new().with(asset(1), "wall"),
        FakeOwnership::new(),
    )
    .unwrap();

    let live = h.world(move |w| w.get(wall).cloned()).await.unwrap().unwrap();
    let mut legacy = capture_snapshot(&live, TEST_MAP, TEST_REGION);
    legacy.rotation = raw_rotation();
    (h, wall, legacy)
}

#[tokio::test]
async fn raw_stored_rotation_is_requantized_once() {
    let (h, _wall, legacy) = setup().await;
    let canonical = canonical_rotation(raw_rotation());
    assert!(!canonical.bits_eq(&raw_rotation()));

    let id = h.store.seed(legacy);

    let first = h.engine.on_map_load(TEST_MAP).await.unwrap();
    assert_eq!((first.inspected, first.dirty, first.corrections), (1, 1, 1));
    assert!(h.store.row(id).unwrap().rotation.bits_eq(&canonical));

    let calls = h.world(|w| w.take_calls()).await.unwrap();
    assert!(calls.is_empty(), "live object already matched: {calls:?}");

    let second = h.engine.restore_all().await.unwrap();
    assert_eq!((second.dirty, second.corrections), (0, 0));
}

#[tokio::test]
async fn requantizing_is_the_only_correction() {
    let (h, _wall, legacy) = setup().await;

    let (first, second, snapshot) = h
        .live(move |ctx| {
            let scope = ReconcileScope {
                region: TEST_REGION,
                search_radius: TEST_SEARCH_RADIUS,
            };
            let mut snapshot = legacy;
            let first = reconcile_snapshot(ctx, &scope, &mut snapshot);
            let second = reconcile_snapshot(ctx, &scope, &mut snapshot);
            (first, second, snapshot)
        })
        .await
        .unwrap();

    assert!(first.is_dirty());
    assert_eq!(first.corrections, vec![Correction::RotationRequantized]);
    assert!(second.is_noop(), "{second:?}");
    assert!(snapshot
        .rotation
        .bits_eq(&canonical_rotation(raw_rotation())));
}
