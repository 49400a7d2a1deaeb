//! Scenario: restoring a container's ownership re-broadcasts at most once.
//!
//! When content or cosmetics were corrected in the same pass, observers must
//! hear about it: either the ownership change broadcast itself, or the
//! reconciler broadcasts once afterwards. Never both, and never when nothing
//! but ownership changed and the replicator stayed silent.

use bpk_schemas::{DisplayData, ObjectRef, Vec3};
use bpk_testkit::fixtures::{asset, container, item, GROUP, OWNER};
use bpk_testkit::{FakeAssets, FakeOwnership, FakeWorld, Harness, WorldCall, TEST_MAP};

fn glow() -> DisplayData {
    DisplayData {
        skin: Some(asset(800)),
        tags: "glow".into(),
        ..DisplayData::default()
    }
}

async fn saved_chest(
    ownership: FakeOwnership,
    display: Option<DisplayData>,
) -> (Harness, ObjectRef) {
    let mut world = FakeWorld::new();
    let chest = world.place(container(
        asset(3),
        Vec3::new(3.0, 0.0, 3.0),
        vec![item(2, 3, asset(10), 5)],
        display,
    ));
    let h = Harness::new(
        world,
        FakeAssets::new()
            .with(asset(3), "locker")
            .with(asset(10), "ammo"),
        ownership,
    )
    .unwrap();
    h.engine.on_map_load(TEST_MAP).await.unwrap();
    h.engine.save_or_update(chest).await.unwrap();

    h.world(move |w| {
        let o = w.get_mut(chest).unwrap();
        o.owner = 5;
        o.group = 0;
        w.take_calls();
    })
    .await
    .unwrap();
    (h, chest)
}

async fn drift_contents(h: &Harness, chest: ObjectRef) {
    h.world(move |w| {
        let c = w.get_mut(chest).unwrap().container.as_mut().unwrap();
        c.items[0].amount = 1;
    })
    .await
    .unwrap();
}

async fn restore(h: &Harness, chest: ObjectRef) -> Vec<WorldCall> {
    let summary = h.engine.restore_all().await.unwrap();
    assert_eq!((summary.dirty, summary.pruned), (0, 0));

    let (owner, group, calls) = h
        .world(move |w| {
            let o = w.get(chest).unwrap();
            (o.owner, o.group, w.take_calls())
        })
        .await
        .unwrap();
    assert_eq!((owner, group), (OWNER, GROUP));
    calls
}

fn content_and_owner_calls(chest: ObjectRef) -> Vec<WorldCall> {
    vec![
        WorldCall::RemoveItem {
            object: chest,
            slot_x: 2,
            slot_y: 3,
        },
        WorldCall::AddItem {
            object: chest,
            slot_x: 2,
            slot_y: 3,
        },
        WorldCall::SetOwnerGroup {
            object: chest,
            owner: OWNER,
            group: GROUP,
        },
        WorldCall::Broadcast { object: chest },
    ]
}

#[tokio::test]
async fn silent_replicator_gets_one_broadcast_after_content_fix() {
    let (h, chest) = saved_chest(FakeOwnership::new(), None).await;
    drift_contents(&h, chest).await;

    let calls = restore(&h, chest).await;
    assert_eq!(calls, content_and_owner_calls(chest));
}

#[tokio::test]
async fn broadcasting_replicator_is_not_doubled_after_content_fix() {
    let (h, chest) = saved_chest(FakeOwnership::new().broadcasting(), None).await;
    drift_contents(&h, chest).await;

    let calls = restore(&h, chest).await;
    // The one broadcast is the replicator's own.
    assert_eq!(calls, content_and_owner_calls(chest));
    let applied = h.live(|ctx| ctx.ownership.applied().len()).await.unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn cosmetic_fix_with_silent_replicator_is_broadcast_once() {
    let (h, chest) = saved_chest(FakeOwnership::new(), Some(glow())).await;
    h.world(move |w| {
        let c = w.get_mut(chest).unwrap().container.as_mut().unwrap();
        c.display = Some(DisplayData::default());
    })
    .await
    .unwrap();

    let calls = restore(&h, chest).await;
    assert_eq!(
        calls,
        vec![
            WorldCall::SetDisplay { object: chest },
            WorldCall::SetOwnerGroup {
                object: chest,
                owner: OWNER,
                group: GROUP,
            },
            WorldCall::Broadcast { object: chest },
        ]
    );
}

#[tokio::test]
async fn cosmetic_fix_with_broadcasting_replicator_is_broadcast_once() {
    let (h, chest) = saved_chest(FakeOwnership::new().broadcasting(), Some(glow())).await;
    h.world(move |w| {
        let c = w.get_mut(chest).unwrap().container.as_mut().unwrap();
        c.display = Some(DisplayData::default());
    })
    .await
    .unwrap();

    let calls = restore(&h, chest).await;
    let broadcasts = calls
        .iter()
        .filter(|c| **c == WorldCall::Broadcast { object: chest })
        .count();
    assert_eq!(broadcasts, 1, "{calls:?}");
}

#[tokio::test]
async fn ownership_alone_with_silent_replicator_does_not_broadcast() {
    let (h, chest) = saved_chest(FakeOwnership::new(), None).await;

    let calls = restore(&h, chest).await;
    assert_eq!(
        calls,
        vec![WorldCall::SetOwnerGroup {
            object: chest,
            owner: OWNER,
            group: GROUP,
        }]
    );
}
