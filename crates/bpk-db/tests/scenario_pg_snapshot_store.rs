//! Scenario: Postgres snapshot store semantics.
//!
//! - replace deletes every prior aggregate for the key, then inserts
//! - commit_pass only writes the committing region's instance binding
//! - child rows (items, display) are rewritten wholesale
//! - delete_by_instance cascades to child rows
//!
//! DB-backed test. Skips if `BPK_DATABASE_URL` is not set.

use std::collections::BTreeMap;

use bpk_db::{InstanceKey, PgSnapshotStore, SnapshotStore};
use bpk_schemas::{
    AssetRef, DisplayData, InstanceId, MapId, ObjectKind, RegionId, Snapshot, StorageItemSnapshot,
    Vec3,
};
use uuid::Uuid;

const R1: RegionId = RegionId(1);
const R2: RegionId = RegionId(2);

async fn store_or_skip() -> anyhow::Result<Option<PgSnapshotStore>> {
    let url = match std::env::var(bpk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: BPK_DATABASE_URL not set");
            return Ok(None);
        }
    };
    let pool = bpk_db::connect(&url, 2).await?;
    bpk_db::migrate(&pool).await?;
    Ok(Some(PgSnapshotStore::new(pool)))
}

/// Fresh map id per run so concurrent test runs do not collide.
fn fresh_map() -> MapId {
    MapId((Uuid::new_v4().as_u128() & 0x7FFF_FFFF) as u32)
}

fn chest(map_id: MapId, instance: u32) -> Snapshot {
    let mut instance_ids = BTreeMap::new();
    instance_ids.insert(R1, InstanceId(instance));
    Snapshot {
        id: None,
        kind: ObjectKind::Barricade,
        map_id,
        instance_ids,
        position: Vec3::new(1.5, -2.0, 300.25),
        rotation: Vec3::new(0.0, 90.0, 0.0),
        owner: u64::MAX - 1,
        group: 7,
        asset: AssetRef::new(Uuid::from_u128(3)),
        state: Vec::new(),
        storage: vec![StorageItemSnapshot {
            slot_x: 2,
            slot_y: 3,
            rotation: 1,
            asset: AssetRef::new(Uuid::from_u128(10)),
            amount: 5,
            quality: 255,
            state: vec![9, 8, 7],
        }],
        display: Some(DisplayData {
            mythic: None,
            skin: Some(AssetRef::new(Uuid::from_u128(800))),
            tags: "rare".into(),
            dynamic_props: String::new(),
            rotation: 2,
        }),
    }
}

fn key(map_id: MapId, region: RegionId, instance: u32) -> InstanceKey {
    InstanceKey {
        map_id,
        region,
        kind: ObjectKind::Barricade,
        instance_id: InstanceId(instance),
    }
}

#[tokio::test]
async fn replace_round_trips_and_replaces() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let map = fresh_map();

    let first = store
        .replace_for_instance(key(map, R1, 11), &chest(map, 11))
        .await?;
    assert!(first.created());

    let loaded = store.find_by_instance(key(map, R1, 11)).await?;
    assert_eq!(loaded.len(), 1);
    let mut expected = chest(map, 11);
    expected.id = Some(first.id);
    assert_eq!(loaded[0], expected);

    let mut changed = chest(map, 11);
    changed.storage.clear();
    changed.display = None;
    let second = store.replace_for_instance(key(map, R1, 11), &changed).await?;
    assert_eq!(second.replaced, 1);
    assert_ne!(second.id, first.id);

    let all = store.load_for_map(map, R1).await?;
    assert_eq!(all.len(), 1);
    assert!(all[0].storage.is_empty());
    assert!(all[0].display.is_none());

    assert_eq!(store.delete_by_instance(key(map, R1, 11)).await?, 1);
    assert!(store.load_for_map(map, R1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn commit_pass_keeps_other_regions_bindings() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let map = fresh_map();

    let saved = store
        .replace_for_instance(key(map, R1, 21), &chest(map, 21))
        .await?;

    // Region 2 sees no binding and rebinds by position.
    let mut view = store.load_for_map(map, R2).await?.remove(0);
    assert!(view.instance_ids.is_empty());
    view.set_instance(R2, InstanceId(99));
    view.owner = 5;
    store.commit_pass(R2, &[view], &[]).await?;

    let r1 = store.find_by_instance(key(map, R1, 21)).await?;
    let r2 = store.find_by_instance(key(map, R2, 99)).await?;
    assert_eq!(r1.len(), 1);
    assert_eq!(r2.len(), 1);
    assert_eq!(r1[0].id, Some(saved.id));
    assert_eq!(r1[0].owner, 5);

    store.commit_pass(R1, &[], &[saved.id]).await?;
    assert!(store.load_for_map(map, R1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn status_reports_schema() -> anyhow::Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let st = store.status().await?;
    assert!(st.ok);
    assert!(st.has_snapshot_tables);
    Ok(())
}
