//! Postgres adapter for [`SnapshotStore`].

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use bpk_schemas::{
    AssetRef, DisplayData, InstanceId, MapId, ObjectKind, RegionId, Snapshot, SnapshotId,
    StorageItemSnapshot, Vec3,
};

use crate::store::{InstanceKey, ReplaceOutcome, SnapshotStore};

#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connectivity and schema presence.
    pub async fn status(&self) -> Result<crate::DbStatus> {
        crate::status(&self.pool).await
    }
}

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

fn narrow_u8(v: i16, column: &str) -> Result<u8> {
    u8::try_from(v).with_context(|| format!("{column} out of range: {v}"))
}

fn narrow_u32(v: i64, column: &str) -> Result<u32> {
    u32::try_from(v).with_context(|| format!("{column} out of range: {v}"))
}

// Owner / group ids are opaque 64-bit values; stored bit-for-bit in bigint.
fn id_to_db(v: u64) -> i64 {
    v as i64
}

fn id_from_db(v: i64) -> u64 {
    v as u64
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

async fn ids_for_map(conn: &mut PgConnection, map_id: MapId) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("select id from placed_objects where map_id = $1 order by id")
            .bind(i64::from(map_id.0))
            .fetch_all(&mut *conn)
            .await
            .context("ids_for_map failed")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

async fn ids_for_key(conn: &mut PgConnection, key: InstanceKey) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        select o.id
        from placed_objects o
        join placed_object_instances i on i.object_id = o.id
        where o.map_id = $1
          and i.region = $2
          and o.is_structure = $3
          and i.instance_id = $4
        order by o.id
        "#,
    )
    .bind(i64::from(key.map_id.0))
    .bind(i32::from(key.region.0))
    .bind(key.kind.is_structure())
    .bind(i64::from(key.instance_id.0))
    .fetch_all(&mut *conn)
    .await
    .context("ids_for_key failed")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Load full aggregates for `ids`. Only `region`'s instance binding is loaded.
async fn load_aggregates(
    conn: &mut PgConnection,
    ids: &[i64],
    region: RegionId,
) -> Result<Vec<Snapshot>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        select
          id, map_id, is_structure, asset_guid,
          pos_x, pos_y, pos_z,
          rot_x, rot_y, rot_z,
          owner_id, group_id, state
        from placed_objects
        where id = any($1)
        order by id
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .context("load placed_objects failed")?;

    let mut out: BTreeMap<i64, Snapshot> = BTreeMap::new();
    for row in rows {
        let id: i64 = row.try_get("id")?;
        let snapshot = Snapshot {
            id: Some(id),
            kind: ObjectKind::from_is_structure(row.try_get("is_structure")?),
            map_id: MapId(narrow_u32(row.try_get("map_id")?, "map_id")?),
            instance_ids: BTreeMap::new(),
            position: Vec3::new(
                row.try_get("pos_x")?,
                row.try_get("pos_y")?,
                row.try_get("pos_z")?,
            ),
            rotation: Vec3::new(
                row.try_get("rot_x")?,
                row.try_get("rot_y")?,
                row.try_get("rot_z")?,
            ),
            owner: id_from_db(row.try_get("owner_id")?),
            group: id_from_db(row.try_get("group_id")?),
            asset: AssetRef(row.try_get::<Uuid, _>("asset_guid")?),
            state: row.try_get("state")?,
            storage: Vec::new(),
            display: None,
        };
        out.insert(id, snapshot);
    }

    let rows = sqlx::query(
        r#"
        select object_id, instance_id
        from placed_object_instances
        where object_id = any($1) and region = $2
        "#,
    )
    .bind(ids)
    .bind(i32::from(region.0))
    .fetch_all(&mut *conn)
    .await
    .context("load placed_object_instances failed")?;

    for row in rows {
        let object_id: i64 = row.try_get("object_id")?;
        let instance_id = narrow_u32(row.try_get("instance_id")?, "instance_id")?;
        if let Some(s) = out.get_mut(&object_id) {
            s.instance_ids.insert(region, InstanceId(instance_id));
        }
    }

    let rows = sqlx::query(
        r#"
        select object_id, slot_x, slot_y, rotation, asset_guid, amount, quality, state
        from placed_object_items
        where object_id = any($1)
        order by object_id, ord
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .context("load placed_object_items failed")?;

    for row in rows {
        let object_id: i64 = row.try_get("object_id")?;
        let item = StorageItemSnapshot {
            slot_x: narrow_u8(row.try_get("slot_x")?, "slot_x")?,
            slot_y: narrow_u8(row.try_get("slot_y")?, "slot_y")?,
            rotation: narrow_u8(row.try_get("rotation")?, "rotation")?,
            asset: AssetRef(row.try_get::<Uuid, _>("asset_guid")?),
            amount: narrow_u8(row.try_get("amount")?, "amount")?,
            quality: narrow_u8(row.try_get("quality")?, "quality")?,
            state: row.try_get("state")?,
        };
        if let Some(s) = out.get_mut(&object_id) {
            s.storage.push(item);
        }
    }

    let rows = sqlx::query(
        r#"
        select object_id, mythic_guid, skin_guid, tags, dynamic_props, rotation
        from placed_object_displays
        where object_id = any($1)
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .context("load placed_object_displays failed")?;

    for row in rows {
        let object_id: i64 = row.try_get("object_id")?;
        let display = DisplayData {
            mythic: row.try_get::<Option<Uuid>, _>("mythic_guid")?.map(AssetRef),
            skin: row.try_get::<Option<Uuid>, _>("skin_guid")?.map(AssetRef),
            tags: row.try_get("tags")?,
            dynamic_props: row.try_get("dynamic_props")?,
            rotation: narrow_u8(row.try_get("rotation")?, "display rotation")?,
        };
        if let Some(s) = out.get_mut(&object_id) {
            s.display = Some(display);
        }
    }

    Ok(out.into_values().collect())
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

async fn upsert_instance(
    conn: &mut PgConnection,
    object_id: i64,
    region: RegionId,
    instance_id: InstanceId,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into placed_object_instances (object_id, region, instance_id)
        values ($1, $2, $3)
        on conflict (object_id, region)
        do update set instance_id = excluded.instance_id
        "#,
    )
    .bind(object_id)
    .bind(i32::from(region.0))
    .bind(i64::from(instance_id.0))
    .execute(&mut *conn)
    .await
    .context("upsert placed_object_instances failed")?;
    Ok(())
}

/// Rewrite items and display; write instance bindings (all regions, or only
/// `only_region` when given).
async fn write_children(
    conn: &mut PgConnection,
    object_id: i64,
    s: &Snapshot,
    only_region: Option<RegionId>,
) -> Result<()> {
    for (&region, &instance_id) in &s.instance_ids {
        if only_region.map_or(true, |r| r == region) {
            upsert_instance(conn, object_id, region, instance_id).await?;
        }
    }

    sqlx::query("delete from placed_object_items where object_id = $1")
        .bind(object_id)
        .execute(&mut *conn)
        .await
        .context("clear placed_object_items failed")?;

    for (ord, item) in s.storage.iter().enumerate() {
        sqlx::query(
            r#"
            insert into placed_object_items (
              object_id, ord, slot_x, slot_y, rotation, asset_guid, amount, quality, state
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9
            )
            "#,
        )
        .bind(object_id)
        .bind(i32::try_from(ord).context("item ordinal overflow")?)
        .bind(i16::from(item.slot_x))
        .bind(i16::from(item.slot_y))
        .bind(i16::from(item.rotation))
        .bind(item.asset.as_uuid())
        .bind(i16::from(item.amount))
        .bind(i16::from(item.quality))
        .bind(&item.state)
        .execute(&mut *conn)
        .await
        .context("insert placed_object_items failed")?;
    }

    sqlx::query("delete from placed_object_displays where object_id = $1")
        .bind(object_id)
        .execute(&mut *conn)
        .await
        .context("clear placed_object_displays failed")?;

    if let Some(d) = &s.display {
        sqlx::query(
            r#"
            insert into placed_object_displays (
              object_id, mythic_guid, skin_guid, tags, dynamic_props, rotation
            ) values (
              $1, $2, $3, $4, $5, $6
            )
            "#,
        )
        .bind(object_id)
        .bind(d.mythic.map(|a| a.as_uuid()))
        .bind(d.skin.map(|a| a.as_uuid()))
        .bind(&d.tags)
        .bind(&d.dynamic_props)
        .bind(i16::from(d.rotation))
        .execute(&mut *conn)
        .await
        .context("insert placed_object_displays failed")?;
    }

    Ok(())
}

async fn insert_aggregate(conn: &mut PgConnection, s: &Snapshot) -> Result<SnapshotId> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        insert into placed_objects (
          map_id, is_structure, asset_guid,
          pos_x, pos_y, pos_z,
          rot_x, rot_y, rot_z,
          owner_id, group_id, state
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
        )
        returning id
        "#,
    )
    .bind(i64::from(s.map_id.0))
    .bind(s.kind.is_structure())
    .bind(s.asset.as_uuid())
    .bind(s.position.x)
    .bind(s.position.y)
    .bind(s.position.z)
    .bind(s.rotation.x)
    .bind(s.rotation.y)
    .bind(s.rotation.z)
    .bind(id_to_db(s.owner))
    .bind(id_to_db(s.group))
    .bind(&s.state)
    .fetch_one(&mut *conn)
    .await
    .context("insert placed_objects failed")?;

    write_children(conn, id, s, None).await?;
    Ok(id)
}

/// Returns `false` if the row no longer exists.
async fn update_aggregate(
    conn: &mut PgConnection,
    id: SnapshotId,
    s: &Snapshot,
    region: RegionId,
) -> Result<bool> {
    let res = sqlx::query(
        r#"
        update placed_objects
        set is_structure = $2,
            asset_guid = $3,
            pos_x = $4, pos_y = $5, pos_z = $6,
            rot_x = $7, rot_y = $8, rot_z = $9,
            owner_id = $10,
            group_id = $11,
            state = $12,
            saved_at_utc = now()
        where id = $1
        "#,
    )
    .bind(id)
    .bind(s.kind.is_structure())
    .bind(s.asset.as_uuid())
    .bind(s.position.x)
    .bind(s.position.y)
    .bind(s.position.z)
    .bind(s.rotation.x)
    .bind(s.rotation.y)
    .bind(s.rotation.z)
    .bind(id_to_db(s.owner))
    .bind(id_to_db(s.group))
    .bind(&s.state)
    .execute(&mut *conn)
    .await
    .context("update placed_objects failed")?;

    if res.rows_affected() == 0 {
        return Ok(false);
    }

    write_children(conn, id, s, Some(region)).await?;
    Ok(true)
}

async fn delete_ids(conn: &mut PgConnection, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let res = sqlx::query("delete from placed_objects where id = any($1)")
        .bind(ids)
        .execute(&mut *conn)
        .await
        .context("delete placed_objects failed")?;
    Ok(res.rows_affected())
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn load_for_map(&self, map_id: MapId, region: RegionId) -> Result<Vec<Snapshot>> {
        let mut conn = self.pool.acquire().await.context("acquire failed")?;
        let ids = ids_for_map(&mut conn, map_id).await?;
        let out = load_aggregates(&mut conn, &ids, region).await?;
        debug!(map_id = %map_id, region = %region, count = out.len(), "loaded snapshots");
        Ok(out)
    }

    async fn find_by_instance(&self, key: InstanceKey) -> Result<Vec<Snapshot>> {
        let mut conn = self.pool.acquire().await.context("acquire failed")?;
        let ids = ids_for_key(&mut conn, key).await?;
        load_aggregates(&mut conn, &ids, key.region).await
    }

    async fn replace_for_instance(
        &self,
        key: InstanceKey,
        snapshot: &Snapshot,
    ) -> Result<ReplaceOutcome> {
        let mut tx = self.pool.begin().await.context("begin replace tx failed")?;

        let prior = ids_for_key(&mut tx, key).await?;
        let replaced = delete_ids(&mut tx, &prior).await?;
        let id = insert_aggregate(&mut tx, snapshot).await?;

        tx.commit().await.context("commit replace tx failed")?;
        Ok(ReplaceOutcome { replaced, id })
    }

    async fn commit_pass(
        &self,
        region: RegionId,
        dirty: &[Snapshot],
        pruned: &[SnapshotId],
    ) -> Result<()> {
        if dirty.is_empty() && pruned.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin commit tx failed")?;

        delete_ids(&mut tx, pruned).await?;

        for s in dirty {
            match s.id {
                Some(id) => {
                    if !update_aggregate(&mut tx, id, s, region).await? {
                        warn!(snapshot_id = id, "snapshot row vanished before commit; skipped");
                    }
                }
                None => {
                    insert_aggregate(&mut tx, s).await?;
                }
            }
        }

        tx.commit().await.context("commit pass tx failed")?;
        Ok(())
    }

    async fn delete_by_instance(&self, key: InstanceKey) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("begin delete tx failed")?;
        let ids = ids_for_key(&mut tx, key).await?;
        let removed = delete_ids(&mut tx, &ids).await?;
        tx.commit().await.context("commit delete tx failed")?;
        Ok(removed)
    }
}
