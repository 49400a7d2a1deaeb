//! Store boundary for snapshot aggregates.
//!
//! This module defines only the trait and its key / outcome types. The
//! Postgres adapter lives in `pg.rs`; an in-memory adapter for tests lives in
//! `bpk-testkit`.

use anyhow::Result;
use bpk_schemas::{InstanceId, MapId, ObjectKind, RegionId, Snapshot, SnapshotId};

/// Identity a capture replaces on: one live object in one region of one map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub map_id: MapId,
    pub region: RegionId,
    pub kind: ObjectKind,
    pub instance_id: InstanceId,
}

/// Result of a delete-then-insert replace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Prior snapshots deleted for the same key.
    pub replaced: u64,
    /// Id of the inserted snapshot.
    pub id: SnapshotId,
}

impl ReplaceOutcome {
    pub fn created(&self) -> bool {
        self.replaced == 0
    }
}

/// Persisted snapshot store.
///
/// Implementations must be `Send + Sync`; the engine calls them from async
/// tasks off the simulation thread. Every method is one transaction.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Every snapshot on `map_id`. Instance-id maps only carry the entry for
    /// `region`.
    async fn load_for_map(&self, map_id: MapId, region: RegionId) -> Result<Vec<Snapshot>>;

    /// Snapshots bound to `key` (normally zero or one).
    async fn find_by_instance(&self, key: InstanceKey) -> Result<Vec<Snapshot>>;

    /// Delete every snapshot bound to `key`, then insert `snapshot`.
    async fn replace_for_instance(
        &self,
        key: InstanceKey,
        snapshot: &Snapshot,
    ) -> Result<ReplaceOutcome>;

    /// Persist the dirty snapshots of one pass and delete the pruned ones.
    /// Only `region`'s instance-id entry is written; other regions' bindings
    /// are left untouched.
    async fn commit_pass(
        &self,
        region: RegionId,
        dirty: &[Snapshot],
        pruned: &[SnapshotId],
    ) -> Result<()>;

    /// Delete every snapshot bound to `key`. Returns how many were removed.
    async fn delete_by_instance(&self, key: InstanceKey) -> Result<u64>;
}
