//! Reconciliation engine: the public surface over store, simulation thread
//! and mutation lock.
//!
//! Every public operation:
//! 1) acquires the engine-wide [`MutationLock`] for its full duration
//! 2) does store I/O on the calling task
//! 3) ships live-world work to the simulation thread via [`SimThread`]
//!
//! Snapshots are only ever touched by one operation at a time.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use bpk_config::EngineSettings;
use bpk_db::{InstanceKey, SnapshotStore};
use bpk_reconcile::{
    capture_snapshot, reconcile_pass, reconcile_snapshot, AssetResolver, CaptureError,
    LiveContext, LiveWorldIndex, OwnershipReplicator, ReconcileScope,
};
use bpk_schemas::{InstanceId, MapId, ObjectKind, ObjectRef, RegionId, Snapshot, SnapshotId};

use crate::lock::MutationLock;
use crate::sim::SimThread;

/// Totals for one reconciliation pass over a map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub inspected: usize,
    pub dirty: usize,
    pub pruned: usize,
    pub corrections: usize,
}

/// State guarded by the mutation lock.
#[derive(Debug, Default)]
struct Session {
    map: Option<MapId>,
}

impl Session {
    fn require_map(&self, op: &'static str) -> Result<MapId> {
        self.map
            .ok_or_else(|| anyhow!("{op} called before any map was loaded"))
    }
}

pub struct ReconciliationEngine<S, W, A, O> {
    store: Arc<S>,
    sim: SimThread<LiveContext<W, A, O>>,
    scope: ReconcileScope,
    session: MutationLock<Session>,
}

impl<S, W, A, O> ReconciliationEngine<S, W, A, O>
where
    S: SnapshotStore,
    W: LiveWorldIndex + 'static,
    A: AssetResolver + 'static,
    O: OwnershipReplicator + 'static,
{
    pub fn new(store: Arc<S>, sim: SimThread<LiveContext<W, A, O>>, scope: ReconcileScope) -> Self {
        Self {
            store,
            sim,
            scope,
            session: MutationLock::new(Session::default()),
        }
    }

    pub fn from_settings(
        store: Arc<S>,
        sim: SimThread<LiveContext<W, A, O>>,
        settings: &EngineSettings,
    ) -> Self {
        Self::new(
            store,
            sim,
            ReconcileScope {
                region: settings.region,
                search_radius: settings.search_radius,
            },
        )
    }

    pub fn region(&self) -> RegionId {
        self.scope.region
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn sim(&self) -> &SimThread<LiveContext<W, A, O>> {
        &self.sim
    }

    /// Current map, if one has been loaded. Waits for the mutation lock.
    pub async fn current_map(&self) -> Option<MapId> {
        self.session.acquire("current_map").await.map
    }

    /// `true` while a public operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.session.is_held()
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Map/layout start: switch to `map_id` and restore every snapshot on it.
    pub async fn on_map_load(&self, map_id: MapId) -> Result<PassSummary> {
        let mut session = self.session.acquire("on_map_load").await;
        if let Some(previous) = session.map.replace(map_id) {
            info!(previous = %previous, map = %map_id, "switching map");
        }
        self.reconcile_map(map_id, "restore_all").await
    }

    /// Heal drift on the current map before the host writes its own save.
    pub async fn on_map_save(&self) -> Result<PassSummary> {
        let session = self.session.acquire("on_map_save").await;
        let map = session.require_map("on_map_save")?;
        self.reconcile_map(map, "on_map_save").await
    }

    /// Load every snapshot on the current map and region, reconcile each one
    /// and persist the dirty / pruned results in one batch.
    pub async fn restore_all(&self) -> Result<PassSummary> {
        let session = self.session.acquire("restore_all").await;
        let map = session.require_map("restore_all")?;
        self.reconcile_map(map, "restore_all").await
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Capture `object` and replace any prior snapshot of it.
    /// Returns `true` when no snapshot existed before.
    pub async fn save_or_update(&self, object: ObjectRef) -> Result<bool> {
        let session = self.session.acquire("save_or_update").await;
        let map = session.require_map("save_or_update")?;
        let region = self.scope.region;

        // On-thread: capture.
        let captured = self
            .sim
            .run(move |ctx| {
                ctx.world
                    .find(object)
                    .map(|live| (capture_snapshot(&live, map, region), live.destroyed))
            })
            .await?;
        let (mut snapshot, destroyed) = captured.ok_or(CaptureError::NotFound(object))?;

        // Off-thread: replace.
        let key = self.key(map, object.kind, object.instance_id);
        let outcome = self.store.replace_for_instance(key, &snapshot).await?;
        snapshot.id = Some(outcome.id);

        info!(
            object = %object,
            snapshot_id = outcome.id,
            replaced = outcome.replaced,
            items = snapshot.storage.len(),
            "snapshot saved"
        );

        if destroyed {
            self.reconcile_fresh_capture(snapshot).await?;
        }

        Ok(outcome.created())
    }

    /// Delete every snapshot bound to `(instance_id, kind)` on the current map.
    /// Returns `true` when something was removed.
    pub async fn discard(&self, instance_id: InstanceId, kind: ObjectKind) -> Result<bool> {
        let session = self.session.acquire("discard").await;
        let map = session.require_map("discard")?;

        let removed = self
            .store
            .delete_by_instance(self.key(map, kind, instance_id))
            .await?;

        if removed > 0 {
            info!(kind = kind.as_str(), instance_id = %instance_id, removed, "snapshot discarded");
        }
        Ok(removed > 0)
    }

    // ---------------------------------------------------------------------
    // Point queries
    // ---------------------------------------------------------------------

    pub async fn is_saved(&self, instance_id: InstanceId, kind: ObjectKind) -> Result<bool> {
        let session = self.session.acquire("is_saved").await;
        let map = session.require_map("is_saved")?;
        let found = self
            .store
            .find_by_instance(self.key(map, kind, instance_id))
            .await?;
        Ok(!found.is_empty())
    }

    pub async fn get_snapshot(
        &self,
        instance_id: InstanceId,
        kind: ObjectKind,
    ) -> Result<Option<Snapshot>> {
        let session = self.session.acquire("get_snapshot").await;
        let map = session.require_map("get_snapshot")?;
        let mut found = self
            .store
            .find_by_instance(self.key(map, kind, instance_id))
            .await?;
        if found.len() > 1 {
            warn!(
                kind = kind.as_str(),
                instance_id = %instance_id,
                count = found.len(),
                "more than one snapshot bound to instance; returning the first"
            );
        }
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Every snapshot on the current map, with instance ids for this region.
    pub async fn get_all_snapshots(&self) -> Result<Vec<Snapshot>> {
        let session = self.session.acquire("get_all_snapshots").await;
        let map = session.require_map("get_all_snapshots")?;
        self.store.load_for_map(map, self.scope.region).await
    }

    // ---------------------------------------------------------------------
    // Internals (caller holds the lock)
    // ---------------------------------------------------------------------

    fn key(&self, map_id: MapId, kind: ObjectKind, instance_id: InstanceId) -> InstanceKey {
        InstanceKey {
            map_id,
            region: self.scope.region,
            kind,
            instance_id,
        }
    }

    async fn reconcile_map(&self, map: MapId, op: &'static str) -> Result<PassSummary> {
        let region = self.scope.region;
        let snapshots = self.store.load_for_map(map, region).await?;
        let inspected = snapshots.len();

        let scope = self.scope;
        let (kept, result) = self
            .sim
            .run(move |ctx| {
                let mut snapshots = snapshots;
                let result = reconcile_pass(ctx, &scope, &mut snapshots);
                (snapshots, result)
            })
            .await?;

        // `result.dirty` is ascending.
        let mut dirty_idx = result.dirty.iter().copied().peekable();
        let dirty: Vec<Snapshot> = kept
            .into_iter()
            .enumerate()
            .filter_map(|(i, s)| {
                if dirty_idx.peek() == Some(&i) {
                    dirty_idx.next();
                    Some(s)
                } else {
                    None
                }
            })
            .collect();
        let pruned: Vec<SnapshotId> = result.pruned.iter().filter_map(|s| s.id).collect();

        if !dirty.is_empty() || !pruned.is_empty() {
            if let Err(e) = self.store.commit_pass(region, &dirty, &pruned).await {
                error!(op, map = %map, error = %e, "failed to persist reconciliation pass");
                return Err(e);
            }
        }

        let summary = PassSummary {
            inspected,
            dirty: dirty.len(),
            pruned: result.pruned.len(),
            corrections: result.corrections,
        };
        info!(
            op,
            map = %map,
            region = %region,
            inspected = summary.inspected,
            dirty = summary.dirty,
            pruned = summary.pruned,
            corrections = summary.corrections,
            "reconciliation pass complete"
        );
        Ok(summary)
    }

    /// An object captured while destroyed is restored right away from the
    /// snapshot just written.
    async fn reconcile_fresh_capture(&self, snapshot: Snapshot) -> Result<()> {
        let scope = self.scope;
        let (snapshot, report) = self
            .sim
            .run(move |ctx| {
                let mut snapshot = snapshot;
                let report = reconcile_snapshot(ctx, &scope, &mut snapshot);
                (snapshot, report)
            })
            .await?;

        if report.is_pruned() {
            let pruned: Vec<SnapshotId> = snapshot.id.into_iter().collect();
            self.store.commit_pass(scope.region, &[], &pruned).await?;
        } else if report.is_dirty() {
            self.store
                .commit_pass(scope.region, std::slice::from_ref(&snapshot), &[])
                .await?;
        }

        info!(
            snapshot_id = ?snapshot.id,
            outcome = ?report.outcome,
            corrections = report.corrections.len(),
            "captured destroyed object reconciled"
        );
        Ok(())
    }
}
