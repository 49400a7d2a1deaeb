use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::warn;

use bpk_db::{InstanceKey, ReplaceOutcome, SnapshotStore};
use bpk_schemas::{MapId, RegionId, Snapshot, SnapshotId};

/// Store operations, for failure injection and call accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreOp {
    LoadForMap,
    FindByInstance,
    Replace,
    CommitPass,
    DeleteByInstance,
}

#[derive(Debug)]
struct Inner {
    rows: BTreeMap<SnapshotId, Snapshot>,
    next_id: SnapshotId,
    fail_next: BTreeSet<StoreOp>,
    calls: Vec<StoreOp>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            fail_next: BTreeSet::new(),
            calls: Vec::new(),
        }
    }
}

/// [`SnapshotStore`] held in memory with the same semantics as the Postgres
/// adapter: every call is atomic, pass commits only touch the committing
/// region's instance binding.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Inner>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call of `op` fails once with an injected error.
    pub fn fail_next(&self, op: StoreOp) {
        self.lock().fail_next.insert(op);
    }

    /// Delay every call by `latency` (widens race windows in lock tests).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = Some(latency);
    }

    /// Seed a row directly, bypassing the trait. Returns its id.
    pub fn seed(&self, mut snapshot: Snapshot) -> SnapshotId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        snapshot.id = Some(id);
        inner.rows.insert(id, snapshot);
        id
    }

    /// Raw row, with every region's instance binding.
    pub fn row(&self, id: SnapshotId) -> Option<Snapshot> {
        self.lock().rows.get(&id).cloned()
    }

    pub fn rows(&self) -> Vec<Snapshot> {
        self.lock().rows.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    pub fn calls(&self) -> Vec<StoreOp> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Highest number of store calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self, op: StoreOp) -> Result<InFlight<'_>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }

        let mut inner = self.lock();
        inner.calls.push(op);
        if inner.fail_next.remove(&op) {
            bail!("injected store failure: {op:?}");
        }
        Ok(guard)
    }

    fn matches(row: &Snapshot, key: &InstanceKey) -> bool {
        row.map_id == key.map_id
            && row.kind == key.kind
            && row.instance_for(key.region) == Some(key.instance_id)
    }

    fn for_region(row: &Snapshot, region: RegionId) -> Snapshot {
        let mut out = row.clone();
        out.instance_ids.retain(|r, _| *r == region);
        out
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load_for_map(&self, map_id: MapId, region: RegionId) -> Result<Vec<Snapshot>> {
        let _g = self.enter(StoreOp::LoadForMap).await?;
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|s| s.map_id == map_id)
            .map(|s| Self::for_region(s, region))
            .collect())
    }

    async fn find_by_instance(&self, key: InstanceKey) -> Result<Vec<Snapshot>> {
        let _g = self.enter(StoreOp::FindByInstance).await?;
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|s| Self::matches(s, &key))
            .map(|s| Self::for_region(s, key.region))
            .collect())
    }

    async fn replace_for_instance(
        &self,
        key: InstanceKey,
        snapshot: &Snapshot,
    ) -> Result<ReplaceOutcome> {
        let _g = self.enter(StoreOp::Replace).await?;
        let mut inner = self.lock();

        let before = inner.rows.len();
        inner.rows.retain(|_, s| !Self::matches(s, &key));
        let replaced = (before - inner.rows.len()) as u64;

        let id = inner.next_id;
        inner.next_id += 1;
        let mut row = snapshot.clone();
        row.id = Some(id);
        inner.rows.insert(id, row);

        Ok(ReplaceOutcome { replaced, id })
    }

    async fn commit_pass(
        &self,
        region: RegionId,
        dirty: &[Snapshot],
        pruned: &[SnapshotId],
    ) -> Result<()> {
        let _g = self.enter(StoreOp::CommitPass).await?;
        let mut inner = self.lock();

        for id in pruned {
            inner.rows.remove(id);
        }

        for s in dirty {
            match s.id {
                Some(id) => {
                    let Some(existing) = inner.rows.get_mut(&id) else {
                        warn!(snapshot_id = id, "snapshot row vanished before commit; skipped");
                        continue;
                    };
                    let mut instance_ids = std::mem::take(&mut existing.instance_ids);
                    if let Some(instance) = s.instance_for(region) {
                        instance_ids.insert(region, instance);
                    }
                    *existing = s.clone();
                    existing.instance_ids = instance_ids;
                }
                None => {
                    let id = inner.next_id;
                    inner.next_id += 1;
                    let mut row = s.clone();
                    row.id = Some(id);
                    inner.rows.insert(id, row);
                }
            }
        }
        Ok(())
    }

    async fn delete_by_instance(&self, key: InstanceKey) -> Result<u64> {
        let _g = self.enter(StoreOp::DeleteByInstance).await?;
        let mut inner = self.lock();
        let before = inner.rows.len();
        inner.rows.retain(|_, s| !Self::matches(s, &key));
        Ok((before - inner.rows.len()) as u64)
    }
}
