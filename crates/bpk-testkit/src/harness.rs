use std::sync::Arc;

use anyhow::Result;

use bpk_reconcile::{LiveContext, ReconcileScope};
use bpk_runtime::{ReconciliationEngine, SimThread};
use bpk_schemas::{MapId, RegionId};

use crate::{FakeAssets, FakeOwnership, FakeWorld, MemorySnapshotStore};

pub const TEST_REGION: RegionId = RegionId(1);
pub const TEST_MAP: MapId = MapId(7);
pub const TEST_SEARCH_RADIUS: f32 = 0.5;

pub type FakeContext = LiveContext<FakeWorld, FakeAssets, FakeOwnership>;
pub type FakeEngine =
    ReconciliationEngine<MemorySnapshotStore, FakeWorld, FakeAssets, FakeOwnership>;

/// Engine over fakes, with the live context on a dedicated sim thread.
pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub store: Arc<MemorySnapshotStore>,
}

impl Harness {
    pub fn new(world: FakeWorld, assets: FakeAssets, ownership: FakeOwnership) -> Result<Self> {
        Self::with_store(
            LiveContext::new(world, assets, ownership),
            Arc::new(MemorySnapshotStore::new()),
            TEST_REGION,
        )
    }

    /// Share `store` with other harnesses (e.g. a second region or a restart).
    pub fn with_store(
        ctx: FakeContext,
        store: Arc<MemorySnapshotStore>,
        region: RegionId,
    ) -> Result<Self> {
        let sim = SimThread::spawn("bpk-sim-test", ctx)?;
        let engine = ReconciliationEngine::new(
            Arc::clone(&store),
            sim,
            ReconcileScope {
                region,
                search_radius: TEST_SEARCH_RADIUS,
            },
        );
        Ok(Self {
            engine: Arc::new(engine),
            store,
        })
    }

    /// Run `f` against the fake world on the simulation thread.
    pub async fn world<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut FakeWorld) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.engine.sim().run(move |ctx| f(&mut ctx.world)).await
    }

    /// Run `f` against the whole live context on the simulation thread.
    pub async fn live<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut FakeContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.engine.sim().run(f).await
    }
}
