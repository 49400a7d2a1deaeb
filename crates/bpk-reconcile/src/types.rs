use bpk_schemas::{InstanceId, Snapshot, Vec3};

use crate::storage_diff::DiscardReason;

/// Where the reconciler looks for objects and which region it acts for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconcileScope {
    pub region: bpk_schemas::RegionId,
    /// Radius of the spatial fallback search, in world units.
    pub search_radius: f32,
}

/// Why a snapshot was dropped. Neither case is retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PruneReason {
    /// Asset no longer resolves and no live object exists.
    AssetUnresolvable,
    /// Asset resolves but the host refused to place the object.
    CreationRejected { reason: String },
}

/// One correction applied during a pass. Listed in the order applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Correction {
    RotationRequantized,
    Recreated { instance_id: InstanceId },
    /// Found by spatial search under a different instance id.
    InstanceRebound { instance_id: InstanceId },
    Moved { from_position: Vec3, from_rotation: Vec3 },
    Repaired { from_health: u16, to_health: u16 },
    DisplayCaptured,
    DisplayApplied,
    ItemDiscarded { slot_x: u8, slot_y: u8, reason: DiscardReason },
    ItemSpawned { slot_x: u8, slot_y: u8 },
    /// Item could not be placed (asset unresolvable or host refused).
    ItemSkipped { slot_x: u8, slot_y: u8 },
    OwnershipApplied { owner: u64, group: u64 },
    StateApplied,
    /// State re-encoded by an ownership change was adopted into the snapshot.
    StateAdopted,
    LegacyStateCleared,
    Rebroadcast,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Live object matches; snapshot unchanged.
    Clean,
    /// Snapshot content changed and must be re-persisted.
    Dirty,
    /// Snapshot must be deleted.
    Pruned(PruneReason),
}

/// Result of reconciling one snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    pub corrections: Vec<Correction>,
}

impl ReconcileReport {
    pub(crate) fn finish(dirty: bool, corrections: Vec<Correction>) -> Self {
        Self {
            outcome: if dirty {
                ReconcileOutcome::Dirty
            } else {
                ReconcileOutcome::Clean
            },
            corrections,
        }
    }

    pub(crate) fn pruned(reason: PruneReason, corrections: Vec<Correction>) -> Self {
        Self {
            outcome: ReconcileOutcome::Pruned(reason),
            corrections,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.outcome == ReconcileOutcome::Dirty
    }

    pub fn is_pruned(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Pruned(_))
    }

    /// Clean and nothing touched.
    pub fn is_noop(&self) -> bool {
        self.outcome == ReconcileOutcome::Clean && self.corrections.is_empty()
    }
}

/// Result of reconciling a whole list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassResult {
    /// Indices (into the surviving list) of snapshots that must be re-persisted.
    pub dirty: Vec<usize>,
    /// Snapshots removed from the list; their rows must be deleted.
    pub pruned: Vec<Snapshot>,
    /// Total corrections applied across the pass.
    pub corrections: usize,
}
