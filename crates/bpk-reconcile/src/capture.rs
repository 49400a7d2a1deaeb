//! Live object → snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bpk_schemas::{MapId, ObjectRef, RegionId, Snapshot, StorageItemSnapshot};

use crate::live::{LiveItem, LiveObject};
use crate::quantize::{canonical_position, canonical_rotation};

/// Capture could not read the object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureError {
    NotFound(ObjectRef),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotFound(o) => write!(f, "live object {o} not found"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Build a fresh snapshot from a live object.
///
/// Position and rotation are stored already round-tripped through the
/// quantizer so the next reconciliation computes the same values. Containers
/// keep their contents as item rows and never carry a flat state blob.
pub fn capture_snapshot(live: &LiveObject, map_id: MapId, region: RegionId) -> Snapshot {
    let mut instance_ids = BTreeMap::new();
    instance_ids.insert(region, live.instance_id());

    let (state, storage, display) = match &live.container {
        Some(container) => (
            Vec::new(),
            unique_slots(&container.items),
            container.display.clone(),
        ),
        None => (live.state.clone(), Vec::new(), None),
    };

    Snapshot {
        id: None,
        kind: live.kind(),
        map_id,
        instance_ids,
        position: canonical_position(live.position),
        rotation: canonical_rotation(live.rotation),
        owner: live.owner,
        group: live.group,
        asset: live.asset,
        state,
        storage,
        display,
    }
}

/// First item per slot wins; a snapshot never holds two entries for one slot.
fn unique_slots(items: &[LiveItem]) -> Vec<StorageItemSnapshot> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .filter(|i| seen.insert(i.slot()))
        .map(StorageItemSnapshot::from)
        .collect()
}
