//! Slot-keyed container diff.
//!
//! The slot coordinate is the only identity a contained item has. A different
//! asset, rotation or amount at the same slot means "this item changed" and
//! the live item is overwritten; it is never treated as a second item.

use std::collections::{BTreeMap, BTreeSet};

use bpk_schemas::StorageItemSnapshot;

use crate::live::LiveItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiscardReason {
    /// Same slot as a snapshot entry but different content.
    Changed,
    /// Slot has no snapshot entry.
    Unexpected,
    /// The live container reported more than one item at this slot.
    DuplicateSlot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Discard {
    pub slot_x: u8,
    pub slot_y: u8,
    pub reason: DiscardReason,
}

/// What to do to the live container so it matches the snapshot.
/// Discards must be applied before spawns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageDiff {
    pub discard: Vec<Discard>,
    /// Indices into the snapshot item list that must be (re-)spawned.
    pub spawn: Vec<usize>,
    /// Snapshot indices ignored because an earlier entry already owns the slot.
    pub shadowed: Vec<usize>,
}

impl StorageDiff {
    pub fn is_empty(&self) -> bool {
        self.discard.is_empty() && self.spawn.is_empty()
    }
}

pub fn diff_storage(snapshot: &[StorageItemSnapshot], live: &[LiveItem]) -> StorageDiff {
    let mut diff = StorageDiff::default();

    let mut wanted: BTreeMap<(u8, u8), usize> = BTreeMap::new();
    for (idx, item) in snapshot.iter().enumerate() {
        if wanted.contains_key(&item.slot()) {
            diff.shadowed.push(idx);
        } else {
            wanted.insert(item.slot(), idx);
        }
    }

    let mut live_count: BTreeMap<(u8, u8), usize> = BTreeMap::new();
    for item in live {
        *live_count.entry(item.slot()).or_insert(0) += 1;
    }

    let mut matched: BTreeSet<usize> = BTreeSet::new();
    for item in live {
        let slot = item.slot();
        let reason = if live_count.get(&slot).copied().unwrap_or(0) > 1 {
            Some(DiscardReason::DuplicateSlot)
        } else {
            match wanted.get(&slot) {
                Some(&idx) if item.matches(&snapshot[idx]) => {
                    matched.insert(idx);
                    None
                }
                Some(_) => Some(DiscardReason::Changed),
                None => Some(DiscardReason::Unexpected),
            }
        };
        if let Some(reason) = reason {
            diff.discard.push(Discard {
                slot_x: slot.0,
                slot_y: slot.1,
                reason,
            });
        }
    }

    diff.spawn = wanted
        .values()
        .copied()
        .filter(|idx| !matched.contains(idx))
        .collect();
    diff.spawn.sort_unstable();

    diff
}
