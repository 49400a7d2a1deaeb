//! bpk-reconcile
//!
//! Placed-object reconciliation core:
//! - quantized rotation / position comparison
//! - slot-keyed container diff
//! - capture (live object → snapshot)
//! - reconciliation (snapshot → corrected live object + dirty flag)
//!
//! No store I/O. Everything that touches the live world goes through the
//! collaborator traits in [`live`] and must run on the simulation thread.

mod capture;
mod engine;
pub mod live;
pub mod quantize;
pub mod storage_diff;
mod types;

pub use capture::{capture_snapshot, CaptureError};
pub use engine::{reconcile_pass, reconcile_snapshot};
pub use live::{
    AssetDefinition, AssetResolver, LiveContainer, LiveContext, LiveItem, LiveObject,
    LiveWorldIndex, OwnershipReplicator, SpawnRejected, SpawnRequest,
};
pub use storage_diff::{diff_storage, Discard, DiscardReason, StorageDiff};
pub use types::*;
