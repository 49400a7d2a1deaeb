use bpk_reconcile::{LiveWorldIndex, OwnershipReplicator};
use bpk_schemas::ObjectRef;

/// Re-encoder that writes `owner` little-endian over the first 8 state bytes.
/// Shorter blobs are left alone. Applying the same owner twice is a no-op.
pub fn stamp_owner(state: &[u8], owner: u64, _group: u64) -> Vec<u8> {
    let mut out = state.to_vec();
    if out.len() >= 8 {
        out[..8].copy_from_slice(&owner.to_le_bytes());
    }
    out
}

/// Ownership replicator with optional state re-encoding and self-broadcast.
#[derive(Clone, Debug, Default)]
pub struct FakeOwnership {
    reencode: Option<fn(&[u8], u64, u64) -> Vec<u8>>,
    broadcasts: bool,
    applied: Vec<(ObjectRef, u64, u64)>,
}

impl FakeOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ownership changes rewrite the state blob with `f`.
    pub fn reencoding(mut self, f: fn(&[u8], u64, u64) -> Vec<u8>) -> Self {
        self.reencode = Some(f);
        self
    }

    /// Ownership changes broadcast the object themselves.
    pub fn broadcasting(mut self) -> Self {
        self.broadcasts = true;
        self
    }

    pub fn applied(&self) -> &[(ObjectRef, u64, u64)] {
        &self.applied
    }
}

impl OwnershipReplicator for FakeOwnership {
    fn apply(
        &mut self,
        world: &mut dyn LiveWorldIndex,
        object: ObjectRef,
        owner: u64,
        group: u64,
    ) -> bool {
        world.set_owner_group(object, owner, group);

        if let Some(f) = self.reencode {
            if let Some(live) = world.find(object) {
                let next = f(&live.state, owner, group);
                if next != live.state {
                    world.set_state(object, &next);
                }
            }
        }

        if self.broadcasts {
            world.broadcast_state(object);
        }

        self.applied.push((object, owner, group));
        self.broadcasts
    }
}
