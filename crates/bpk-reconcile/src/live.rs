//! Host boundary: the live world, asset lookup and ownership replication.
//!
//! The reconciler never owns a live object. It reads copied [`LiveObject`]
//! views and asks the host to mutate through [`LiveWorldIndex`]. All three
//! traits are called on the simulation thread only.

use std::fmt;

use bpk_schemas::{
    AssetRef, DisplayData, InstanceId, ObjectKind, ObjectRef, Snapshot, StorageItemSnapshot, Vec3,
};

use crate::quantize::{canonical_rotation, quantize_position};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One item currently sitting in a live container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveItem {
    pub slot_x: u8,
    pub slot_y: u8,
    pub rotation: u8,
    pub asset: AssetRef,
    pub amount: u8,
    pub quality: u8,
    pub state: Vec<u8>,
}

impl LiveItem {
    pub fn slot(&self) -> (u8, u8) {
        (self.slot_x, self.slot_y)
    }

    /// Content equality against a persisted entry (slot excluded).
    pub fn matches(&self, stored: &StorageItemSnapshot) -> bool {
        self.quality == stored.quality
            && self.amount == stored.amount
            && self.rotation == stored.rotation
            && self.asset == stored.asset
            && self.state == stored.state
    }
}

impl From<&StorageItemSnapshot> for LiveItem {
    fn from(s: &StorageItemSnapshot) -> Self {
        Self {
            slot_x: s.slot_x,
            slot_y: s.slot_y,
            rotation: s.rotation,
            asset: s.asset,
            amount: s.amount,
            quality: s.quality,
            state: s.state.clone(),
        }
    }
}

impl From<&LiveItem> for StorageItemSnapshot {
    fn from(i: &LiveItem) -> Self {
        Self {
            slot_x: i.slot_x,
            slot_y: i.slot_y,
            rotation: i.rotation,
            asset: i.asset,
            amount: i.amount,
            quality: i.quality,
            state: i.state.clone(),
        }
    }
}

/// Container half of a live object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveContainer {
    pub items: Vec<LiveItem>,
    /// `Some` when the container is display-capable; holds its current
    /// cosmetic fields.
    pub display: Option<DisplayData>,
}

/// Copied view of a live object at the moment it was looked up.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveObject {
    pub object: ObjectRef,
    pub asset: AssetRef,
    pub position: Vec3,
    pub rotation: Vec3,
    pub owner: u64,
    pub group: u64,
    pub health: u16,
    pub max_health: u16,
    /// Set while the host is tearing the object down.
    pub destroyed: bool,
    pub state: Vec<u8>,
    pub container: Option<LiveContainer>,
}

impl LiveObject {
    pub fn kind(&self) -> ObjectKind {
        self.object.kind
    }

    pub fn instance_id(&self) -> InstanceId {
        self.object.instance_id
    }

    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }
}

// ---------------------------------------------------------------------------
// Requests / errors
// ---------------------------------------------------------------------------

/// Everything the host needs to place a new object.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnRequest {
    pub kind: ObjectKind,
    pub asset: AssetRef,
    pub position: Vec3,
    pub rotation: Vec3,
    pub owner: u64,
    pub group: u64,
    pub state: Vec<u8>,
}

impl SpawnRequest {
    /// Spawn parameters taken from a snapshot, rotation in canonical form.
    pub fn from_snapshot(s: &Snapshot) -> Self {
        Self {
            kind: s.kind,
            asset: s.asset,
            position: s.position,
            rotation: canonical_rotation(s.rotation),
            owner: s.owner,
            group: s.group,
            state: s.state.clone(),
        }
    }
}

/// The host refused to place an object. Never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRejected {
    pub reason: String,
}

impl SpawnRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SpawnRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawn rejected by host: {}", self.reason)
    }
}

impl std::error::Error for SpawnRejected {}

/// Resolved asset definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetDefinition {
    pub asset: AssetRef,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Index over live placed objects.
///
/// # Contract
/// - `find` returns `None` for unknown ids; destroyed objects may still be
///   returned with `destroyed == true`.
/// - Mutators are no-ops on unknown objects.
/// - Must only be used from the simulation thread.
pub trait LiveWorldIndex {
    fn find(&self, object: ObjectRef) -> Option<LiveObject>;

    /// All live objects of `kind` that are not planted on a vehicle.
    fn enumerate(&self, kind: ObjectKind) -> Vec<LiveObject>;

    /// Nearest non-destroyed object of `kind` and `asset` within `radius` of
    /// `position`. Distance is measured on the quantized grid.
    ///
    /// The default scans `enumerate(kind)` on every call, which makes a pass
    /// quadratic in the number of placed objects. Hosts with a spatial index
    /// should override it.
    fn find_near(
        &self,
        kind: ObjectKind,
        asset: AssetRef,
        position: Vec3,
        radius: f32,
    ) -> Option<LiveObject> {
        let target = quantize_position(position);
        let limit = f64::from(radius) * crate::quantize::POSITION_STEPS_PER_UNIT;
        let limit_sq = limit * limit;

        self.enumerate(kind)
            .into_iter()
            .filter(|o| !o.destroyed && o.asset == asset)
            .filter_map(|o| {
                let q = quantize_position(o.position);
                let dx = f64::from(q.x) - f64::from(target.x);
                let dy = f64::from(q.y) - f64::from(target.y);
                let dz = f64::from(q.z) - f64::from(target.z);
                let d = dx * dx + dy * dy + dz * dz;
                (d <= limit_sq).then_some((d, o))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, o)| o)
    }

    fn spawn(&mut self, request: &SpawnRequest) -> Result<InstanceId, SpawnRejected>;

    fn destroy(&mut self, object: ObjectRef) -> bool;

    fn set_transform(&mut self, object: ObjectRef, position: Vec3, rotation: Vec3);

    /// Heal to max health.
    fn repair(&mut self, object: ObjectRef);

    fn set_state(&mut self, object: ObjectRef, state: &[u8]);

    /// Raw owner/group write without replication. Replicated changes go
    /// through [`OwnershipReplicator`].
    fn set_owner_group(&mut self, object: ObjectRef, owner: u64, group: u64);

    fn set_display(&mut self, object: ObjectRef, display: &DisplayData);

    /// Remove the item at a slot. Returns `false` if the slot was empty.
    fn remove_item(&mut self, object: ObjectRef, slot_x: u8, slot_y: u8) -> bool;

    /// Place an item. Returns `false` if the host refused it.
    fn add_item(&mut self, object: ObjectRef, item: &LiveItem) -> bool;

    /// Push the object's current state / cosmetics to every observer.
    fn broadcast_state(&mut self, object: ObjectRef);
}

/// Stable asset reference → loaded definition.
pub trait AssetResolver {
    fn resolve(&self, asset: AssetRef) -> Option<AssetDefinition>;
}

/// Applies ownership changes the way gameplay does (including replication).
pub trait OwnershipReplicator {
    /// Change owner and group of a live object.
    ///
    /// Returns `true` when the change broadcast the object's state to
    /// observers itself. Changing ownership may re-encode the object's state
    /// blob.
    fn apply(
        &mut self,
        world: &mut dyn LiveWorldIndex,
        object: ObjectRef,
        owner: u64,
        group: u64,
    ) -> bool;
}

/// The collaborators the simulation thread owns.
pub struct LiveContext<W, A, O> {
    pub world: W,
    pub assets: A,
    pub ownership: O,
}

impl<W, A, O> LiveContext<W, A, O> {
    pub fn new(world: W, assets: A, ownership: O) -> Self {
        Self {
            world,
            assets,
            ownership,
        }
    }
}
