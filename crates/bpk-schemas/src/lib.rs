//! bpk-schemas
//!
//! Shared data model for placed-object persistence: the persisted
//! [`Snapshot`] aggregate and the identifiers used to address live objects.
//! No logic beyond small accessors lives here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Database row id of a persisted snapshot.
pub type SnapshotId = i64;

/// Map / layout identifier. Snapshots are only ever restored onto the map
/// they were captured on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MapId(pub u32);

/// Server region number. Several server processes may share one database;
/// each one owns the instance ids it hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u16);

/// Live-instance id assigned by the host when an object is spawned.
/// Only meaningful within one region and one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

/// Stable asset identity (GUID). Never a pointer to a loaded definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetRef(pub Uuid);

impl AssetRef {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of placeable objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Free-standing structure (floors, walls, pillars).
    Structure,
    /// Attachable barricade. Only barricades can be containers.
    Barricade,
}

impl ObjectKind {
    pub fn is_structure(&self) -> bool {
        matches!(self, ObjectKind::Structure)
    }

    pub fn from_is_structure(is_structure: bool) -> Self {
        if is_structure {
            ObjectKind::Structure
        } else {
            ObjectKind::Barricade
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Structure => "STRUCTURE",
            ObjectKind::Barricade => "BARRICADE",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one live object: kind plus instance id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub instance_id: InstanceId,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, instance_id: InstanceId) -> Self {
        Self { kind, instance_id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.instance_id)
    }
}

/// World-space vector. Used for positions and Euler rotations (degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Bit-level equality. Distinguishes `0.0` from `-0.0`; used to check
    /// whether a stored value is already in canonical form.
    pub fn bits_eq(&self, other: &Vec3) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
    }
}

/// One item inside a persisted container. `(slot_x, slot_y)` is the identity
/// key; two entries in one snapshot never share a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItemSnapshot {
    pub slot_x: u8,
    pub slot_y: u8,
    pub rotation: u8,
    pub asset: AssetRef,
    pub amount: u8,
    pub quality: u8,
    pub state: Vec<u8>,
}

impl StorageItemSnapshot {
    pub fn slot(&self) -> (u8, u8) {
        (self.slot_x, self.slot_y)
    }
}

/// Cosmetic override for display-capable containers (weapon racks, mannequins).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayData {
    pub mythic: Option<AssetRef>,
    pub skin: Option<AssetRef>,
    pub tags: String,
    pub dynamic_props: String,
    pub rotation: u8,
}

/// Persisted canonical state of one placed object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// `None` until the snapshot has been inserted.
    pub id: Option<SnapshotId>,
    pub kind: ObjectKind,
    pub map_id: MapId,
    /// Live instance id per hosting region. A map, so a region can only ever
    /// hold one entry.
    pub instance_ids: BTreeMap<RegionId, InstanceId>,
    pub position: Vec3,
    /// Always stored already rounded through the rotation quantizer.
    pub rotation: Vec3,
    pub owner: u64,
    pub group: u64,
    pub asset: AssetRef,
    /// Opaque host metadata (sign text, lock codes). Empty for containers.
    pub state: Vec<u8>,
    pub storage: Vec<StorageItemSnapshot>,
    pub display: Option<DisplayData>,
}

impl Snapshot {
    pub fn instance_for(&self, region: RegionId) -> Option<InstanceId> {
        self.instance_ids.get(&region).copied()
    }

    /// Insert or update the instance id for `region`.
    /// Returns `true` when the stored mapping changed.
    pub fn set_instance(&mut self, region: RegionId, instance_id: InstanceId) -> bool {
        self.instance_ids.insert(region, instance_id) != Some(instance_id)
    }

    pub fn object_ref(&self, region: RegionId) -> Option<ObjectRef> {
        self.instance_for(region)
            .map(|instance_id| ObjectRef::new(self.kind, instance_id))
    }

    pub fn item_at(&self, slot_x: u8, slot_y: u8) -> Option<&StorageItemSnapshot> {
        self.storage
            .iter()
            .find(|i| i.slot_x == slot_x && i.slot_y == slot_y)
    }
}
