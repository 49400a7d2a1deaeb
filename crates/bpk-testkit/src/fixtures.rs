//! Builders for live objects used across scenarios.

use bpk_reconcile::{LiveContainer, LiveItem, LiveObject};
use bpk_schemas::{AssetRef, DisplayData, InstanceId, ObjectKind, ObjectRef, Vec3};
use uuid::Uuid;

use crate::world::DEFAULT_MAX_HEALTH;

pub const OWNER: u64 = 76_561_198_000_000_001;
pub const GROUP: u64 = 42;

/// Deterministic asset reference.
pub fn asset(n: u128) -> AssetRef {
    AssetRef::new(Uuid::from_u128(n))
}

/// Healthy, owned, non-container object. Instance id is a placeholder until
/// placed in a world.
pub fn object(kind: ObjectKind, asset: AssetRef, position: Vec3, rotation: Vec3) -> LiveObject {
    LiveObject {
        object: ObjectRef::new(kind, InstanceId(0)),
        asset,
        position,
        rotation,
        owner: OWNER,
        group: GROUP,
        health: DEFAULT_MAX_HEALTH,
        max_health: DEFAULT_MAX_HEALTH,
        destroyed: false,
        state: Vec::new(),
        container: None,
    }
}

pub fn structure(asset: AssetRef, position: Vec3, rotation: Vec3) -> LiveObject {
    object(ObjectKind::Structure, asset, position, rotation)
}

pub fn barricade(asset: AssetRef, position: Vec3, state: &[u8]) -> LiveObject {
    let mut o = object(ObjectKind::Barricade, asset, position, Vec3::ZERO);
    o.state = state.to_vec();
    o
}

/// Barricade container holding `items`. `display` makes it display-capable.
pub fn container(
    asset: AssetRef,
    position: Vec3,
    items: Vec<LiveItem>,
    display: Option<DisplayData>,
) -> LiveObject {
    let mut o = object(ObjectKind::Barricade, asset, position, Vec3::ZERO);
    o.container = Some(LiveContainer { items, display });
    o
}

pub fn item(slot_x: u8, slot_y: u8, asset: AssetRef, amount: u8) -> LiveItem {
    LiveItem {
        slot_x,
        slot_y,
        rotation: 0,
        asset,
        amount,
        quality: 100,
        state: Vec::new(),
    }
}
