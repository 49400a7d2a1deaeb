use std::collections::{BTreeMap, BTreeSet};

use bpk_reconcile::{
    LiveContainer, LiveItem, LiveObject, LiveWorldIndex, SpawnRejected, SpawnRequest,
};
use bpk_schemas::{AssetRef, DisplayData, InstanceId, ObjectKind, ObjectRef, Vec3};

pub const DEFAULT_MAX_HEALTH: u16 = 100;

/// Every mutation the reconciler asked for, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldCall {
    Spawn { object: ObjectRef },
    Destroy { object: ObjectRef },
    SetTransform { object: ObjectRef, position: Vec3, rotation: Vec3 },
    Repair { object: ObjectRef },
    SetState { object: ObjectRef },
    SetOwnerGroup { object: ObjectRef, owner: u64, group: u64 },
    SetDisplay { object: ObjectRef },
    RemoveItem { object: ObjectRef, slot_x: u8, slot_y: u8 },
    AddItem { object: ObjectRef, slot_x: u8, slot_y: u8 },
    Broadcast { object: ObjectRef },
}

#[derive(Clone, Copy, Debug)]
struct ContainerTemplate {
    display_capable: bool,
}

/// In-memory live world.
///
/// Objects are stored by value; `find` hands out copies like a real host
/// snapshotting its state for the reconciler.
#[derive(Clone, Debug)]
pub struct FakeWorld {
    objects: BTreeMap<ObjectRef, LiveObject>,
    next_instance: u32,
    container_assets: BTreeMap<AssetRef, ContainerTemplate>,
    reject_spawns: Option<String>,
    refused_items: BTreeSet<AssetRef>,
    calls: Vec<WorldCall>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_instance: 1,
            container_assets: BTreeMap::new(),
            reject_spawns: None,
            refused_items: BTreeSet::new(),
            calls: Vec::new(),
        }
    }
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawned objects of `asset` come back as empty containers.
    pub fn register_container(&mut self, asset: AssetRef, display_capable: bool) {
        self.container_assets
            .insert(asset, ContainerTemplate { display_capable });
    }

    /// Place `template` under a fresh instance id. The template's own id is
    /// ignored; its kind is kept.
    pub fn place(&mut self, mut template: LiveObject) -> ObjectRef {
        let object = ObjectRef::new(template.kind(), self.allocate());
        template.object = object;
        self.objects.insert(object, template);
        object
    }

    /// Insert under the template's own instance id (replacing anything there).
    pub fn insert(&mut self, object: LiveObject) -> ObjectRef {
        let r = object.object;
        self.next_instance = self.next_instance.max(r.instance_id.0.saturating_add(1));
        self.objects.insert(r, object);
        r
    }

    pub fn get(&self, object: ObjectRef) -> Option<&LiveObject> {
        self.objects.get(&object)
    }

    pub fn get_mut(&mut self, object: ObjectRef) -> Option<&mut LiveObject> {
        self.objects.get_mut(&object)
    }

    /// Drop an object without recording a call (lost between sessions).
    pub fn forget(&mut self, object: ObjectRef) -> Option<LiveObject> {
        self.objects.remove(&object)
    }

    pub fn mark_destroyed(&mut self, object: ObjectRef) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.destroyed = true;
        }
    }

    pub fn reject_spawns(&mut self, reason: &str) {
        self.reject_spawns = Some(reason.to_string());
    }

    /// `add_item` refuses every item of `asset`, as a full or locked host container would.
    pub fn refuse_items_of(&mut self, asset: AssetRef) {
        self.refused_items.insert(asset);
    }

    pub fn objects(&self) -> impl Iterator<Item = &LiveObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn calls(&self) -> &[WorldCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<WorldCall> {
        std::mem::take(&mut self.calls)
    }

    fn allocate(&mut self) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        id
    }

    fn container_mut(&mut self, object: ObjectRef) -> Option<&mut LiveContainer> {
        self.objects
            .get_mut(&object)
            .and_then(|o| o.container.as_mut())
    }
}

impl LiveWorldIndex for FakeWorld {
    fn find(&self, object: ObjectRef) -> Option<LiveObject> {
        self.objects.get(&object).cloned()
    }

    fn enumerate(&self, kind: ObjectKind) -> Vec<LiveObject> {
        self.objects
            .values()
            .filter(|o| o.kind() == kind)
            .cloned()
            .collect()
    }

    fn spawn(&mut self, request: &SpawnRequest) -> Result<InstanceId, SpawnRejected> {
        if let Some(reason) = &self.reject_spawns {
            return Err(SpawnRejected::new(reason.clone()));
        }

        let container = self
            .container_assets
            .get(&request.asset)
            .map(|t| LiveContainer {
                items: Vec::new(),
                display: t.display_capable.then(DisplayData::default),
            });

        let object = ObjectRef::new(request.kind, self.allocate());
        self.objects.insert(
            object,
            LiveObject {
                object,
                asset: request.asset,
                position: request.position,
                rotation: request.rotation,
                owner: request.owner,
                group: request.group,
                health: DEFAULT_MAX_HEALTH,
                max_health: DEFAULT_MAX_HEALTH,
                destroyed: false,
                state: if container.is_some() {
                    Vec::new()
                } else {
                    request.state.clone()
                },
                container,
            },
        );
        self.calls.push(WorldCall::Spawn { object });
        Ok(object.instance_id)
    }

    fn destroy(&mut self, object: ObjectRef) -> bool {
        let removed = self.objects.remove(&object).is_some();
        self.calls.push(WorldCall::Destroy { object });
        removed
    }

    fn set_transform(&mut self, object: ObjectRef, position: Vec3, rotation: Vec3) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.position = position;
            o.rotation = rotation;
        }
        self.calls.push(WorldCall::SetTransform {
            object,
            position,
            rotation,
        });
    }

    fn repair(&mut self, object: ObjectRef) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.health = o.max_health;
        }
        self.calls.push(WorldCall::Repair { object });
    }

    fn set_state(&mut self, object: ObjectRef, state: &[u8]) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.state = state.to_vec();
        }
        self.calls.push(WorldCall::SetState { object });
    }

    fn set_owner_group(&mut self, object: ObjectRef, owner: u64, group: u64) {
        if let Some(o) = self.objects.get_mut(&object) {
            o.owner = owner;
            o.group = group;
        }
        self.calls.push(WorldCall::SetOwnerGroup {
            object,
            owner,
            group,
        });
    }

    fn set_display(&mut self, object: ObjectRef, display: &DisplayData) {
        if let Some(c) = self.container_mut(object) {
            if c.display.is_some() {
                c.display = Some(display.clone());
            }
        }
        self.calls.push(WorldCall::SetDisplay { object });
    }

    fn remove_item(&mut self, object: ObjectRef, slot_x: u8, slot_y: u8) -> bool {
        self.calls.push(WorldCall::RemoveItem {
            object,
            slot_x,
            slot_y,
        });
        match self.container_mut(object) {
            Some(c) => {
                let before = c.items.len();
                c.items.retain(|i| i.slot() != (slot_x, slot_y));
                c.items.len() != before
            }
            None => false,
        }
    }

    fn add_item(&mut self, object: ObjectRef, item: &LiveItem) -> bool {
        self.calls.push(WorldCall::AddItem {
            object,
            slot_x: item.slot_x,
            slot_y: item.slot_y,
        });
        if self.refused_items.contains(&item.asset) {
            return false;
        }
        match self.container_mut(object) {
            Some(c) if !c.items.iter().any(|i| i.slot() == item.slot()) => {
                c.items.push(item.clone());
                true
            }
            _ => false,
        }
    }

    fn broadcast_state(&mut self, object: ObjectRef) {
        self.calls.push(WorldCall::Broadcast { object });
    }
}
