use tracing::{error, info, warn};

use bpk_schemas::{ObjectRef, Snapshot};

use crate::live::{
    AssetResolver, LiveContext, LiveItem, LiveObject, LiveWorldIndex, OwnershipReplicator,
    SpawnRequest,
};
use crate::quantize::{canonical_rotation, same_position, same_rotation};
use crate::storage_diff::diff_storage;
use crate::{Correction, PassResult, PruneReason, ReconcileReport, ReconcileScope};

/// Locate the live object for a snapshot: stored instance id for this region
/// first, then spatial search. Destroyed objects and id hits with a different
/// asset count as absent (instance ids are reused across sessions).
fn locate<W: LiveWorldIndex>(
    world: &W,
    scope: &ReconcileScope,
    snapshot: &Snapshot,
) -> Option<LiveObject> {
    if let Some(object) = snapshot.object_ref(scope.region) {
        let by_id = world
            .find(object)
            .filter(|o| !o.destroyed && o.asset == snapshot.asset);
        if by_id.is_some() {
            return by_id;
        }
    }
    world
        .find_near(
            snapshot.kind,
            snapshot.asset,
            snapshot.position,
            scope.search_radius,
        )
        .filter(|o| !o.destroyed)
}

/// Reconcile one snapshot against the live world.
///
/// The snapshot is authoritative: live drift is corrected toward it. The
/// snapshot itself only changes for bookkeeping (instance ids, canonical
/// rotation, captured cosmetics, adopted state), and the returned outcome is
/// `Dirty` exactly when that happened. Nothing is written to the store.
pub fn reconcile_snapshot<W, A, O>(
    ctx: &mut LiveContext<W, A, O>,
    scope: &ReconcileScope,
    snapshot: &mut Snapshot,
) -> ReconcileReport
where
    W: LiveWorldIndex,
    A: AssetResolver,
    O: OwnershipReplicator,
{
    let LiveContext {
        world,
        assets,
        ownership,
    } = ctx;

    let mut corrections: Vec<Correction> = Vec::new();
    let mut dirty = false;

    // 1) Locate
    let found = locate(world, scope, snapshot);

    // 2) Resolve intended asset
    let definition = assets.resolve(snapshot.asset);
    if found.is_none() && definition.is_none() {
        error!(
            snapshot_id = ?snapshot.id,
            kind = %snapshot.kind,
            asset = %snapshot.asset,
            "asset unresolvable and no live object; pruning snapshot"
        );
        return ReconcileReport::pruned(PruneReason::AssetUnresolvable, corrections);
    }

    let canonical = canonical_rotation(snapshot.rotation);
    if !canonical.bits_eq(&snapshot.rotation) {
        snapshot.rotation = canonical;
        dirty = true;
        corrections.push(Correction::RotationRequantized);
    }

    // 3) Recreate if missing
    let live = match found {
        Some(live) => {
            if snapshot.set_instance(scope.region, live.instance_id()) {
                info!(
                    snapshot_id = ?snapshot.id,
                    object = %live.object,
                    region = %scope.region,
                    "live object found by position; rebinding instance id"
                );
                dirty = true;
                corrections.push(Correction::InstanceRebound {
                    instance_id: live.instance_id(),
                });
            }
            live
        }
        None => {
            let request = SpawnRequest::from_snapshot(snapshot);
            let instance_id = match world.spawn(&request) {
                Ok(id) => id,
                Err(rejected) => {
                    error!(
                        snapshot_id = ?snapshot.id,
                        kind = %snapshot.kind,
                        asset = %snapshot.asset,
                        reason = %rejected.reason,
                        "host rejected re-creation; pruning snapshot"
                    );
                    return ReconcileReport::pruned(
                        PruneReason::CreationRejected {
                            reason: rejected.reason,
                        },
                        corrections,
                    );
                }
            };

            snapshot.set_instance(scope.region, instance_id);
            dirty = true;
            corrections.push(Correction::Recreated { instance_id });
            info!(
                snapshot_id = ?snapshot.id,
                kind = %snapshot.kind,
                instance_id = %instance_id,
                region = %scope.region,
                "recreated missing live object"
            );

            match world.find(ObjectRef::new(snapshot.kind, instance_id)) {
                Some(spawned) if spawned.is_container() => spawned,
                _ => return ReconcileReport::finish(dirty, corrections),
            }
        }
    };

    let object = live.object;

    // 4) Transform: live is forced toward the snapshot, never the reverse.
    if !same_rotation(live.rotation, snapshot.rotation)
        || !same_position(live.position, snapshot.position)
    {
        info!(
            snapshot_id = ?snapshot.id,
            object = %object,
            "live transform drifted; restoring"
        );
        world.set_transform(object, snapshot.position, snapshot.rotation);
        corrections.push(Correction::Moved {
            from_position: live.position,
            from_rotation: live.rotation,
        });
    }

    // 5) Damage is never persisted.
    if live.health < live.max_health {
        world.repair(object);
        corrections.push(Correction::Repaired {
            from_health: live.health,
            to_health: live.max_health,
        });
    }

    let ownership_differs = live.owner != snapshot.owner || live.group != snapshot.group;

    match &live.container {
        // 6) Container
        Some(container) => {
            let mut state_touched = false;

            // a) cosmetics
            match (&snapshot.display, &container.display) {
                (None, Some(current)) => {
                    snapshot.display = Some(current.clone());
                    dirty = true;
                    corrections.push(Correction::DisplayCaptured);
                }
                (Some(wanted), Some(current)) if wanted != current => {
                    info!(object = %object, "display cosmetics drifted; restoring");
                    world.set_display(object, wanted);
                    state_touched = true;
                    corrections.push(Correction::DisplayApplied);
                }
                _ => {}
            }

            // b) contents
            let diff = diff_storage(&snapshot.storage, &container.items);
            if !diff.shadowed.is_empty() {
                warn!(
                    snapshot_id = ?snapshot.id,
                    count = diff.shadowed.len(),
                    "snapshot holds duplicate item slots; extra entries ignored"
                );
            }
            if !diff.is_empty() {
                info!(
                    object = %object,
                    discard = diff.discard.len(),
                    spawn = diff.spawn.len(),
                    "container contents drifted; resyncing"
                );
            }
            for d in &diff.discard {
                world.remove_item(object, d.slot_x, d.slot_y);
                state_touched = true;
                corrections.push(Correction::ItemDiscarded {
                    slot_x: d.slot_x,
                    slot_y: d.slot_y,
                    reason: d.reason,
                });
            }
            for &idx in &diff.spawn {
                let item = &snapshot.storage[idx];
                let placed = assets.resolve(item.asset).is_some()
                    && world.add_item(object, &LiveItem::from(item));
                if placed {
                    state_touched = true;
                    corrections.push(Correction::ItemSpawned {
                        slot_x: item.slot_x,
                        slot_y: item.slot_y,
                    });
                } else {
                    warn!(
                        object = %object,
                        slot_x = item.slot_x,
                        slot_y = item.slot_y,
                        asset = %item.asset,
                        "could not place stored item"
                    );
                    corrections.push(Correction::ItemSkipped {
                        slot_x: item.slot_x,
                        slot_y: item.slot_y,
                    });
                }
            }

            // c) ownership
            let mut broadcast_done = false;
            if ownership_differs {
                info!(
                    object = %object,
                    owner = snapshot.owner,
                    group = snapshot.group,
                    "ownership drifted; restoring"
                );
                broadcast_done =
                    ownership.apply(&mut *world, object, snapshot.owner, snapshot.group);
                corrections.push(Correction::OwnershipApplied {
                    owner: snapshot.owner,
                    group: snapshot.group,
                });
            }
            if state_touched && !broadcast_done {
                world.broadcast_state(object);
                corrections.push(Correction::Rebroadcast);
            }

            // d) containers do not use the flat state blob
            if !snapshot.state.is_empty() {
                snapshot.state.clear();
                dirty = true;
                corrections.push(Correction::LegacyStateCleared);
            }
        }

        // 7) Non-container
        None => {
            let mut state_changed = false;
            if live.state != snapshot.state {
                info!(object = %object, "state drifted; restoring");
                world.set_state(object, &snapshot.state);
                state_changed = true;
                corrections.push(Correction::StateApplied);
            }

            let mut broadcast_done = false;
            if ownership_differs {
                info!(
                    object = %object,
                    owner = snapshot.owner,
                    group = snapshot.group,
                    "ownership drifted; restoring"
                );
                broadcast_done =
                    ownership.apply(&mut *world, object, snapshot.owner, snapshot.group);
                corrections.push(Correction::OwnershipApplied {
                    owner: snapshot.owner,
                    group: snapshot.group,
                });

                // Ownership changes may re-encode state.
                if let Some(after) = world.find(object) {
                    if after.state != snapshot.state {
                        snapshot.state = after.state;
                        dirty = true;
                        state_changed = true;
                        corrections.push(Correction::StateAdopted);
                    }
                }
            }

            if state_changed && !broadcast_done {
                world.broadcast_state(object);
                corrections.push(Correction::Rebroadcast);
            }
        }
    }

    // 8) Caller batches persistence.
    ReconcileReport::finish(dirty, corrections)
}

/// Reconcile every snapshot in `snapshots`, removing pruned ones from the list.
pub fn reconcile_pass<W, A, O>(
    ctx: &mut LiveContext<W, A, O>,
    scope: &ReconcileScope,
    snapshots: &mut Vec<Snapshot>,
) -> PassResult
where
    W: LiveWorldIndex,
    A: AssetResolver,
    O: OwnershipReplicator,
{
    let mut result = PassResult::default();
    let mut kept: Vec<Snapshot> = Vec::with_capacity(snapshots.len());

    for mut snapshot in snapshots.drain(..) {
        let report = reconcile_snapshot(ctx, scope, &mut snapshot);
        result.corrections += report.corrections.len();
        if report.is_pruned() {
            result.pruned.push(snapshot);
            continue;
        }
        if report.is_dirty() {
            result.dirty.push(kept.len());
        }
        kept.push(snapshot);
    }

    *snapshots = kept;
    result
}
