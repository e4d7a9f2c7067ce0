//! Movement Resolution
//!
//! Validates and applies movement for the three mover kinds (Actor,
//! Crate, Enemy) against everything already occupying the grid: locks,
//! crates to push, directional MultiWay cells, opposing belts, plain
//! solids. Also owns the non-step relocations: teleporter transfers,
//! stair layer changes, and rotate-block sub-grid turns.
//!
//! All resolution is check-then-apply: the destination is fully
//! validated against a stable view of the world before any entity is
//! touched.

use crate::core::fixed::{cell_remainder, from_cell, to_cell, FIXED_HALF};
use crate::core::grid::{step, Direction};
use crate::sim::activation::{fire_send_channel, ActivationMode};
use crate::sim::entity::{EntityId, EntityKind, KindState};
use crate::sim::events::{SimEvent, SoundId};
use crate::sim::world::WorldState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of a movement attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Did the mover change cells?
    pub moved: bool,
}

impl MoveOutcome {
    const BLOCKED: MoveOutcome = MoveOutcome { moved: false };
    const MOVED: MoveOutcome = MoveOutcome { moved: true };
}

/// How the move was initiated.
///
/// Self-propelled moves are subject to the current-cell rules (belts,
/// ice, MultiWay exits) and re-orient the mover's facing; conveyed
/// moves (belt, ice slide, enemy bounce) skip both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MoveStyle {
    SelfPropelled,
    Conveyed,
}

// =============================================================================
// PUBLIC ENTRY POINTS
// =============================================================================

/// Attempt a self-propelled move.
///
/// The mover's facing re-orients to the attempted direction even when
/// the move is blocked.
pub fn try_move(world: &mut WorldState, mover: EntityId, direction: Direction) -> MoveOutcome {
    resolve_move(world, mover, direction, MoveStyle::SelfPropelled)
}

/// Attempt a conveyed move (belt, ice slide, enemy bounce).
///
/// Skips the current-cell rules and leaves the mover's facing alone.
pub fn conveyed_move(world: &mut WorldState, mover: EntityId, direction: Direction) -> MoveOutcome {
    resolve_move(world, mover, direction, MoveStyle::Conveyed)
}

// =============================================================================
// MOVE RESOLUTION
// =============================================================================

/// Planned side effect of entering the destination cell.
enum DestEffect {
    OpenLock { lock: EntityId, color: i32 },
    OpenCoinLock { lock: EntityId, cost: u32, spend: bool },
    PushCrate { crate_id: EntityId },
}

fn resolve_move(
    world: &mut WorldState,
    mover: EntityId,
    direction: Direction,
    style: MoveStyle,
) -> MoveOutcome {
    let Some(entity) = world.entity(mover) else {
        return MoveOutcome::BLOCKED;
    };
    if !entity.is_enabled || !entity.kind.is_mover() {
        return MoveOutcome::BLOCKED;
    }
    let kind = entity.kind;
    let (x, y, layer) = (entity.x, entity.y, entity.layer);
    let prev_facing = entity.direction;
    let (nx, ny) = step(x, y, direction);

    if style == MoveStyle::SelfPropelled
        && !current_cell_allows(world, mover, x, y, layer, prev_facing, direction)
    {
        return block(world, mover, direction, style, kind);
    }

    // Validate the destination against every occupant, collecting the
    // side effects a legal entry will apply.
    let mut effects = Vec::new();
    for occupant in world.ids_at(nx, ny, layer) {
        let Some(occ) = world.entity(occupant) else {
            continue;
        };
        if !occ.is_enabled || occ.is_decor {
            continue;
        }
        match occ.kind {
            EntityKind::Lock => {
                let color = occ.slot_int1;
                let opens = kind == EntityKind::Actor
                    && world.entity(mover).is_some_and(|m| m.has_key(color));
                if opens {
                    effects.push(DestEffect::OpenLock {
                        lock: occupant,
                        color,
                    });
                } else {
                    return block(world, mover, direction, style, kind);
                }
            }
            EntityKind::CoinLock => {
                let cost = occ.slot_int1.max(0) as u32;
                let spend = occ.slot_int2 != 0;
                if kind == EntityKind::Actor && world.coins >= cost {
                    effects.push(DestEffect::OpenCoinLock {
                        lock: occupant,
                        cost,
                        spend,
                    });
                } else {
                    return block(world, mover, direction, style, kind);
                }
            }
            EntityKind::Crate => {
                if can_push_crate(world, occupant, direction) {
                    effects.push(DestEffect::PushCrate { crate_id: occupant });
                } else {
                    return block(world, mover, direction, style, kind);
                }
            }
            EntityKind::MultiWay => {
                if !multiway_admits(occ.slot_int1, occ.direction, direction) {
                    return block(world, mover, direction, style, kind);
                }
            }
            EntityKind::Belt => {
                if occ.direction == direction.opposite() {
                    return block(world, mover, direction, style, kind);
                }
            }
            _ => {
                if occ.is_blocking() {
                    return block(world, mover, direction, style, kind);
                }
            }
        }
    }

    // Legal: apply the collected side effects, then relocate.
    for effect in effects {
        match effect {
            DestEffect::OpenLock { lock, color } => {
                if let Some(m) = world.entity_mut(mover) {
                    m.take_key(color);
                }
                world.remove_entity(lock);
                world.push_event(SimEvent::sound(SoundId::Unlock, nx, ny));
            }
            DestEffect::OpenCoinLock { lock, cost, spend } => {
                if spend {
                    world.coins -= cost;
                }
                world.remove_entity(lock);
                world.push_event(SimEvent::sound(SoundId::CoinUnlock, nx, ny));
            }
            DestEffect::PushCrate { crate_id } => {
                push_crate(world, crate_id, direction);
            }
        }
    }

    if let Some(m) = world.entity_mut(mover) {
        m.x = nx;
        m.y = ny;
        if style == MoveStyle::SelfPropelled {
            m.direction = direction;
            if let KindState::Actor {
                steps_taken,
                anim_step,
                ..
            } = &mut m.state
            {
                *steps_taken += 1;
                *anim_step += 1;
            }
        }
    }

    if style == MoveStyle::SelfPropelled && kind == EntityKind::Actor {
        world.push_event(SimEvent::sound(SoundId::Step, nx, ny));
    }

    decrement_filters(world, x, y, layer);
    sweep_bullets(world, [(x, y), (nx, ny)], layer, Some(mover));
    enter_cell(world, mover, kind, nx, ny, layer);

    MoveOutcome::MOVED
}

/// Blocked-move bookkeeping: facing still re-orients on a failed
/// self-propelled attempt.
fn block(
    world: &mut WorldState,
    mover: EntityId,
    direction: Direction,
    style: MoveStyle,
    kind: EntityKind,
) -> MoveOutcome {
    if style == MoveStyle::SelfPropelled {
        let mut at = None;
        if let Some(m) = world.entity_mut(mover) {
            m.direction = direction;
            at = Some((m.x, m.y));
        }
        if kind == EntityKind::Actor {
            if let Some((bx, by)) = at {
                world.push_event(SimEvent::sound(SoundId::Bump, bx, by));
            }
        }
    }
    MoveOutcome::BLOCKED
}

/// Current-cell rules for self-propelled movement.
fn current_cell_allows(
    world: &WorldState,
    mover: EntityId,
    x: i32,
    y: i32,
    layer: i32,
    prev_facing: Direction,
    direction: Direction,
) -> bool {
    for occ in world.entities.iter().filter(|e| e.at(x, y, layer)) {
        if occ.id == mover || !occ.is_enabled {
            continue;
        }
        match occ.kind {
            // A rider cannot self-propel off a belt
            EntityKind::Belt => return false,
            // Ice locks you into continuing unless something solid
            // sits immediately behind to brace against
            EntityKind::Ice => {
                let (bx, by) = step(x, y, prev_facing.opposite());
                let braced = world
                    .entities
                    .iter()
                    .any(|e| e.at(bx, by, layer) && e.is_blocking());
                if !braced {
                    return false;
                }
            }
            EntityKind::MultiWay => {
                if !multiway_admits(occ.slot_int1, occ.direction, direction) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

/// Directional rule of a MultiWay cell.
///
/// `slot_int1` 0 means one-way (facing only); anything else means
/// two-way (facing or its opposite).
#[inline]
fn multiway_admits(slot_int1: i32, facing: Direction, direction: Direction) -> bool {
    if slot_int1 == 0 {
        direction == facing
    } else {
        direction == facing || direction == facing.opposite()
    }
}

// =============================================================================
// CRATE PUSHING
// =============================================================================

/// Check whether a crate can relocate one cell in a direction.
///
/// Validates both the crate's own cell (opposing belt, MultiWay exit)
/// and the cell beyond (blocking occupants, opposing belt, MultiWay
/// entry). Crates never chain-push.
pub fn can_push_crate(world: &WorldState, crate_id: EntityId, direction: Direction) -> bool {
    let Some(c) = world.entity(crate_id) else {
        return false;
    };
    let (cx, cy, layer) = (c.x, c.y, c.layer);

    for occ in world.entities.iter().filter(|e| e.at(cx, cy, layer)) {
        if occ.id == crate_id || !occ.is_enabled {
            continue;
        }
        match occ.kind {
            EntityKind::Belt if occ.direction == direction.opposite() => return false,
            EntityKind::MultiWay
                if !multiway_admits(occ.slot_int1, occ.direction, direction) =>
            {
                return false
            }
            _ => {}
        }
    }

    let (bx, by) = step(cx, cy, direction);
    for occ in world.entities.iter().filter(|e| e.at(bx, by, layer)) {
        if !occ.is_enabled || occ.is_decor {
            continue;
        }
        match occ.kind {
            EntityKind::Belt if occ.direction == direction.opposite() => return false,
            EntityKind::MultiWay => {
                if !multiway_admits(occ.slot_int1, occ.direction, direction) {
                    return false;
                }
            }
            _ => {
                if occ.is_blocking() {
                    return false;
                }
            }
        }
    }
    true
}

/// Relocate a crate one cell. Caller has validated with `can_push_crate`.
pub fn push_crate(world: &mut WorldState, crate_id: EntityId, direction: Direction) {
    let Some(c) = world.entity(crate_id) else {
        return;
    };
    let (cx, cy, layer) = (c.x, c.y, c.layer);
    let (bx, by) = step(cx, cy, direction);

    if let Some(c) = world.entity_mut(crate_id) {
        c.x = bx;
        c.y = by;
    }
    world.push_event(SimEvent::sound(SoundId::Push, bx, by));

    decrement_filters(world, cx, cy, layer);
    sweep_bullets(world, [(cx, cy), (bx, by)], layer, None);
    enter_cell(world, crate_id, EntityKind::Crate, bx, by, layer);
}

// =============================================================================
// CELL ENTRY EFFECTS
// =============================================================================

/// Effects of a mover arriving in a cell: pickups, click plates,
/// checkpoint touches, stair transitions.
fn enter_cell(
    world: &mut WorldState,
    mover: EntityId,
    kind: EntityKind,
    x: i32,
    y: i32,
    layer: i32,
) {
    for occupant in world.ids_at(x, y, layer) {
        let Some(occ) = world.entity(occupant) else {
            continue;
        };
        if occupant == mover || !occ.is_enabled {
            continue;
        }
        let (occ_kind, slot1, action) = (occ.kind, occ.slot_int1, occ.action_type);
        match occ_kind {
            EntityKind::Key if kind == EntityKind::Actor => {
                if let Some(m) = world.entity_mut(mover) {
                    m.add_key(slot1);
                }
                world.remove_entity(occupant);
                world.push_event(SimEvent::sound(SoundId::PickupKey, x, y));
            }
            EntityKind::Coin if kind == EntityKind::Actor => {
                world.coins += 1;
                world.remove_entity(occupant);
                world.push_event(SimEvent::sound(SoundId::PickupCoin, x, y));
            }
            EntityKind::Goal if kind == EntityKind::Actor => {
                world.goals += 1;
                world.remove_entity(occupant);
                world.push_event(SimEvent::sound(SoundId::PickupGoal, x, y));
            }
            EntityKind::Click => {
                let mode = match action {
                    6 => ActivationMode::Deactivate,
                    7 => ActivationMode::Toggle,
                    _ => ActivationMode::Activate,
                };
                fire_send_channel(world, occupant, mode);
            }
            EntityKind::Checkpoint if kind == EntityKind::Actor => {
                let mut first_touch = false;
                if let Some(cp) = world.entity_mut(occupant) {
                    if let KindState::Checkpoint { used } = &mut cp.state {
                        if !*used {
                            *used = true;
                            first_touch = true;
                        }
                    }
                }
                if first_touch {
                    world.pending_checkpoint = true;
                    world.push_event(SimEvent::sound(SoundId::Checkpoint, x, y));
                }
            }
            EntityKind::Stairs => {
                process_stairs(world, mover, occupant);
            }
            _ => {}
        }
    }
}

/// Decrement every filter in a vacated cell; at zero the filter
/// transforms into its `action_type - 5` kind.
fn decrement_filters(world: &mut WorldState, x: i32, y: i32, layer: i32) {
    for occupant in world.ids_at(x, y, layer) {
        let Some(occ) = world.entity(occupant) else {
            continue;
        };
        if occ.kind != EntityKind::Filter || !occ.is_enabled {
            continue;
        }
        let action = occ.action_type;
        let mut exhausted = false;
        if let Some(f) = world.entity_mut(occupant) {
            if let KindState::Filter { passes_left } = &mut f.state {
                *passes_left -= 1;
                exhausted = *passes_left <= 0;
            }
        }
        if exhausted {
            world.remove_entity(occupant);
            if action >= 5 {
                let kind = EntityKind::from_index(action - 5);
                world.spawn(kind, x, y, layer);
                world.push_event(SimEvent::sound(SoundId::Spawn, x, y));
            }
        }
    }
}

/// Remove bullets whose cell lies on a mover's one-cell travel segment.
///
/// An actor mover takes 1 hp per swept bullet; crates absorb silently.
fn sweep_bullets(
    world: &mut WorldState,
    cells: [(i32, i32); 2],
    layer: i32,
    damaged: Option<EntityId>,
) {
    let swept: Vec<EntityId> = world
        .entities
        .iter()
        .filter(|e| {
            e.kind == EntityKind::Bullet && e.layer == layer && {
                if let KindState::Bullet { fx, fy, .. } = &e.state {
                    let cell = (to_cell(*fx), to_cell(*fy));
                    cell == cells[0] || cell == cells[1]
                } else {
                    false
                }
            }
        })
        .map(|e| e.id)
        .collect();

    for bullet in swept {
        world.remove_entity(bullet);
        match damaged {
            Some(mover) => {
                let mut hit_at = None;
                if let Some(m) = world.entity_mut(mover) {
                    if m.damage(1) {
                        hit_at = Some((m.x, m.y));
                    }
                }
                if let Some((hx, hy)) = hit_at {
                    world.push_event(SimEvent::hurt(mover));
                    world.push_event(SimEvent::sound(SoundId::Hit, hx, hy));
                }
            }
            None => {
                world.push_event(SimEvent::sound(SoundId::Absorb, cells[1].0, cells[1].1));
            }
        }
    }
}

// =============================================================================
// STAIRS
// =============================================================================

/// Attempt a layer transition for a mover standing on a stairs cell.
///
/// `slot_int1 >= 0` climbs one layer; negative descends. Blocking
/// occupants on the target layer stop the transition unless a crate
/// there can be pushed clear in the mover's facing.
pub fn process_stairs(world: &mut WorldState, mover: EntityId, stairs: EntityId) {
    let Some(s) = world.entity(stairs) else {
        return;
    };
    let delta = if s.slot_int1 >= 0 { 1 } else { -1 };
    let Some(m) = world.entity(mover) else {
        return;
    };
    if !m.kind.is_mover() {
        return;
    }
    let (x, y, target, facing) = (m.x, m.y, m.layer + delta, m.direction);

    let mut crate_to_push = None;
    for occ in world.entities.iter().filter(|e| e.at(x, y, target)) {
        if !occ.is_blocking() {
            continue;
        }
        if occ.kind == EntityKind::Crate && crate_to_push.is_none() {
            crate_to_push = Some(occ.id);
        } else {
            return;
        }
    }
    if let Some(crate_id) = crate_to_push {
        if !can_push_crate(world, crate_id, facing) {
            return;
        }
        push_crate(world, crate_id, facing);
    }

    if let Some(m) = world.entity_mut(mover) {
        m.layer = target;
    }
    world.push_event(SimEvent::sound(SoundId::Stairs, x, y));
}

// =============================================================================
// TELEPORTERS
// =============================================================================

/// Run every enabled teleporter's transfer, once per tick per sender.
///
/// Riders are the entities on the sender's cell drawn above it, plus
/// bullets within half a cell of its center. Receivers are the other
/// enabled teleporters on the same `slot_int1` channel; a receiver
/// occupied by a pushable crate pushes it clear, one blocked by
/// anything else drops out. The receiver is picked uniformly at random
/// from the survivors.
pub fn teleport_transfers(world: &mut WorldState) {
    let senders: Vec<EntityId> = world
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Teleporter && e.is_enabled)
        .map(|e| e.id)
        .collect();

    let mut transferred: Vec<EntityId> = Vec::new();

    for sender in &senders {
        let Some(s) = world.entity(*sender) else {
            continue;
        };
        let (sx, sy, slayer, channel) = (s.x, s.y, s.layer, s.slot_int1);
        let sender_index = match world.index_of(*sender) {
            Some(idx) => idx,
            None => continue,
        };

        let riders: Vec<EntityId> = world
            .entities
            .iter()
            .enumerate()
            .filter(|(idx, e)| {
                if transferred.contains(&e.id) || e.layer != slayer {
                    return false;
                }
                match &e.state {
                    // Bullets ride on proximity, not cell identity
                    KindState::Bullet { fx, fy, .. } => {
                        (fx - from_cell(sx)).abs() <= FIXED_HALF
                            && (fy - from_cell(sy)).abs() <= FIXED_HALF
                    }
                    _ => *idx > sender_index && e.x == sx && e.y == sy,
                }
            })
            .map(|(_, e)| e.id)
            .collect();

        for rider in riders {
            let Some(r) = world.entity(rider) else {
                continue;
            };
            let rider_dir = r.direction;

            let candidates: Vec<EntityId> = world
                .entities
                .iter()
                .filter(|e| {
                    e.kind == EntityKind::Teleporter
                        && e.is_enabled
                        && e.id != *sender
                        && e.slot_int1 == channel
                })
                .map(|e| e.id)
                .collect();

            let survivors: Vec<EntityId> = candidates
                .into_iter()
                .filter(|receiver| receiver_admits(world, *receiver, rider_dir))
                .collect();
            if survivors.is_empty() {
                continue;
            }

            let pick = world.rng.next_int(survivors.len() as u32) as usize;
            let receiver = survivors[pick];
            let Some(recv) = world.entity(receiver) else {
                continue;
            };
            let (rx, ry, rlayer) = (recv.x, recv.y, recv.layer);

            if let Some(crate_id) = blocking_crate_at(world, rx, ry, rlayer) {
                push_crate(world, crate_id, rider_dir);
            }

            if let Some(r) = world.entity_mut(rider) {
                r.x = rx;
                r.y = ry;
                r.layer = rlayer;
                if let KindState::Bullet { fx, fy, .. } = &mut r.state {
                    // Sub-cell remainder survives the jump
                    *fx = from_cell(rx) + cell_remainder(*fx);
                    *fy = from_cell(ry) + cell_remainder(*fy);
                }
            }
            transferred.push(rider);
            world.push_event(SimEvent::sound(SoundId::Teleport, rx, ry));
        }
    }
}

/// Whether a receiver cell can accept a rider arriving with the given
/// facing: free of blockers, or blocked only by a pushable crate.
fn receiver_admits(world: &WorldState, receiver: EntityId, rider_dir: Direction) -> bool {
    let Some(recv) = world.entity(receiver) else {
        return false;
    };
    let (rx, ry, rlayer) = (recv.x, recv.y, recv.layer);
    for occ in world.entities.iter().filter(|e| e.at(rx, ry, rlayer)) {
        if !occ.is_blocking() {
            continue;
        }
        if occ.kind == EntityKind::Crate {
            if !can_push_crate(world, occ.id, rider_dir) {
                return false;
            }
        } else {
            return false;
        }
    }
    true
}

fn blocking_crate_at(world: &WorldState, x: i32, y: i32, layer: i32) -> Option<EntityId> {
    world
        .entities
        .iter()
        .find(|e| e.at(x, y, layer) && e.kind == EntityKind::Crate && e.is_blocking())
        .map(|e| e.id)
}

// =============================================================================
// ROTATE BLOCKS
// =============================================================================

/// Quarter-turn amount for a rotate block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationTurn {
    /// 90 degrees clockwise
    Cw90,
    /// 90 degrees counter-clockwise
    Ccw90,
    /// 180 degrees
    Half,
}

/// Rotate the N x N sub-grid anchored at a rotate block's spawn anchor.
///
/// All relocations are computed from a pre-rotation snapshot and
/// applied in a second pass, so entities sharing the region never see a
/// half-rotated world. Entity facings turn with the grid; bullets are
/// re-centered on their new cell.
pub fn apply_rotation(world: &mut WorldState, block: EntityId, turn: RotationTurn) {
    let Some(b) = world.entity(block) else {
        return;
    };
    let (ax, ay) = match b.state {
        KindState::Rotate { anchor_x, anchor_y } => (anchor_x, anchor_y),
        _ => return,
    };
    let n = b.slot_int1.max(1);
    let layer = b.layer;

    // Pass 1: plan every relocation from the pre-rotation positions
    let plan: Vec<(EntityId, i32, i32)> = world
        .entities
        .iter()
        .filter(|e| {
            e.layer == layer && e.x >= ax && e.x < ax + n && e.y >= ay && e.y < ay + n
        })
        .map(|e| {
            let (rx, ry) = (e.x - ax, e.y - ay);
            let (tx, ty) = match turn {
                RotationTurn::Cw90 => (n - 1 - ry, rx),
                RotationTurn::Ccw90 => (ry, n - 1 - rx),
                RotationTurn::Half => (n - 1 - rx, n - 1 - ry),
            };
            (e.id, ax + tx, ay + ty)
        })
        .collect();

    // Pass 2: apply
    for (id, nx, ny) in plan {
        if let Some(e) = world.entity_mut(id) {
            e.x = nx;
            e.y = ny;
            e.direction = match turn {
                RotationTurn::Cw90 => e.direction.cw90(),
                RotationTurn::Ccw90 => e.direction.ccw90(),
                RotationTurn::Half => e.direction.opposite(),
            };
            if let KindState::Bullet { fx, fy, .. } = &mut e.state {
                *fx = from_cell(nx);
                *fy = from_cell(ny);
            }
        }
    }
    world.push_event(SimEvent::sound(SoundId::Rotate, ax, ay));
}

// =============================================================================
// TESTS
// =============================================================================
