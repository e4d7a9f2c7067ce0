//! Bullet Travel
//!
//! Turret projectiles are the only entities that move in sub-cell
//! increments, integrated in Q16.16 fixed-point. Each tick a bullet
//! advances along its facing and then resolves against the occupants
//! of the cell it now overlaps: actors take damage, mirrors redirect,
//! actuators count hits, and any other enabled solid absorbs the shot.

use crate::core::fixed::{fixed_mul, from_cell, to_cell, FIXED_INV_SQRT2, FIXED_ONE};
use crate::core::grid::step;
use crate::sim::activation::{fire_send_channel, ActivationMode};
use crate::sim::entity::{Entity, EntityId, EntityKind, KindState};
use crate::sim::events::{SimEvent, SoundId};
use crate::sim::world::WorldState;

/// Fire one bullet from a turret's muzzle.
///
/// The bullet spawns in the cell the turret faces, so the turret's own
/// solid body never absorbs its shot. `slot_int2` is the speed in
/// sixteenths of a cell per tick; 0 means the default half cell.
pub fn fire_bullet(world: &mut WorldState, turret: EntityId) {
    let Some(t) = world.entity(turret) else {
        return;
    };
    let dir = t.direction;
    let (mx, my) = step(t.x, t.y, dir);
    let speed = if t.slot_int2 > 0 {
        t.slot_int2 * (FIXED_ONE / 16)
    } else {
        KindState::BULLET_SPEED
    };
    let (tx, ty, layer) = (t.x, t.y, t.layer);

    let mut bullet = Entity::new(EntityId(0), EntityKind::Bullet, mx, my, layer);
    bullet.direction = dir;
    bullet.state = KindState::Bullet {
        fx: from_cell(mx),
        fy: from_cell(my),
        speed,
        visited_mirrors: Vec::new(),
    };
    world.queue_spawn(bullet);
    world.push_event(SimEvent::sound(SoundId::Shoot, tx, ty));
}

/// Advance and resolve every bullet. One call per tick.
pub fn advance_bullets(world: &mut WorldState) {
    let bullets: Vec<EntityId> = world
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Bullet && e.is_enabled)
        .map(|e| e.id)
        .collect();

    for bullet in bullets {
        advance_one(world, bullet);
        resolve_collision(world, bullet);
    }
}

fn advance_one(world: &mut WorldState, bullet: EntityId) {
    let Some(e) = world.entity_mut(bullet) else {
        return;
    };
    let (dx, dy) = e.direction.delta();
    let diagonal = !e.direction.is_cardinal();
    if let KindState::Bullet { fx, fy, speed, .. } = &mut e.state {
        // Diagonal travel covers the same distance per tick
        let travel = if diagonal {
            fixed_mul(*speed, FIXED_INV_SQRT2)
        } else {
            *speed
        };
        *fx += dx * travel;
        *fy += dy * travel;
        let (cx, cy) = (to_cell(*fx), to_cell(*fy));
        e.x = cx;
        e.y = cy;
    }
}

fn resolve_collision(world: &mut WorldState, bullet: EntityId) {
    let Some(b) = world.entity(bullet) else {
        return;
    };
    let (bx, by, layer, dir) = (b.x, b.y, b.layer, b.direction);

    for occupant in world.ids_at(bx, by, layer) {
        if occupant == bullet {
            continue;
        }
        let Some(occ) = world.entity(occupant) else {
            continue;
        };
        if !occ.is_enabled || occ.is_decor || occ.kind == EntityKind::Bullet {
            continue;
        }
        match occ.kind {
            EntityKind::Actor => {
                world.remove_entity(bullet);
                if let Some(actor) = world.entity_mut(occupant) {
                    actor.damage(1);
                }
                world.push_event(SimEvent::hurt(occupant));
                world.push_event(SimEvent::sound(SoundId::Hit, bx, by));
                return;
            }
            EntityKind::MultiWay => {
                // Open along the travel direction: a surface to absorb
                // into. Disallowing or disabled gates let bullets pass.
                if multiway_admits(occ.slot_int1, occ.direction, dir) {
                    absorb(world, bullet, bx, by);
                    return;
                }
            }
            EntityKind::Mirror => {
                if resolve_mirror(world, bullet, occupant, bx, by) {
                    return;
                }
            }
            EntityKind::LaserActuator => {
                world.remove_entity(bullet);
                feed_actuator(world, occupant);
                world.push_event(SimEvent::sound(SoundId::Absorb, bx, by));
                return;
            }
            _ => {
                if occ.is_blocking() {
                    absorb(world, bullet, bx, by);
                    return;
                }
            }
        }
    }
}

fn absorb(world: &mut WorldState, bullet: EntityId, x: i32, y: i32) {
    world.remove_entity(bullet);
    world.push_event(SimEvent::sound(SoundId::Absorb, x, y));
}

#[inline]
fn multiway_admits(slot_int1: i32, facing: crate::core::grid::Direction, dir: crate::core::grid::Direction) -> bool {
    if slot_int1 == 0 {
        dir == facing
    } else {
        dir == facing || dir == facing.opposite()
    }
}

/// Mirror interaction. Returns true when the bullet was redirected or
/// absorbed (resolution for this tick is over).
///
/// Head-on against the mirror's facing turns the bullet 90 degrees
/// clockwise; arriving along the facing rotated clockwise adopts the
/// facing. Each mirror redirects a given bullet once; after that the
/// bullet passes through.
fn resolve_mirror(
    world: &mut WorldState,
    bullet: EntityId,
    mirror: EntityId,
    x: i32,
    y: i32,
) -> bool {
    let Some(m) = world.entity(mirror) else {
        return false;
    };
    let mirror_facing = m.direction;
    let Some(b) = world.entity(bullet) else {
        return false;
    };
    let dir = b.direction;

    let already_visited = matches!(
        &b.state,
        KindState::Bullet { visited_mirrors, .. } if visited_mirrors.contains(&mirror)
    );
    if already_visited {
        return false;
    }

    let new_dir = if dir == mirror_facing.opposite() {
        Some(dir.cw90())
    } else if dir == mirror_facing.cw90() {
        Some(mirror_facing)
    } else {
        None
    };

    match new_dir {
        Some(nd) => {
            if let Some(b) = world.entity_mut(bullet) {
                b.direction = nd;
                if let KindState::Bullet {
                    fx,
                    fy,
                    visited_mirrors,
                    ..
                } = &mut b.state
                {
                    // Re-center so the outgoing leg starts clean
                    *fx = from_cell(x);
                    *fy = from_cell(y);
                    visited_mirrors.push(mirror);
                }
            }
            world.push_event(SimEvent::sound(SoundId::Bounce, x, y));
            true
        }
        None => {
            absorb(world, bullet, x, y);
            true
        }
    }
}

/// Feed one bullet hit into an actuator's state machine.
///
/// Actions: 5 fires its channel every N hits, 6 toggles every N hits,
/// 7 fires after N hits and releases after `slot_int2` idle ticks
/// (counted in the behavior phase), 8 fires after N hits and never
/// releases.
pub fn feed_actuator(world: &mut WorldState, actuator: EntityId) {
    let Some(a) = world.entity(actuator) else {
        return;
    };
    let (action, threshold) = (a.action_type, a.slot_int1.max(1));

    let mut fire = None;
    if let Some(a) = world.entity_mut(actuator) {
        if let KindState::LaserActuator { hits, idle, lit } = &mut a.state {
            *hits += 1;
            *idle = 0;
            if *hits >= threshold {
                match action {
                    5 => {
                        *hits = 0;
                        *lit = true;
                        fire = Some(ActivationMode::Activate);
                    }
                    6 => {
                        *hits = 0;
                        *lit = !*lit;
                        fire = Some(ActivationMode::Toggle);
                    }
                    7 => {
                        *hits = 0;
                        *lit = true;
                        fire = Some(ActivationMode::Activate);
                    }
                    8 => {
                        if !*lit {
                            *lit = true;
                            fire = Some(ActivationMode::Activate);
                        }
                        *hits = 0;
                    }
                    _ => {
                        *hits = 0;
                    }
                }
            }
        }
    }
    if let Some(mode) = fire {
        fire_send_channel(world, actuator, mode);
    }
}

// =============================================================================
// TESTS
// =============================================================================
