//! Per-Kind Behavior
//!
//! Phase-3 dispatch: each entity gets one update per tick, in list
//! order. Generic activation actions (0-4) are resolved first; what
//! remains is the kind-specific catalogue (action types >= 5) plus the
//! autonomous machines that run without any activation at all (turret
//! reload, panel occupancy, auto-emitters, actuator idle release).

use crate::core::grid;
use crate::sim::activation::{self, ActivationMode};
use crate::sim::bullet;
use crate::sim::entity::{EntityId, EntityKind, KindState};
use crate::sim::events::{SimEvent, SoundId};
use crate::sim::movement::{self, RotationTurn};
use crate::sim::world::WorldState;

/// Update one entity for this tick.
///
/// Safe to call with a stale id; removed entities are skipped.
pub fn update_entity(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    let kind = entity.kind;

    if activation::handle_generic_action(world, id) {
        return;
    }

    match kind {
        EntityKind::Gate => update_gate(world, id),
        EntityKind::Panel => update_panel(world, id),
        EntityKind::Click => update_relay(world, id),
        EntityKind::EAuto => update_auto(world, id),
        EntityKind::Turret => update_turret(world, id),
        EntityKind::LaserActuator => update_actuator(world, id),
        EntityKind::Rotate => update_rotate(world, id),
        EntityKind::Spawner => update_spawner(world, id),
        EntityKind::Crate => update_crate(world, id),
        EntityKind::Filter => update_filter(world, id),
        EntityKind::EPusher => update_pusher(world, id),
        _ => {}
    }
}

/// Channel mode for the relay-style actions (5 activate, 6 deactivate,
/// 7 toggle). Matches the mapping used for floor clicks.
fn relay_mode(action_type: i32) -> ActivationMode {
    match action_type {
        6 => ActivationMode::Deactivate,
        7 => ActivationMode::Toggle,
        _ => ActivationMode::Activate,
    }
}

// =============================================================================
// GATES
// =============================================================================

/// Action 5 toggles solidity on each activation. Actions 6 and 7 are
/// level-triggered: solidity tracks `is_activated` (forced solid, or
/// forced open) for as long as the flag stays set, so the flag is not
/// cleared here.
fn update_gate(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity_mut(id) else {
        return;
    };
    match entity.action_type {
        5 if entity.is_activated => {
            entity.is_solid = !entity.is_solid;
            entity.is_activated = false;
        }
        6 => entity.is_solid = entity.is_activated,
        7 => entity.is_solid = !entity.is_activated,
        _ => {}
    }
}

// =============================================================================
// PANELS, CLICKS, AUTO-EMITTERS
// =============================================================================

/// Pressure panels are occupancy-level-triggered: the latch state tracks
/// whether a mover currently holds the panel down.
///
/// Action 5 is momentary (fires its channel on press, releases it on
/// vacate), 6 latches on permanently, 7 latches on and then disables
/// the panel itself.
fn update_panel(world: &mut WorldState, id: EntityId) {
    let Some(panel) = world.entity(id) else {
        return;
    };
    if !panel.is_enabled || panel.action_type < 5 {
        return;
    }
    let (x, y, layer, action_type) = (panel.x, panel.y, panel.layer, panel.action_type);

    let occupied = world.entities.iter().any(|e| {
        e.id != id
            && e.is_enabled
            && e.kind.is_mover()
            && e.x == x
            && e.y == y
            && e.layer == layer
    });

    let Some(panel) = world.entity_mut(id) else {
        return;
    };
    let KindState::Latch { armed, fired } = &mut panel.state else {
        return;
    };

    let mut fire = None;
    match action_type {
        5 => {
            if occupied && *armed {
                *armed = false;
                fire = Some(ActivationMode::Activate);
            } else if !occupied && !*armed {
                *armed = true;
                fire = Some(ActivationMode::Deactivate);
            }
        }
        6 => {
            if occupied && !*fired {
                *fired = true;
                fire = Some(ActivationMode::Activate);
            }
        }
        7 => {
            if occupied && !*fired {
                *fired = true;
                panel.is_enabled = false;
                fire = Some(ActivationMode::Activate);
            }
        }
        _ => {}
    }

    if let Some(mode) = fire {
        activation::fire_send_channel(world, id, mode);
    }
}

/// A click relays a channel signal when it is itself activated. Entry
/// by a mover is handled at move time; this path covers clicks wired
/// as listeners on another channel.
fn update_relay(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_activated || entity.action_type < 5 {
        return;
    }
    let mode = relay_mode(entity.action_type);
    if let Some(entity) = world.entity_mut(id) {
        entity.is_activated = false;
    }
    activation::fire_send_channel(world, id, mode);
}

/// Auto-emitter: fires its channel once on the first update while
/// enabled, then stays quiet. Disabling it re-arms the latch, so an
/// enable/disable cycle produces one fresh firing.
fn update_auto(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity_mut(id) else {
        return;
    };
    if !entity.is_enabled {
        if let KindState::Latch { fired, .. } = &mut entity.state {
            *fired = false;
        }
        return;
    }
    let action_type = entity.action_type;
    let fire = match &mut entity.state {
        KindState::Latch { fired, .. } if !*fired => {
            *fired = true;
            true
        }
        _ => false,
    };
    if fire {
        activation::fire_send_channel(world, id, relay_mode(action_type));
    }
}

// =============================================================================
// TURRETS AND ACTUATORS
// =============================================================================

/// Activation action 5 fires one bullet immediately. Independently, a
/// positive `slot_int1` is a reload period in ticks: the countdown
/// decrements every update and fires on expiry.
fn update_turret(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    let (is_activated, action_type) = (entity.is_activated, entity.action_type);
    let (is_enabled, reload) = (entity.is_enabled, entity.slot_int1);

    if is_activated && action_type >= 5 {
        if let Some(entity) = world.entity_mut(id) {
            entity.is_activated = false;
        }
        bullet::fire_bullet(world, id);
        return;
    }

    if !is_enabled || reload <= 0 {
        return;
    }
    let Some(entity) = world.entity_mut(id) else {
        return;
    };
    let fire = match &mut entity.state {
        KindState::Turret { countdown } => {
            *countdown -= 1;
            if *countdown <= 0 {
                *countdown = reload;
                true
            } else {
                false
            }
        }
        _ => false,
    };
    if fire {
        bullet::fire_bullet(world, id);
    }
}

/// Idle release for actuator mode 7: while lit, each bullet-free tick
/// increments the idle counter; after `slot_int2` idle ticks the
/// actuator deactivates its channel and goes dark. Bullet hits are fed
/// in by the bullet phase and reset the counter there.
fn update_actuator(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_enabled || entity.action_type != 7 {
        return;
    }
    let release_after = entity.slot_int2.max(1);

    let Some(entity) = world.entity_mut(id) else {
        return;
    };
    let release = match &mut entity.state {
        KindState::LaserActuator { idle, lit, .. } if *lit => {
            *idle += 1;
            if *idle >= release_after {
                *lit = false;
                *idle = 0;
                true
            } else {
                false
            }
        }
        _ => false,
    };
    if release {
        activation::fire_send_channel(world, id, ActivationMode::Deactivate);
    }
}

// =============================================================================
// ROTATORS, SPAWNERS, BREAKERS
// =============================================================================

fn update_rotate(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_activated || entity.action_type < 5 {
        return;
    }
    let turn = match entity.action_type {
        5 => Some(RotationTurn::Cw90),
        6 => Some(RotationTurn::Ccw90),
        7 => Some(RotationTurn::Half),
        _ => None,
    };
    if let Some(entity) = world.entity_mut(id) {
        entity.is_activated = false;
    }
    if let Some(turn) = turn {
        movement::apply_rotation(world, id, turn);
    }
}

/// Spawners create a fresh entity of kind `action_type - 5` at their
/// own cell each time they are activated.
fn update_spawner(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_activated || entity.action_type < 5 {
        return;
    }
    let kind = EntityKind::from_index(entity.action_type - 5);
    let (x, y, layer) = (entity.x, entity.y, entity.layer);
    if let Some(entity) = world.entity_mut(id) {
        entity.is_activated = false;
    }
    world.spawn(kind, x, y, layer);
    world.push_event(SimEvent::sound(SoundId::Spawn, x, y));
}

/// An activated crate with a kind-specific action breaks open: it
/// deletes itself and spawns its contents (kind `action_type - 5`).
fn update_crate(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_activated || entity.action_type < 5 {
        return;
    }
    let kind = EntityKind::from_index(entity.action_type - 5);
    let (x, y, layer) = (entity.x, entity.y, entity.layer);
    if let Some(entity) = world.entity_mut(id) {
        entity.is_activated = false;
    }
    world.queue_remove(id);
    world.spawn(kind, x, y, layer);
    world.push_event(SimEvent::sound(SoundId::Break, x, y));
}

/// Activating a filter transforms it immediately, without waiting for
/// its pass count to run out.
fn update_filter(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_activated || entity.action_type < 5 {
        return;
    }
    let kind = EntityKind::from_index(entity.action_type - 5);
    let (x, y, layer) = (entity.x, entity.y, entity.layer);
    if let Some(entity) = world.entity_mut(id) {
        entity.is_activated = false;
    }
    world.queue_remove(id);
    world.spawn(kind, x, y, layer);
    world.push_event(SimEvent::sound(SoundId::Spawn, x, y));
}

// =============================================================================
// PUSHERS
// =============================================================================

/// An activated pusher shoves every solid in the cell it faces one cell
/// further along its facing, when the cell beyond is clear. Crates get
/// the full crate-push rules (belts, one-way gates); other solids just
/// need an unblocked destination.
fn update_pusher(world: &mut WorldState, id: EntityId) {
    let Some(entity) = world.entity(id) else {
        return;
    };
    if !entity.is_activated || entity.action_type < 5 {
        return;
    }
    let direction = entity.direction;
    let (x, y, layer) = (entity.x, entity.y, entity.layer);
    if let Some(entity) = world.entity_mut(id) {
        entity.is_activated = false;
    }

    let (ax, ay) = grid::step(x, y, direction);
    let targets: Vec<EntityId> = world
        .entities
        .iter()
        .filter(|e| e.id != id && e.x == ax && e.y == ay && e.layer == layer && e.is_blocking())
        .map(|e| e.id)
        .collect();

    for target in targets {
        let Some(entity) = world.entity(target) else {
            continue;
        };
        if entity.kind == EntityKind::Crate {
            if movement::can_push_crate(world, target, direction) {
                movement::push_crate(world, target, direction);
            }
            continue;
        }
        let (dx, dy) = grid::step(ax, ay, direction);
        let blocked = world
            .entities
            .iter()
            .any(|e| e.id != target && e.x == dx && e.y == dy && e.layer == layer && e.is_blocking());
        if !blocked {
            if let Some(entity) = world.entity_mut(target) {
                entity.x = dx;
                entity.y = dy;
            }
            world.push_event(SimEvent::sound(SoundId::Push, dx, dy));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::sim::world::{LevelOptions, WorldState};

    fn test_world() -> WorldState {
        WorldState::new(LevelOptions::default(), 0)
    }

    fn activated(world: &mut WorldState, kind: EntityKind, action_type: i32) -> EntityId {
        let id = world.spawn(kind, 0, 0, 0);
        let entity = world.entity_mut(id).unwrap();
        entity.action_type = action_type;
        entity.is_activated = true;
        id
    }

    #[test]
    fn test_gate_toggle_solidity() {
        let mut world = test_world();
        let gate = activated(&mut world, EntityKind::Gate, 5);
        assert!(world.entity(gate).unwrap().is_solid);

        update_entity(&mut world, gate);
        let e = world.entity(gate).unwrap();
        assert!(!e.is_solid);
        assert!(!e.is_activated);
    }

    #[test]
    fn test_gate_force_modes_track_activation() {
        let mut world = test_world();
        let gate = activated(&mut world, EntityKind::Gate, 7);

        update_entity(&mut world, gate);
        let e = world.entity(gate).unwrap();
        assert!(!e.is_solid);
        // Force modes keep the flag set while active
        assert!(e.is_activated);

        world.entity_mut(gate).unwrap().is_activated = false;
        update_entity(&mut world, gate);
        assert!(world.entity(gate).unwrap().is_solid);
    }

    #[test]
    fn test_panel_momentary_press_and_release() {
        let mut world = test_world();
        let panel = world.spawn(EntityKind::Panel, 3, 3, 0);
        {
            let e = world.entity_mut(panel).unwrap();
            e.action_type = 5;
            e.send_channel = 2;
        }
        let gate = world.spawn(EntityKind::Gate, 9, 9, 0);
        world.entity_mut(gate).unwrap().listen_channel = 2;
        let presser = world.spawn(EntityKind::Crate, 3, 3, 0);

        update_entity(&mut world, panel);
        assert!(world.entity(gate).unwrap().is_activated);

        // Held down: no re-fire, flag untouched
        world.entity_mut(gate).unwrap().is_activated = false;
        update_entity(&mut world, panel);
        assert!(!world.entity(gate).unwrap().is_activated);

        // Vacate: deactivates the channel
        world.entity_mut(gate).unwrap().is_activated = true;
        world.entity_mut(presser).unwrap().x = 4;
        update_entity(&mut world, panel);
        assert!(!world.entity(gate).unwrap().is_activated);
    }

    #[test]
    fn test_panel_latch_then_disable() {
        let mut world = test_world();
        let panel = world.spawn(EntityKind::Panel, 3, 3, 0);
        {
            let e = world.entity_mut(panel).unwrap();
            e.action_type = 7;
            e.send_channel = 2;
        }
        let gate = world.spawn(EntityKind::Gate, 9, 9, 0);
        world.entity_mut(gate).unwrap().listen_channel = 2;
        world.spawn(EntityKind::Actor, 3, 3, 0);

        update_entity(&mut world, panel);
        assert!(world.entity(gate).unwrap().is_activated);
        assert!(!world.entity(panel).unwrap().is_enabled);
    }

    #[test]
    fn test_auto_fires_once_and_rearms_on_disable() {
        let mut world = test_world();
        let auto = world.spawn(EntityKind::EAuto, 0, 0, 0);
        {
            let e = world.entity_mut(auto).unwrap();
            e.action_type = 5;
            e.send_channel = 4;
        }
        let gate = world.spawn(EntityKind::Gate, 9, 9, 0);
        world.entity_mut(gate).unwrap().listen_channel = 4;

        update_entity(&mut world, auto);
        assert!(world.entity(gate).unwrap().is_activated);

        world.entity_mut(gate).unwrap().is_activated = false;
        update_entity(&mut world, auto);
        assert!(!world.entity(gate).unwrap().is_activated);

        // Disable re-arms, enable fires again
        world.entity_mut(auto).unwrap().is_enabled = false;
        update_entity(&mut world, auto);
        world.entity_mut(auto).unwrap().is_enabled = true;
        update_entity(&mut world, auto);
        assert!(world.entity(gate).unwrap().is_activated);
    }

    #[test]
    fn test_turret_activation_fires_immediately() {
        let mut world = test_world();
        let turret = activated(&mut world, EntityKind::Turret, 5);
        world.entity_mut(turret).unwrap().direction = Direction::Right;

        update_entity(&mut world, turret);
        world.apply_commands();
        assert!(world
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Bullet && e.x == 1 && e.y == 0));
        assert!(!world.entity(turret).unwrap().is_activated);
    }

    #[test]
    fn test_turret_reload_countdown() {
        let mut world = test_world();
        let turret = world.spawn(EntityKind::Turret, 0, 0, 0);
        {
            let e = world.entity_mut(turret).unwrap();
            e.direction = Direction::Right;
            e.slot_int1 = 2;
            e.state = KindState::Turret { countdown: 2 };
        }

        update_entity(&mut world, turret);
        world.apply_commands();
        let count = |world: &WorldState| {
            world
                .entities
                .iter()
                .filter(|e| e.kind == EntityKind::Bullet)
                .count()
        };
        assert_eq!(count(&world), 0);

        update_entity(&mut world, turret);
        world.apply_commands();
        assert_eq!(count(&world), 1);

        // Countdown reset: next update does not fire
        update_entity(&mut world, turret);
        world.apply_commands();
        assert_eq!(count(&world), 1);
    }

    #[test]
    fn test_actuator_idle_release() {
        let mut world = test_world();
        let actuator = world.spawn(EntityKind::LaserActuator, 0, 0, 0);
        {
            let e = world.entity_mut(actuator).unwrap();
            e.action_type = 7;
            e.send_channel = 6;
            e.slot_int2 = 2;
            e.state = KindState::LaserActuator {
                hits: 0,
                idle: 0,
                lit: true,
            };
        }
        let gate = world.spawn(EntityKind::Gate, 9, 9, 0);
        {
            let e = world.entity_mut(gate).unwrap();
            e.listen_channel = 6;
            e.is_activated = true;
        }

        update_entity(&mut world, actuator);
        assert!(world.entity(gate).unwrap().is_activated);

        update_entity(&mut world, actuator);
        assert!(!world.entity(gate).unwrap().is_activated);
        match &world.entity(actuator).unwrap().state {
            KindState::LaserActuator { lit, idle, .. } => {
                assert!(!lit);
                assert_eq!(*idle, 0);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_spawner_creates_entity() {
        let mut world = test_world();
        let spawner = activated(&mut world, EntityKind::Spawner, 5 + EntityKind::Crate as i32);

        update_entity(&mut world, spawner);
        assert!(world
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Crate && e.x == 0 && e.y == 0));
        assert!(!world.entity(spawner).unwrap().is_activated);
    }

    #[test]
    fn test_crate_breaks_into_contents() {
        let mut world = test_world();
        let crate_id = activated(&mut world, EntityKind::Crate, 5 + EntityKind::Key as i32);

        update_entity(&mut world, crate_id);
        world.apply_commands();
        assert!(world.entity(crate_id).is_none());
        assert!(world
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Key && e.x == 0 && e.y == 0));
    }

    #[test]
    fn test_pusher_shoves_clear_solid() {
        let mut world = test_world();
        let pusher = activated(&mut world, EntityKind::EPusher, 5);
        world.entity_mut(pusher).unwrap().direction = Direction::Right;
        let wall = world.spawn(EntityKind::Wall, 1, 0, 0);

        update_entity(&mut world, pusher);
        let e = world.entity(wall).unwrap();
        assert_eq!((e.x, e.y), (2, 0));
    }

    #[test]
    fn test_pusher_blocked_destination() {
        let mut world = test_world();
        let pusher = activated(&mut world, EntityKind::EPusher, 5);
        world.entity_mut(pusher).unwrap().direction = Direction::Right;
        let wall = world.spawn(EntityKind::Wall, 1, 0, 0);
        world.spawn(EntityKind::Wall, 2, 0, 0);

        update_entity(&mut world, pusher);
        let e = world.entity(wall).unwrap();
        assert_eq!((e.x, e.y), (1, 0));
    }

    #[test]
    fn test_generic_action_takes_precedence() {
        let mut world = test_world();
        let gate = activated(&mut world, EntityKind::Gate, 1);
        assert!(world.entity(gate).unwrap().is_enabled);

        update_entity(&mut world, gate);
        let e = world.entity(gate).unwrap();
        assert!(!e.is_enabled);
        assert!(e.is_solid);
    }
}
