//! Tick Scheduler
//!
//! One `tick()` call runs the full phase sequence synchronously:
//!
//! 0. Intent: apply the optional movement direction to the controlled
//!    actor (every enabled live actor under `sync_actors`).
//! 1. Bullets: advance and resolve all projectiles.
//! 2. Periodic: a shared countdown gates belt conveyance, enemy bounce
//!    movement, and ice sliding. Moves are queued from a pre-phase
//!    snapshot and each entity moves at most one cell.
//! 3. Per-entity update in list order, then teleporter transfers.
//! 4. Actor validity: hand control to another live actor or revert.
//! 5. Win check.
//! 6. Step-limit check.
//! 7. Flag application: checkpoint capture first, then restart (which
//!    overrides revert), then revert.
//!
//! The scheduler is fully deterministic: identical seed, level, and
//! intent sequence produce identical state hashes.

use crate::core::grid::{self, Direction};
use crate::sim::behavior;
use crate::sim::bullet;
use crate::sim::entity::{EntityId, EntityKind};
use crate::sim::events::{SimEvent, SoundId};
use crate::sim::intent::Intent;
use crate::sim::movement;
use crate::sim::world::WorldState;

/// Outcome of one tick, for the outer collaborators.
#[derive(Clone, Debug, Default)]
pub struct TickResult {
    /// Audio and animation events generated this tick.
    pub events: Vec<SimEvent>,

    /// An actor reached a Finish cell with enough goals.
    pub won: bool,

    /// The world was restored to the last checkpoint.
    pub reverted: bool,

    /// The world was restored to its loaded state.
    pub restarted: bool,
}

/// Advance the world by one tick.
pub fn tick(world: &mut WorldState, intent: Intent) -> TickResult {
    apply_intent(world, intent);
    bullet::advance_bullets(world);
    world.apply_commands();
    run_periodic(world);
    update_entities(world);
    check_actor_validity(world);
    check_win(world);
    check_step_limit(world);
    let (won, reverted, restarted) = apply_flags(world);
    world.tick += 1;
    TickResult {
        events: world.take_events(),
        won,
        reverted,
        restarted,
    }
}

// =============================================================================
// PHASE 0: INTENT
// =============================================================================

fn apply_intent(world: &mut WorldState, intent: Intent) {
    let Some(direction) = intent.direction else {
        return;
    };

    if world.options.sync_actors {
        let actors: Vec<EntityId> = world
            .entities
            .iter()
            .filter(|e| WorldState::is_controllable(e))
            .map(|e| e.id)
            .collect();
        for id in actors {
            let moved = movement::try_move(world, id, direction).moved;
            if moved && world.controlled_actor == Some(id) {
                world.steps += 1;
            }
        }
        return;
    }

    let Some(id) = world.controlled_actor else {
        return;
    };
    if !world.entity(id).is_some_and(WorldState::is_controllable) {
        return;
    }
    if movement::try_move(world, id, direction).moved {
        world.steps += 1;
    }
}

// =============================================================================
// PHASE 2: PERIODIC MOVEMENT
// =============================================================================

fn run_periodic(world: &mut WorldState) {
    if world.countdown > 0 {
        world.countdown -= 1;
    }
    if world.countdown > 0 {
        return;
    }
    world.countdown = world.options.tick_period;

    // Shared across the three sub-phases: one cell per entity per tick.
    let mut moved: Vec<EntityId> = Vec::new();
    convey_belts(world, &mut moved);
    bounce_enemies(world, &mut moved);
    slide_ice(world, &mut moved);
}

/// Queue one conveyance per mover standing on an enabled belt, from a
/// snapshot taken before any of them apply.
fn convey_belts(world: &mut WorldState, moved: &mut Vec<EntityId>) {
    let mut queued: Vec<(EntityId, Direction)> = Vec::new();
    for belt in &world.entities {
        if belt.kind != EntityKind::Belt || !belt.is_enabled {
            continue;
        }
        for rider in &world.entities {
            if rider.kind.is_mover()
                && rider.is_enabled
                && rider.x == belt.x
                && rider.y == belt.y
                && rider.layer == belt.layer
            {
                queued.push((rider.id, belt.direction));
            }
        }
    }

    for (id, direction) in queued {
        if moved.contains(&id) {
            continue;
        }
        if movement::conveyed_move(world, id, direction).moved {
            moved.push(id);
        }
    }
}

/// Each enabled enemy advances one cell or, if blocked, reverses its
/// facing and hurts any actor it bounced into.
fn bounce_enemies(world: &mut WorldState, moved: &mut Vec<EntityId>) {
    let enemies: Vec<EntityId> = world
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Enemy && e.is_enabled)
        .map(|e| e.id)
        .collect();

    for id in enemies {
        if moved.contains(&id) {
            continue;
        }
        let Some(enemy) = world.entity(id) else {
            continue;
        };
        let direction = enemy.direction;
        let (x, y, layer) = (enemy.x, enemy.y, enemy.layer);

        if movement::try_move(world, id, direction).moved {
            moved.push(id);
            continue;
        }

        let (tx, ty) = grid::step(x, y, direction);
        let victims: Vec<EntityId> = world
            .entities
            .iter()
            .filter(|e| {
                e.kind == EntityKind::Actor
                    && e.is_enabled
                    && e.x == tx
                    && e.y == ty
                    && e.layer == layer
            })
            .map(|e| e.id)
            .collect();
        for victim in victims {
            if let Some(actor) = world.entity_mut(victim) {
                if actor.damage(1) {
                    world.push_event(SimEvent::hurt(victim));
                    world.push_event(SimEvent::sound(SoundId::Hit, tx, ty));
                }
            }
        }
        if let Some(enemy) = world.entity_mut(id) {
            enemy.direction = direction.opposite();
        }
    }
}

/// Movers resting on ice (and not riding a belt) keep sliding in their
/// last facing until blocked.
fn slide_ice(world: &mut WorldState, moved: &mut Vec<EntityId>) {
    let mut sliders: Vec<(EntityId, Direction)> = Vec::new();
    for rider in &world.entities {
        if !rider.kind.is_mover() || !rider.is_enabled {
            continue;
        }
        let mut on_ice = false;
        let mut on_belt = false;
        for tile in &world.entities {
            if !tile.is_enabled || tile.x != rider.x || tile.y != rider.y || tile.layer != rider.layer
            {
                continue;
            }
            match tile.kind {
                EntityKind::Ice => on_ice = true,
                EntityKind::Belt => on_belt = true,
                _ => {}
            }
        }
        if on_ice && !on_belt {
            sliders.push((rider.id, rider.direction));
        }
    }

    for (id, direction) in sliders {
        if moved.contains(&id) {
            continue;
        }
        if movement::conveyed_move(world, id, direction).moved {
            moved.push(id);
        }
    }
}

// =============================================================================
// PHASE 3: PER-ENTITY UPDATE
// =============================================================================

fn update_entities(world: &mut WorldState) {
    let ids: Vec<EntityId> = world.entities.iter().map(|e| e.id).collect();
    for id in ids {
        behavior::update_entity(world, id);
        world.apply_commands();
    }
    movement::teleport_transfers(world);
    world.apply_commands();
}

// =============================================================================
// PHASES 4-6: CHECKS
// =============================================================================

fn check_actor_validity(world: &mut WorldState) {
    if world.options.sync_death
        && world
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Actor && e.hp() == 0)
    {
        world.pending_revert = true;
    }

    if world
        .controlled_actor
        .and_then(|id| world.entity(id))
        .is_some_and(WorldState::is_controllable)
    {
        return;
    }
    match world.find_controllable() {
        Some(id) => world.controlled_actor = Some(id),
        None => world.pending_revert = true,
    }
}

fn check_win(world: &mut WorldState) {
    if world.goals < world.options.required_goals {
        return;
    }
    let on_finish = world.entities.iter().any(|actor| {
        actor.kind == EntityKind::Actor
            && WorldState::is_controllable(actor)
            && world.entities.iter().any(|finish| {
                finish.kind == EntityKind::Finish
                    && finish.is_enabled
                    && finish.x == actor.x
                    && finish.y == actor.y
                    && finish.layer == actor.layer
            })
    });
    if on_finish {
        world.pending_win = true;
    }
}

fn check_step_limit(world: &mut WorldState) {
    if world.options.max_steps > 0 && world.steps >= world.options.max_steps {
        world.pending_revert = true;
    }
}

// =============================================================================
// PHASE 7: FLAGS
// =============================================================================

/// Checkpoint capture runs first so a revert in the same tick restores
/// the checkpoint just taken. Restart overrides revert when both are
/// set.
fn apply_flags(world: &mut WorldState) -> (bool, bool, bool) {
    if world.pending_checkpoint {
        world.pending_checkpoint = false;
        world.capture_checkpoint();
    }

    let won = world.pending_win;
    world.pending_win = false;
    if won {
        let (x, y) = actor_position(world);
        world.push_event(SimEvent::sound(SoundId::Win, x, y));
    }

    let mut reverted = false;
    let mut restarted = false;
    if world.pending_restart {
        world.pending_restart = false;
        world.pending_revert = false;
        world.restart_from_original();
        let (x, y) = actor_position(world);
        world.push_event(SimEvent::sound(SoundId::Restart, x, y));
        restarted = true;
    } else if world.pending_revert {
        world.pending_revert = false;
        world.revert_to_checkpoint();
        let (x, y) = actor_position(world);
        world.push_event(SimEvent::sound(SoundId::Revert, x, y));
        reverted = true;
    }
    (won, reverted, restarted)
}

fn actor_position(world: &WorldState) -> (i32, i32) {
    world
        .controlled()
        .map(|actor| (actor.x, actor.y))
        .unwrap_or((0, 0))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::world::LevelOptions;

    fn options(tick_period: u32) -> LevelOptions {
        LevelOptions {
            tick_period,
            ..LevelOptions::default()
        }
    }

    fn world_with_actor(opts: LevelOptions) -> (WorldState, EntityId) {
        let mut world = WorldState::new(opts, 7);
        let actor = world.spawn(EntityKind::Actor, 0, 0, 0);
        world.capture_original();
        (world, actor)
    }

    #[test]
    fn test_intent_moves_and_counts_steps() {
        let (mut world, actor) = world_with_actor(options(4));

        tick(&mut world, Intent::step(Direction::Right));
        let e = world.entity(actor).unwrap();
        assert_eq!((e.x, e.y), (1, 0));
        assert_eq!(world.steps, 1);

        tick(&mut world, Intent::none());
        assert_eq!(world.steps, 1);
    }

    #[test]
    fn test_blocked_intent_counts_no_step() {
        let (mut world, actor) = world_with_actor(options(4));
        world.spawn(EntityKind::Wall, 1, 0, 0);

        tick(&mut world, Intent::step(Direction::Right));
        let e = world.entity(actor).unwrap();
        assert_eq!((e.x, e.y), (0, 0));
        assert_eq!(world.steps, 0);
    }

    #[test]
    fn test_sync_actors_move_together() {
        let mut opts = options(4);
        opts.sync_actors = true;
        let mut world = WorldState::new(opts, 7);
        let a = world.spawn(EntityKind::Actor, 0, 0, 0);
        let b = world.spawn(EntityKind::Actor, 5, 5, 0);
        world.capture_original();

        tick(&mut world, Intent::step(Direction::Down));
        assert_eq!(world.entity(a).unwrap().y, 1);
        assert_eq!(world.entity(b).unwrap().y, 6);
        // Only the controlled actor's move counts as a step
        assert_eq!(world.steps, 1);
    }

    #[test]
    fn test_belt_conveys_on_period_only() {
        let (mut world, actor) = world_with_actor(options(2));
        let belt = world.spawn(EntityKind::Belt, 0, 0, 0);
        world.entity_mut(belt).unwrap().direction = Direction::Right;

        tick(&mut world, Intent::none());
        assert_eq!(world.entity(actor).unwrap().x, 0);

        tick(&mut world, Intent::none());
        assert_eq!(world.entity(actor).unwrap().x, 1);
    }

    #[test]
    fn test_belt_chain_moves_one_cell_per_period() {
        let (mut world, actor) = world_with_actor(options(1));
        for x in 0..3 {
            let belt = world.spawn(EntityKind::Belt, x, 0, 0);
            world.entity_mut(belt).unwrap().direction = Direction::Right;
        }

        tick(&mut world, Intent::none());
        assert_eq!(world.entity(actor).unwrap().x, 1);
    }

    #[test]
    fn test_enemy_bounces_off_wall() {
        let (mut world, _) = world_with_actor(options(1));
        let enemy = world.spawn(EntityKind::Enemy, 5, 5, 0);
        world.entity_mut(enemy).unwrap().direction = Direction::Right;
        world.spawn(EntityKind::Wall, 6, 5, 0);

        tick(&mut world, Intent::none());
        let e = world.entity(enemy).unwrap();
        assert_eq!((e.x, e.y), (5, 5));
        assert_eq!(e.direction, Direction::Left);
    }

    #[test]
    fn test_enemy_hurts_actor_on_bounce() {
        let (mut world, actor) = world_with_actor(options(1));
        let enemy = world.spawn(EntityKind::Enemy, 1, 0, 0);
        world.entity_mut(enemy).unwrap().direction = Direction::Left;

        tick(&mut world, Intent::none());
        assert_eq!(world.entity(actor).unwrap().hp(), 2);
        assert_eq!(world.entity(enemy).unwrap().direction, Direction::Right);
    }

    #[test]
    fn test_ice_slides_mover() {
        let (mut world, actor) = world_with_actor(options(1));
        {
            let e = world.entity_mut(actor).unwrap();
            e.x = 2;
            e.direction = Direction::Right;
        }
        world.spawn(EntityKind::Ice, 2, 0, 0);

        tick(&mut world, Intent::none());
        assert_eq!(world.entity(actor).unwrap().x, 3);
    }

    #[test]
    fn test_win_requires_goals() {
        let mut opts = options(4);
        opts.required_goals = 1;
        let mut world = WorldState::new(opts, 7);
        world.spawn(EntityKind::Actor, 0, 0, 0);
        world.spawn(EntityKind::Finish, 0, 0, 0);
        world.capture_original();

        let result = tick(&mut world, Intent::none());
        assert!(!result.won);

        world.goals = 1;
        let result = tick(&mut world, Intent::none());
        assert!(result.won);
    }

    #[test]
    fn test_step_limit_reverts() {
        let mut opts = options(4);
        opts.max_steps = 1;
        let mut world = WorldState::new(opts, 7);
        let actor = world.spawn(EntityKind::Actor, 0, 0, 0);
        world.capture_original();

        let result = tick(&mut world, Intent::step(Direction::Right));
        assert!(result.reverted);
        let e = world.entity(actor).unwrap();
        assert_eq!((e.x, e.y), (0, 0));
        assert_eq!(world.steps, 0);
    }

    #[test]
    fn test_dead_controlled_actor_hands_over() {
        let mut world = WorldState::new(options(4), 7);
        let a = world.spawn(EntityKind::Actor, 0, 0, 0);
        let b = world.spawn(EntityKind::Actor, 5, 5, 0);
        world.capture_original();
        assert_eq!(world.controlled_actor, Some(a));

        world.entity_mut(a).unwrap().damage(3);
        tick(&mut world, Intent::none());
        assert_eq!(world.controlled_actor, Some(b));
    }

    #[test]
    fn test_no_live_actor_reverts() {
        let (mut world, actor) = world_with_actor(options(4));
        world.entity_mut(actor).unwrap().damage(3);

        let result = tick(&mut world, Intent::none());
        assert!(result.reverted);
        assert_eq!(world.entity(actor).unwrap().hp(), 3);
    }

    #[test]
    fn test_sync_death_reverts_on_any_actor_death() {
        let mut opts = options(4);
        opts.sync_death = true;
        let mut world = WorldState::new(opts, 7);
        world.spawn(EntityKind::Actor, 0, 0, 0);
        let other = world.spawn(EntityKind::Actor, 5, 5, 0);
        world.capture_original();

        world.entity_mut(other).unwrap().damage(3);
        let result = tick(&mut world, Intent::none());
        assert!(result.reverted);
        assert_eq!(world.entity(other).unwrap().hp(), 3);
    }

    #[test]
    fn test_restart_overrides_revert() {
        let (mut world, actor) = world_with_actor(options(4));
        tick(&mut world, Intent::step(Direction::Right));
        world.capture_checkpoint();
        tick(&mut world, Intent::step(Direction::Right));
        assert_eq!(world.entity(actor).unwrap().x, 2);

        world.pending_revert = true;
        world.pending_restart = true;
        let result = tick(&mut world, Intent::none());
        assert!(result.restarted);
        assert!(!result.reverted);
        assert_eq!(world.entity(actor).unwrap().x, 0);
    }

    #[test]
    fn test_checkpoint_captured_on_touch() {
        let (mut world, actor) = world_with_actor(options(4));
        world.spawn(EntityKind::Checkpoint, 1, 0, 0);
        tick(&mut world, Intent::step(Direction::Right));
        tick(&mut world, Intent::step(Direction::Right));

        world.pending_revert = true;
        tick(&mut world, Intent::none());
        // Revert lands on the checkpoint cell, not the level start
        assert_eq!(world.entity(actor).unwrap().x, 1);
    }

    #[test]
    fn test_tick_advances_counter() {
        let (mut world, _) = world_with_actor(options(4));
        tick(&mut world, Intent::none());
        tick(&mut world, Intent::none());
        assert_eq!(world.tick, 2);
    }

    #[test]
    fn test_identical_runs_hash_identically() {
        let run = || {
            let mut world = WorldState::new(options(2), 99);
            world.spawn(EntityKind::Actor, 0, 0, 0);
            world.spawn(EntityKind::Wall, 4, 0, 0);
            let belt = world.spawn(EntityKind::Belt, 2, 0, 0);
            world.entity_mut(belt).unwrap().direction = Direction::Right;
            world.capture_original();

            for direction in [Direction::Right, Direction::Down, Direction::Right] {
                tick(&mut world, Intent::step(direction));
                tick(&mut world, Intent::none());
            }
            world.compute_hash()
        };
        assert_eq!(run(), run());
    }
}
