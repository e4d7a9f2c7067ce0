//! Activation System
//!
//! Channel-based signal dispatch. A sender names a channel; every
//! entity listening on that channel gets its `is_activated` flag set,
//! cleared, or toggled. What activation *means* is the listener's
//! business, resolved in the per-entity phase: generic actions 0-4
//! here, kind-specific actions in `behavior`.

use crate::sim::entity::EntityId;
use crate::sim::events::{SimEvent, SoundId};
use crate::sim::world::WorldState;

/// What a signal does to the listeners' activation flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationMode {
    /// Set `is_activated`.
    Activate,
    /// Clear `is_activated`.
    Deactivate,
    /// Flip `is_activated`.
    Toggle,
}

/// Fire a signal on a channel.
///
/// Affects every enabled entity with `listen_channel == channel`,
/// optionally restricted to one layer. Emits a single audio event only
/// when at least one listener was affected. Negative channels never
/// match anything.
pub fn activate(
    world: &mut WorldState,
    channel: i32,
    layer_filter: Option<i32>,
    mode: ActivationMode,
) -> usize {
    if channel < 0 {
        return 0;
    }

    let mut affected = 0;
    let mut cue_at = None;
    for entity in &mut world.entities {
        if entity.listen_channel != channel || !entity.is_enabled {
            continue;
        }
        if let Some(layer) = layer_filter {
            if entity.layer != layer {
                continue;
            }
        }
        entity.is_activated = match mode {
            ActivationMode::Activate => true,
            ActivationMode::Deactivate => false,
            ActivationMode::Toggle => !entity.is_activated,
        };
        if cue_at.is_none() {
            cue_at = Some((entity.x, entity.y));
        }
        affected += 1;
    }

    if let Some((x, y)) = cue_at {
        world.push_event(SimEvent::sound(SoundId::Activate, x, y));
    }
    affected
}

/// Fire a sender's `send_channel` with its same-layer filter applied.
///
/// A nonzero `slot_int2` on the sender restricts the signal to the
/// sender's own layer.
pub fn fire_send_channel(world: &mut WorldState, sender: EntityId, mode: ActivationMode) -> usize {
    let Some(entity) = world.entity(sender) else {
        return 0;
    };
    let channel = entity.send_channel;
    let layer_filter = (entity.slot_int2 != 0).then_some(entity.layer);
    activate(world, channel, layer_filter, mode)
}

/// Handle the generic activation actions (0-4).
///
/// Returns true when the entity's `action_type` was generic and has
/// been fully handled, including clearing `is_activated`. Kind-specific
/// actions (>= 5) are left for the behavior dispatch.
pub fn handle_generic_action(world: &mut WorldState, id: EntityId) -> bool {
    let Some(entity) = world.entity_mut(id) else {
        return true;
    };
    if !entity.is_activated {
        return false;
    }

    match entity.action_type {
        0 => {
            entity.is_visible = !entity.is_visible;
            entity.is_activated = false;
            true
        }
        1 => {
            entity.is_enabled = !entity.is_enabled;
            entity.is_activated = false;
            true
        }
        2 => {
            entity.direction = entity.direction.cw45();
            entity.is_activated = false;
            true
        }
        3 => {
            entity.direction = entity.direction.ccw45();
            entity.is_activated = false;
            true
        }
        4 => {
            entity.is_activated = false;
            world.queue_remove(id);
            true
        }
        _ => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::sim::entity::EntityKind;
    use crate::sim::world::{LevelOptions, WorldState};

    fn test_world() -> WorldState {
        WorldState::new(LevelOptions::default(), 0)
    }

    fn listener(world: &mut WorldState, channel: i32, layer: i32) -> EntityId {
        let id = world.spawn(EntityKind::Gate, 0, 0, layer);
        let entity = world.entity_mut(id).unwrap();
        entity.listen_channel = channel;
        id
    }

    #[test]
    fn test_activate_sets_flag() {
        let mut world = test_world();
        let a = listener(&mut world, 3, 0);
        let b = listener(&mut world, 3, 0);
        let other = listener(&mut world, 4, 0);

        let affected = activate(&mut world, 3, None, ActivationMode::Activate);
        assert_eq!(affected, 2);
        assert!(world.entity(a).unwrap().is_activated);
        assert!(world.entity(b).unwrap().is_activated);
        assert!(!world.entity(other).unwrap().is_activated);
    }

    #[test]
    fn test_toggle_flips_each_listener() {
        let mut world = test_world();
        let a = listener(&mut world, 1, 0);
        let b = listener(&mut world, 1, 0);
        world.entity_mut(a).unwrap().is_activated = true;

        activate(&mut world, 1, None, ActivationMode::Toggle);
        assert!(!world.entity(a).unwrap().is_activated);
        assert!(world.entity(b).unwrap().is_activated);
    }

    #[test]
    fn test_layer_filter() {
        let mut world = test_world();
        let ground = listener(&mut world, 2, 0);
        let upper = listener(&mut world, 2, 1);

        activate(&mut world, 2, Some(1), ActivationMode::Activate);
        assert!(!world.entity(ground).unwrap().is_activated);
        assert!(world.entity(upper).unwrap().is_activated);
    }

    #[test]
    fn test_disabled_listener_ignored() {
        let mut world = test_world();
        let a = listener(&mut world, 5, 0);
        world.entity_mut(a).unwrap().is_enabled = false;

        let affected = activate(&mut world, 5, None, ActivationMode::Activate);
        assert_eq!(affected, 0);
        assert!(!world.entity(a).unwrap().is_activated);
    }

    #[test]
    fn test_negative_channel_never_matches() {
        let mut world = test_world();
        let a = listener(&mut world, -1, 0);

        let affected = activate(&mut world, -1, None, ActivationMode::Activate);
        assert_eq!(affected, 0);
        assert!(!world.entity(a).unwrap().is_activated);
    }

    #[test]
    fn test_event_only_when_nonempty() {
        let mut world = test_world();
        listener(&mut world, 1, 0);

        activate(&mut world, 9, None, ActivationMode::Activate);
        assert!(world.take_events().is_empty());

        activate(&mut world, 1, None, ActivationMode::Activate);
        assert_eq!(world.take_events().len(), 1);
    }

    #[test]
    fn test_send_channel_same_layer_slot() {
        let mut world = test_world();
        let sender = world.spawn(EntityKind::Click, 0, 0, 1);
        {
            let e = world.entity_mut(sender).unwrap();
            e.send_channel = 7;
            e.slot_int2 = 1;
        }
        let same = listener(&mut world, 7, 1);
        let other = listener(&mut world, 7, 0);

        fire_send_channel(&mut world, sender, ActivationMode::Activate);
        assert!(world.entity(same).unwrap().is_activated);
        assert!(!world.entity(other).unwrap().is_activated);
    }

    #[test]
    fn test_generic_actions() {
        let mut world = test_world();
        let id = listener(&mut world, 1, 0);

        // Action 1: toggle enabled
        {
            let e = world.entity_mut(id).unwrap();
            e.action_type = 1;
            e.is_activated = true;
        }
        assert!(handle_generic_action(&mut world, id));
        let e = world.entity(id).unwrap();
        assert!(!e.is_enabled);
        assert!(!e.is_activated);

        // Action 2: rotate facing one step clockwise
        {
            let e = world.entity_mut(id).unwrap();
            e.action_type = 2;
            e.direction = Direction::Up;
            e.is_activated = true;
        }
        assert!(handle_generic_action(&mut world, id));
        assert_eq!(world.entity(id).unwrap().direction, Direction::UpRight);
    }

    #[test]
    fn test_generic_delete_goes_through_queue() {
        let mut world = test_world();
        let id = listener(&mut world, 1, 0);
        {
            let e = world.entity_mut(id).unwrap();
            e.action_type = 4;
            e.is_activated = true;
        }
        assert!(handle_generic_action(&mut world, id));
        // Still present until commands apply
        assert!(world.entity(id).is_some());
        world.apply_commands();
        assert!(world.entity(id).is_none());
    }

    #[test]
    fn test_kind_specific_action_left_alone() {
        let mut world = test_world();
        let id = listener(&mut world, 1, 0);
        {
            let e = world.entity_mut(id).unwrap();
            e.action_type = 5;
            e.is_activated = true;
        }
        assert!(!handle_generic_action(&mut world, id));
        assert!(world.entity(id).unwrap().is_activated);
    }
}
