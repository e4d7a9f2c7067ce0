//! Simulation Events
//!
//! Fire-and-forget notifications crossing the boundary toward the
//! audio and renderer collaborators. The simulation never reads these
//! back; dropping them changes nothing about the next tick.

use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// Sound cue identifier.
///
/// The audio collaborator maps these to actual samples; the simulation
/// only names the occasion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SoundId {
    /// Successful step
    Step = 0,
    /// Move attempt blocked
    Bump = 1,
    /// Crate pushed
    Push = 2,
    /// Key picked up
    PickupKey = 3,
    /// Coin picked up
    PickupCoin = 4,
    /// Goal picked up
    PickupGoal = 5,
    /// Lock opened with a key
    Unlock = 6,
    /// Coin lock opened
    CoinUnlock = 7,
    /// Checkpoint captured
    Checkpoint = 8,
    /// Teleporter transfer
    Teleport = 9,
    /// Layer change via stairs
    Stairs = 10,
    /// Turret fired
    Shoot = 11,
    /// Bullet hit an actor
    Hit = 12,
    /// Bullet absorbed by a solid
    Absorb = 13,
    /// Bullet redirected by a mirror
    Bounce = 14,
    /// Activation channel fired
    Activate = 15,
    /// Crate broken open
    Break = 16,
    /// Entity spawned
    Spawn = 17,
    /// Rotate block turned its sub-grid
    Rotate = 18,
    /// Level won
    Win = 19,
    /// State reverted to checkpoint
    Revert = 20,
    /// State restarted from original
    Restart = 21,
}

/// One simulation event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Play a sound cue at a cell.
    Sound { sound: SoundId, x: i32, y: i32 },

    /// Actor took damage; renderer plays the hurt animation.
    Hurt { entity: EntityId },
}

impl SimEvent {
    /// Create a sound event at a cell.
    pub fn sound(sound: SoundId, x: i32, y: i32) -> Self {
        SimEvent::Sound { sound, x, y }
    }

    /// Create a hurt-animation event.
    pub fn hurt(entity: EntityId) -> Self {
        SimEvent::Hurt { entity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = SimEvent::sound(SoundId::Teleport, 3, 4);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Teleport"));

        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_hurt_round_trip() {
        let event = SimEvent::hurt(EntityId(7));
        let json = serde_json::to_string(&event).unwrap();
        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
