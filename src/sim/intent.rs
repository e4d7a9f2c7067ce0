//! Movement Intent
//!
//! The input collaborator hands the scheduler at most one movement
//! direction per tick. Everything else the player can do (revert,
//! restart) arrives through world flags, not through intent.

use serde::{Deserialize, Serialize};

use crate::core::grid::Direction;

/// Per-tick input to the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Requested movement direction, if any.
    pub direction: Option<Direction>,
}

impl Intent {
    /// No input this tick.
    pub const fn none() -> Self {
        Self { direction: None }
    }

    /// Move in the given direction this tick.
    pub const fn step(direction: Direction) -> Self {
        Self {
            direction: Some(direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_none() {
        assert_eq!(Intent::default(), Intent::none());
    }

    #[test]
    fn test_step_carries_direction() {
        let intent = Intent::step(Direction::Left);
        assert_eq!(intent.direction, Some(Direction::Left));
    }
}
