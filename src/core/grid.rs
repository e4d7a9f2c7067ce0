//! Grid Primitives
//!
//! Integer cell coordinates and the 8-way facing used by every entity.
//! The grid is y-down: `Up` is (0, -1), `Right` is (1, 0).

use serde::{Deserialize, Serialize};

/// 8-way facing direction.
///
/// Discriminants are stable: they feed the state hash and the level
/// format round-trips directions by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum Direction {
    Up = 0,
    UpRight = 1,
    Right = 2,
    DownRight = 3,
    #[default]
    Down = 4,
    DownLeft = 5,
    Left = 6,
    UpLeft = 7,
}

/// All directions in clockwise order starting from Up.
pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::Up,
    Direction::UpRight,
    Direction::Right,
    Direction::DownRight,
    Direction::Down,
    Direction::DownLeft,
    Direction::Left,
    Direction::UpLeft,
];

impl Direction {
    /// Cell delta (dx, dy) for one step in this direction.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::UpRight => (1, -1),
            Direction::Right => (1, 0),
            Direction::DownRight => (1, 1),
            Direction::Down => (0, 1),
            Direction::DownLeft => (-1, 1),
            Direction::Left => (-1, 0),
            Direction::UpLeft => (-1, -1),
        }
    }

    /// The opposite facing (180°).
    #[inline]
    pub const fn opposite(self) -> Direction {
        self.rotated(4)
    }

    /// One 45° step clockwise.
    #[inline]
    pub const fn cw45(self) -> Direction {
        self.rotated(1)
    }

    /// One 45° step counter-clockwise.
    #[inline]
    pub const fn ccw45(self) -> Direction {
        self.rotated(7)
    }

    /// 90° clockwise.
    #[inline]
    pub const fn cw90(self) -> Direction {
        self.rotated(2)
    }

    /// 90° counter-clockwise.
    #[inline]
    pub const fn ccw90(self) -> Direction {
        self.rotated(6)
    }

    /// Rotate clockwise by `steps` 45° increments.
    #[inline]
    pub const fn rotated(self, steps: u8) -> Direction {
        ALL_DIRECTIONS[((self as u8 + steps) % 8) as usize]
    }

    /// Whether this is one of the four cardinal directions.
    #[inline]
    pub const fn is_cardinal(self) -> bool {
        matches!(
            self,
            Direction::Up | Direction::Right | Direction::Down | Direction::Left
        )
    }

    /// Name used by the level record format.
    pub const fn name(self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::UpRight => "UpRight",
            Direction::Right => "Right",
            Direction::DownRight => "DownRight",
            Direction::Down => "Down",
            Direction::DownLeft => "DownLeft",
            Direction::Left => "Left",
            Direction::UpLeft => "UpLeft",
        }
    }

    /// Parse a level-format direction name.
    pub fn from_name(name: &str) -> Option<Direction> {
        match name {
            "Up" => Some(Direction::Up),
            "UpRight" => Some(Direction::UpRight),
            "Right" => Some(Direction::Right),
            "DownRight" => Some(Direction::DownRight),
            "Down" => Some(Direction::Down),
            "DownLeft" => Some(Direction::DownLeft),
            "Left" => Some(Direction::Left),
            "UpLeft" => Some(Direction::UpLeft),
            _ => None,
        }
    }
}

/// Step a cell coordinate one cell along a direction.
#[inline]
pub const fn step(x: i32, y: i32, dir: Direction) -> (i32, i32) {
    let (dx, dy) = dir.delta();
    (x + dx, y + dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite() {
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::UpRight.opposite(), Direction::DownLeft);
        for dir in ALL_DIRECTIONS {
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn test_rotation_steps() {
        assert_eq!(Direction::Up.cw45(), Direction::UpRight);
        assert_eq!(Direction::Up.ccw45(), Direction::UpLeft);
        assert_eq!(Direction::Left.cw90(), Direction::Up);
        assert_eq!(Direction::Up.ccw90(), Direction::Left);
        for dir in ALL_DIRECTIONS {
            assert_eq!(dir.cw45().ccw45(), dir);
            assert_eq!(dir.cw90().cw90(), dir.opposite());
        }
    }

    #[test]
    fn test_delta_cancels_with_opposite() {
        for dir in ALL_DIRECTIONS {
            let (dx, dy) = dir.delta();
            let (ox, oy) = dir.opposite().delta();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
    }

    #[test]
    fn test_name_round_trip() {
        for dir in ALL_DIRECTIONS {
            assert_eq!(Direction::from_name(dir.name()), Some(dir));
        }
        assert_eq!(Direction::from_name("Sideways"), None);
    }

    #[test]
    fn test_step() {
        assert_eq!(step(0, 0, Direction::Right), (1, 0));
        assert_eq!(step(3, 3, Direction::Up), (3, 2));
        assert_eq!(step(3, 3, Direction::DownLeft), (2, 4));
    }
}
