//! Entity Model
//!
//! Every object on the grid is an `Entity`: one value type holding
//! identity, position, the shared behavior slots, and a `KindState`
//! tagged union for per-kind transient data. Kind-specific behavior
//! lives in the simulation modules, not in subtypes.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fixed;
use crate::core::grid::Direction;
use crate::core::hash::StateHasher;

// =============================================================================
// ENTITY ID
// =============================================================================

/// Unique entity identifier (monotonic counter within a world).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Raw counter value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// =============================================================================
// ENTITY KIND
// =============================================================================

/// Kind of grid entity.
///
/// Discriminants are the level-format enum values and feed the state
/// hash; they must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum EntityKind {
    /// Walkable ground tile
    Floor = 0,
    /// Immovable solid
    Wall = 1,
    /// Non-interacting scenery; safe fallback for unknown kind values
    #[default]
    Decor = 2,
    /// Player-controllable mover
    Actor = 3,
    /// Pushable box
    Crate = 4,
    /// Patrolling hazard, bounces between obstacles
    Enemy = 5,
    /// Conveyor tile, carries movers on the periodic phase
    Belt = 6,
    /// Slippery tile, movers keep sliding until blocked
    Ice = 7,
    /// One-way or two-way passage
    MultiWay = 8,
    /// Channel-controlled door
    Gate = 9,
    /// Consumes a matching key to open
    Lock = 10,
    /// Opens for a coin balance
    CoinLock = 11,
    /// Colored key pickup
    Key = 12,
    /// Currency pickup
    Coin = 13,
    /// Objective pickup, counts toward the win condition
    Goal = 14,
    /// Exit tile
    Finish = 15,
    /// Revert point, captured on first touch
    Checkpoint = 16,
    /// Layer transition
    Stairs = 17,
    /// Channel-paired transporter
    Teleporter = 18,
    /// Bullet emitter
    Turret = 19,
    /// Turret projectile
    Bullet = 20,
    /// Redirects bullets 90 degrees
    Mirror = 21,
    /// Counts received bullets and fires a channel
    LaserActuator = 22,
    /// Creates entities on activation
    Spawner = 23,
    /// Transforms after a fixed number of pass-overs
    Filter = 24,
    /// Rotates an NxN sub-grid of entities
    Rotate = 25,
    /// Occupancy-triggered pressure plate
    Panel = 26,
    /// Edge-triggered floor switch
    Click = 27,
    /// Fires its channel once on its own
    EAuto = 28,
    /// Shoves adjacent solids forward on activation
    EPusher = 29,
}

impl EntityKind {
    /// Get kind from a level-format index.
    ///
    /// Unknown values fall back to `Decor` so a level authored against
    /// a newer kind catalogue still loads.
    pub fn from_index(index: i32) -> EntityKind {
        match index {
            0 => EntityKind::Floor,
            1 => EntityKind::Wall,
            2 => EntityKind::Decor,
            3 => EntityKind::Actor,
            4 => EntityKind::Crate,
            5 => EntityKind::Enemy,
            6 => EntityKind::Belt,
            7 => EntityKind::Ice,
            8 => EntityKind::MultiWay,
            9 => EntityKind::Gate,
            10 => EntityKind::Lock,
            11 => EntityKind::CoinLock,
            12 => EntityKind::Key,
            13 => EntityKind::Coin,
            14 => EntityKind::Goal,
            15 => EntityKind::Finish,
            16 => EntityKind::Checkpoint,
            17 => EntityKind::Stairs,
            18 => EntityKind::Teleporter,
            19 => EntityKind::Turret,
            20 => EntityKind::Bullet,
            21 => EntityKind::Mirror,
            22 => EntityKind::LaserActuator,
            23 => EntityKind::Spawner,
            24 => EntityKind::Filter,
            25 => EntityKind::Rotate,
            26 => EntityKind::Panel,
            27 => EntityKind::Click,
            28 => EntityKind::EAuto,
            29 => EntityKind::EPusher,
            _ => EntityKind::Decor,
        }
    }

    /// Default solidity for a freshly placed entity of this kind.
    pub fn default_solid(self) -> bool {
        matches!(
            self,
            EntityKind::Wall
                | EntityKind::Actor
                | EntityKind::Crate
                | EntityKind::Enemy
                | EntityKind::MultiWay
                | EntityKind::Gate
                | EntityKind::Lock
                | EntityKind::CoinLock
                | EntityKind::Turret
                | EntityKind::Mirror
                | EntityKind::LaserActuator
                | EntityKind::EPusher
        )
    }

    /// Default decor flag: purely visual, never participates in rules.
    pub fn default_decor(self) -> bool {
        matches!(self, EntityKind::Floor | EntityKind::Decor)
    }

    /// Whether this kind moves under its own rules (conveyance, bounce,
    /// slide, stairs, teleport all apply to movers only).
    pub fn is_mover(self) -> bool {
        matches!(
            self,
            EntityKind::Actor | EntityKind::Crate | EntityKind::Enemy
        )
    }
}

// =============================================================================
// KIND STATE
// =============================================================================

/// Per-kind transient state.
///
/// Most kinds carry no transient data (`KindState::None`); the ones
/// that do get a dedicated variant so the shared `Entity` struct stays
/// flat and clonable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum KindState {
    /// No per-kind data.
    #[default]
    None,

    /// Actor: health, held keys (color codes), step/animation counters.
    Actor {
        hp: i32,
        keys: Vec<i32>,
        steps_taken: u32,
        anim_step: u32,
    },

    /// Bullet: sub-cell position and speed in fixed-point, plus the
    /// mirrors already bounced off (each mirror redirects once).
    Bullet {
        fx: Fixed,
        fy: Fixed,
        speed: Fixed,
        visited_mirrors: Vec<EntityId>,
    },

    /// Turret: ticks until the next periodic shot.
    Turret { countdown: i32 },

    /// Panel / Click / EAuto trigger latch.
    Latch { armed: bool, fired: bool },

    /// LaserActuator: bullet-count state machine.
    LaserActuator { hits: i32, idle: i32, lit: bool },

    /// Rotate block: the sub-grid anchor captured at spawn.
    Rotate { anchor_x: i32, anchor_y: i32 },

    /// Filter: remaining passes before the transform fires.
    Filter { passes_left: i32 },

    /// Checkpoint: first touch only.
    Checkpoint { used: bool },
}

impl KindState {
    /// Default actor health.
    pub const ACTOR_HP: i32 = 3;

    /// Default bullet speed: half a cell per tick.
    pub const BULLET_SPEED: Fixed = crate::core::fixed::FIXED_HALF;

    /// Initial state for a freshly placed entity.
    ///
    /// `slot_int1` seeds the kinds whose starting counter comes from the
    /// level record (turret reload, filter pass count).
    pub fn initial(kind: EntityKind, x: i32, y: i32, slot_int1: i32) -> KindState {
        match kind {
            EntityKind::Actor => KindState::Actor {
                hp: Self::ACTOR_HP,
                keys: Vec::new(),
                steps_taken: 0,
                anim_step: 0,
            },
            EntityKind::Bullet => KindState::Bullet {
                fx: crate::core::fixed::from_cell(x),
                fy: crate::core::fixed::from_cell(y),
                speed: Self::BULLET_SPEED,
                visited_mirrors: Vec::new(),
            },
            EntityKind::Turret => KindState::Turret {
                countdown: slot_int1.max(0),
            },
            EntityKind::Panel | EntityKind::Click | EntityKind::EAuto => KindState::Latch {
                armed: true,
                fired: false,
            },
            EntityKind::LaserActuator => KindState::LaserActuator {
                hits: 0,
                idle: 0,
                lit: false,
            },
            EntityKind::Rotate => KindState::Rotate {
                anchor_x: x,
                anchor_y: y,
            },
            EntityKind::Filter => KindState::Filter {
                passes_left: slot_int1.max(0),
            },
            EntityKind::Checkpoint => KindState::Checkpoint { used: false },
            _ => KindState::None,
        }
    }

    /// Stable tag for hashing.
    fn tag(&self) -> u8 {
        match self {
            KindState::None => 0,
            KindState::Actor { .. } => 1,
            KindState::Bullet { .. } => 2,
            KindState::Turret { .. } => 3,
            KindState::Latch { .. } => 4,
            KindState::LaserActuator { .. } => 5,
            KindState::Rotate { .. } => 6,
            KindState::Filter { .. } => 7,
            KindState::Checkpoint { .. } => 8,
        }
    }

    /// Hash this state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.tag());
        match self {
            KindState::None => {}
            KindState::Actor {
                hp,
                keys,
                steps_taken,
                anim_step,
            } => {
                hasher.update_i32(*hp);
                hasher.update_u32(keys.len() as u32);
                for key in keys {
                    hasher.update_i32(*key);
                }
                hasher.update_u32(*steps_taken);
                hasher.update_u32(*anim_step);
            }
            KindState::Bullet {
                fx,
                fy,
                speed,
                visited_mirrors,
            } => {
                hasher.update_fixed(*fx);
                hasher.update_fixed(*fy);
                hasher.update_fixed(*speed);
                hasher.update_u32(visited_mirrors.len() as u32);
                for id in visited_mirrors {
                    hasher.update_u32(id.raw());
                }
            }
            KindState::Turret { countdown } => hasher.update_i32(*countdown),
            KindState::Latch { armed, fired } => {
                hasher.update_bool(*armed);
                hasher.update_bool(*fired);
            }
            KindState::LaserActuator { hits, idle, lit } => {
                hasher.update_i32(*hits);
                hasher.update_i32(*idle);
                hasher.update_bool(*lit);
            }
            KindState::Rotate { anchor_x, anchor_y } => {
                hasher.update_i32(*anchor_x);
                hasher.update_i32(*anchor_y);
            }
            KindState::Filter { passes_left } => hasher.update_i32(*passes_left),
            KindState::Checkpoint { used } => hasher.update_bool(*used),
        }
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// One object on the grid.
///
/// Cell sharing is legal: any number of entities may occupy the same
/// cell/layer. Solidity and per-kind rules decide movement legality,
/// not grid exclusivity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique ID (monotonic within a world)
    pub id: EntityId,

    /// Kind of entity
    pub kind: EntityKind,

    /// Cell x coordinate
    pub x: i32,

    /// Cell y coordinate
    pub y: i32,

    /// Grid layer
    pub layer: i32,

    /// 8-way facing
    pub direction: Direction,

    /// Blocks movers when enabled
    pub is_solid: bool,

    /// Disabled entities are inert for every rule
    pub is_enabled: bool,

    /// Renderer hint only, toggled by generic action 0
    pub is_visible: bool,

    /// Purely visual; always enterable
    pub is_decor: bool,

    /// Set by the activation system, consumed by the per-entity update
    pub is_activated: bool,

    /// Channel this entity listens on (< 0 = none)
    pub listen_channel: i32,

    /// Channel this entity fires (< 0 = none)
    pub send_channel: i32,

    /// What activation does to this entity (0-4 generic, >= 5 per-kind)
    pub action_type: i32,

    /// Kind-specific parameter slot
    pub slot_int1: i32,

    /// Kind-specific parameter slot
    pub slot_int2: i32,

    /// Kind-specific string slot
    pub slot_string: String,

    /// Per-kind transient state
    pub state: KindState,
}

impl Entity {
    /// Create a new entity with kind defaults.
    pub fn new(id: EntityId, kind: EntityKind, x: i32, y: i32, layer: i32) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            layer,
            direction: Direction::Down,
            is_solid: kind.default_solid(),
            is_enabled: true,
            is_visible: true,
            is_decor: kind.default_decor(),
            is_activated: false,
            listen_channel: -1,
            send_channel: -1,
            action_type: 0,
            slot_int1: 0,
            slot_int2: 0,
            slot_string: String::new(),
            state: KindState::initial(kind, x, y, 0),
        }
    }

    /// Whether this entity currently blocks movers into its cell.
    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.is_enabled && self.is_solid && !self.is_decor
    }

    /// Whether this entity occupies the given cell.
    #[inline]
    pub fn at(&self, x: i32, y: i32, layer: i32) -> bool {
        self.x == x && self.y == y && self.layer == layer
    }

    /// Actor health, 0 for non-actors.
    pub fn hp(&self) -> i32 {
        match &self.state {
            KindState::Actor { hp, .. } => *hp,
            _ => 0,
        }
    }

    /// Apply damage to an actor. Returns true if the hit landed.
    pub fn damage(&mut self, amount: i32) -> bool {
        if let KindState::Actor { hp, .. } = &mut self.state {
            *hp = (*hp - amount).max(0);
            true
        } else {
            false
        }
    }

    /// Whether an actor holds a key of the given color.
    pub fn has_key(&self, color: i32) -> bool {
        match &self.state {
            KindState::Actor { keys, .. } => keys.contains(&color),
            _ => false,
        }
    }

    /// Remove one key of the given color. Returns true if one was held.
    pub fn take_key(&mut self, color: i32) -> bool {
        if let KindState::Actor { keys, .. } = &mut self.state {
            if let Some(pos) = keys.iter().position(|k| *k == color) {
                keys.remove(pos);
                return true;
            }
        }
        false
    }

    /// Add a key of the given color to an actor.
    pub fn add_key(&mut self, color: i32) {
        if let KindState::Actor { keys, .. } = &mut self.state {
            keys.push(color);
        }
    }

    /// Hash this entity's full state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.raw());
        hasher.update_u8(self.kind as u8);
        hasher.update_i32(self.x);
        hasher.update_i32(self.y);
        hasher.update_i32(self.layer);
        hasher.update_u8(self.direction as u8);
        hasher.update_bool(self.is_solid);
        hasher.update_bool(self.is_enabled);
        hasher.update_bool(self.is_visible);
        hasher.update_bool(self.is_decor);
        hasher.update_bool(self.is_activated);
        hasher.update_i32(self.listen_channel);
        hasher.update_i32(self.send_channel);
        hasher.update_i32(self.action_type);
        hasher.update_i32(self.slot_int1);
        hasher.update_i32(self.slot_int2);
        hasher.update_str(&self.slot_string);
        self.state.hash_into(hasher);
    }
}

// =============================================================================
// TESTS
// =============================================================================
