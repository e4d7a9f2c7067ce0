//! Simulation Module
//!
//! The whole puzzle simulation. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `entity`: Entity kinds, per-kind state, the flat entity struct
//! - `world`: World state, snapshots, the deferred command queue
//! - `intent`: Per-tick player input
//! - `events`: Audio and animation events for the outer collaborators
//! - `activation`: Channel-based signal dispatch
//! - `movement`: Movement resolution, pushing, teleporters, rotation
//! - `bullet`: Projectile travel, mirrors, actuators
//! - `behavior`: Per-kind update dispatch (timers, latches, spawners)
//! - `tick`: The phase scheduler
//! - `level`: Text level format load/save
//! - `replay`: Recorded runs and replay verification

pub mod activation;
pub mod behavior;
pub mod bullet;
pub mod entity;
pub mod events;
pub mod intent;
pub mod level;
pub mod movement;
pub mod replay;
pub mod tick;
pub mod world;

// Re-export key types
pub use entity::{Entity, EntityId, EntityKind, KindState};
pub use events::{SimEvent, SoundId};
pub use intent::Intent;
pub use level::{load_level, parse_level, save_level, serialize_level, LevelError};
pub use replay::{replay, Recording};
pub use tick::{tick, TickResult};
pub use world::{LevelOptions, WorldState};
