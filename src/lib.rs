//! # Gridlock Simulation Core
//!
//! Deterministic tick-based simulation for a multi-layer tile-grid
//! puzzle game, designed so recorded runs replay bit-identically.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GRIDLOCK SIM CORE                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── grid.rs     - 8-way directions and cell stepping        │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  sim/            - Puzzle logic (deterministic)              │
//! │  ├── entity.rs   - Entity kinds and per-kind state           │
//! │  ├── world.rs    - World state, snapshots, commands          │
//! │  ├── activation.rs - Channel signal dispatch                 │
//! │  ├── movement.rs - Movement, pushing, teleport, rotation     │
//! │  ├── bullet.rs   - Projectiles, mirrors, actuators           │
//! │  ├── behavior.rs - Per-kind update dispatch                  │
//! │  ├── tick.rs     - Phase scheduler                           │
//! │  ├── level.rs    - Text level format                         │
//! │  └── replay.rs   - Recorded runs and verification            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Every module is **100% deterministic**:
//! - No floating-point arithmetic in simulation logic
//! - No HashMap iteration (entities live in an ordered `Vec`)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+
//!
//! Given an identical seed, level, and intent sequence, the simulation
//! produces **identical state hashes** on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod sim;

// Re-export commonly used types
pub use crate::core::fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE};
pub use crate::core::grid::Direction;
pub use crate::core::rng::DeterministicRng;
pub use crate::sim::intent::Intent;
pub use crate::sim::tick::{tick, TickResult};
pub use crate::sim::world::{LevelOptions, WorldState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
