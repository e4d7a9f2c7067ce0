//! Core deterministic primitives.
//!
//! All types in this module are designed for perfect cross-platform determinism.
//! They form the foundation for replay verification.

pub mod fixed;
pub mod grid;
pub mod hash;
pub mod rng;

// Re-export core types
pub use fixed::{Fixed, FIXED_HALF, FIXED_ONE, FIXED_SCALE};
pub use grid::{Direction, ALL_DIRECTIONS};
pub use hash::compute_state_hash;
pub use rng::DeterministicRng;
