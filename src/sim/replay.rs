//! Replay Journal
//!
//! A recording is the full determinism contract in one value: the RNG
//! seed, the level text, and the intent sequence. Re-running it from a
//! fresh world must land on the same state hash, which is how desyncs
//! and regressions are caught.

use serde::{Deserialize, Serialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::sim::intent::Intent;
use crate::sim::level;
use crate::sim::tick;

/// Everything needed to reproduce a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// RNG seed the world was created with.
    pub seed: u64,

    /// Level text the world was loaded from.
    pub level_text: String,

    /// One intent per tick, in order.
    pub intents: Vec<Intent>,
}

impl Recording {
    /// Start an empty recording for a run.
    pub fn new(seed: u64, level_text: impl Into<String>) -> Self {
        Self {
            seed,
            level_text: level_text.into(),
            intents: Vec::new(),
        }
    }

    /// Append the intent fed to the next tick.
    pub fn push(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Content hash of the journal itself (not the resulting world).
    pub fn journal_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_journal();
        hasher.update_u64(self.seed);
        hasher.update_str(&self.level_text);
        hasher.update_u32(self.intents.len() as u32);
        for intent in &self.intents {
            match intent.direction {
                Some(direction) => hasher.update_u8(direction as u8 + 1),
                None => hasher.update_u8(0),
            }
        }
        hasher.finalize()
    }
}

/// Re-run a recording from scratch and return the final state hash.
pub fn replay(recording: &Recording) -> StateHash {
    let mut world = level::parse_level(&recording.level_text, recording.seed);
    for &intent in &recording.intents {
        tick::tick(&mut world, intent);
    }
    world.compute_hash()
}

// =============================================================================
// TESTS
// =============================================================================
