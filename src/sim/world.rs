//! World State
//!
//! The complete simulation state: the entity list, counters, level
//! options, the deferred command queue, and the two owned snapshots
//! (original and checkpoint) backing restart and revert.
//!
//! Entity order in the list is significant only for draw depth and the
//! teleporter "drawn above" rule; all other iteration is order-stable
//! by construction (a plain `Vec`, never a HashMap).

use serde::{Deserialize, Serialize};

use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::core::rng::DeterministicRng;
use crate::sim::entity::{Entity, EntityId, EntityKind, KindState};
use crate::sim::events::SimEvent;

// =============================================================================
// LEVEL OPTIONS
// =============================================================================

/// Per-level tuning parsed from the `ops` record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOptions {
    /// Ticks between periodic phases (belts, enemies, ice). 0 = every tick.
    pub tick_period: u32,

    /// Campaign link to the next level (opaque to the simulation).
    pub next_level_link: String,

    /// Step budget; 0 = unlimited.
    pub max_steps: u32,

    /// Goals needed before a Finish cell wins.
    pub required_goals: u32,

    /// Movement intent drives every enabled live actor, not just the
    /// controlled one.
    pub sync_actors: bool,

    /// Any actor death reverts the level.
    pub sync_death: bool,
}

impl Default for LevelOptions {
    fn default() -> Self {
        Self {
            tick_period: 4,
            next_level_link: String::new(),
            max_steps: 0,
            required_goals: 0,
            sync_actors: false,
            sync_death: false,
        }
    }
}

// =============================================================================
// DEFERRED COMMANDS
// =============================================================================

/// Structural mutation deferred until between phases.
///
/// Spawns and removals requested while iterating the entity list are
/// queued here and applied by `apply_commands`, so an in-progress
/// iteration is never invalidated.
#[derive(Clone, Debug)]
pub enum Command {
    /// Add a fully built entity.
    Spawn(Entity),
    /// Remove by ID (ignored if already gone).
    Remove(EntityId),
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Deep copy of the working state for restart/revert.
///
/// Includes the RNG state and periodic countdown so a restored world
/// replays identically from the restore point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    entities: Vec<Entity>,
    controlled_actor: Option<EntityId>,
    coins: u32,
    goals: u32,
    steps: u32,
    countdown: u32,
    next_entity_id: u32,
    rng: DeterministicRng,
}

// =============================================================================
// WORLD STATE
// =============================================================================

/// Complete state of one level run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldState {
    /// Current tick
    pub tick: u32,

    /// All entities, in draw order
    pub entities: Vec<Entity>,

    /// The actor the input intent drives
    pub controlled_actor: Option<EntityId>,

    /// Coins collected
    pub coins: u32,

    /// Goals collected
    pub goals: u32,

    /// Successful controlled-actor moves
    pub steps: u32,

    /// Level options
    pub options: LevelOptions,

    /// Ticks until the next periodic phase
    pub countdown: u32,

    /// Deterministic RNG (teleporter receiver picks)
    pub rng: DeterministicRng,

    /// Next entity ID (monotonic counter)
    pub next_entity_id: u32,

    /// Revert to checkpoint at end of tick
    pub pending_revert: bool,

    /// Restart from original at end of tick (overrides revert)
    pub pending_restart: bool,

    /// Capture a checkpoint at end of tick
    pub pending_checkpoint: bool,

    /// Level won this tick
    pub pending_win: bool,

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pub pending_events: Vec<SimEvent>,

    /// Deferred structural mutations
    #[serde(skip)]
    pub commands: Vec<Command>,

    /// State as loaded, for restart
    original: Option<Box<Snapshot>>,

    /// Last checkpoint, for revert
    checkpoint: Option<Box<Snapshot>>,
}

impl WorldState {
    /// Create an empty world.
    pub fn new(options: LevelOptions, seed: u64) -> Self {
        let countdown = options.tick_period;
        Self {
            tick: 0,
            entities: Vec::new(),
            controlled_actor: None,
            coins: 0,
            goals: 0,
            steps: 0,
            options,
            countdown,
            rng: DeterministicRng::new(seed),
            next_entity_id: 0,
            pending_revert: false,
            pending_restart: false,
            pending_checkpoint: false,
            pending_win: false,
            pending_events: Vec::new(),
            commands: Vec::new(),
            original: None,
            checkpoint: None,
        }
    }

    // =========================================================================
    // Entity access
    // =========================================================================

    /// Allocate the next entity ID.
    pub fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Add an entity immediately (level loading; never mid-iteration).
    pub fn add_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = self.alloc_id();
        entity.id = id;
        if entity.kind == EntityKind::Actor && self.controlled_actor.is_none() {
            self.controlled_actor = Some(id);
        }
        self.entities.push(entity);
        id
    }

    /// Spawn an entity with kind defaults immediately.
    pub fn spawn(&mut self, kind: EntityKind, x: i32, y: i32, layer: i32) -> EntityId {
        let entity = Entity::new(EntityId(0), kind, x, y, layer);
        self.add_entity(entity)
    }

    /// Find an entity by ID.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Find an entity mutably by ID.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Position of an entity in the draw list.
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| e.id == id)
    }

    /// IDs of all entities on a cell, in draw order.
    pub fn ids_at(&self, x: i32, y: i32, layer: i32) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.at(x, y, layer))
            .map(|e| e.id)
            .collect()
    }

    /// The controlled actor, if it still exists.
    pub fn controlled(&self) -> Option<&Entity> {
        self.controlled_actor.and_then(|id| self.entity(id))
    }

    /// Whether an entity qualifies as a controllable actor.
    pub fn is_controllable(entity: &Entity) -> bool {
        entity.kind == EntityKind::Actor && entity.is_enabled && entity.hp() > 0
    }

    /// Pick the first qualifying actor in draw order.
    pub fn find_controllable(&self) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|e| Self::is_controllable(e))
            .map(|e| e.id)
    }

    // =========================================================================
    // Deferred commands
    // =========================================================================

    /// Remove an entity immediately.
    ///
    /// Only legal outside entity-list iteration (movement resolution
    /// works from ID snapshots). Mid-iteration removal goes through
    /// `queue_remove`.
    pub fn remove_entity(&mut self, id: EntityId) {
        if let Some(idx) = self.index_of(id) {
            self.entities.remove(idx);
        }
        if self.controlled_actor == Some(id) {
            self.controlled_actor = None;
        }
    }

    /// Queue an entity spawn for the next `apply_commands`.
    pub fn queue_spawn(&mut self, entity: Entity) {
        self.commands.push(Command::Spawn(entity));
    }

    /// Queue an entity removal for the next `apply_commands`.
    pub fn queue_remove(&mut self, id: EntityId) {
        self.commands.push(Command::Remove(id));
    }

    /// Apply queued spawns/removals. Called between phases only.
    pub fn apply_commands(&mut self) {
        let commands = std::mem::take(&mut self.commands);
        for command in commands {
            match command {
                Command::Spawn(entity) => {
                    self.add_entity(entity);
                }
                Command::Remove(id) => {
                    if let Some(idx) = self.index_of(id) {
                        self.entities.remove(idx);
                    }
                    if self.controlled_actor == Some(id) {
                        self.controlled_actor = None;
                    }
                }
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self.entities.clone(),
            controlled_actor: self.controlled_actor,
            coins: self.coins,
            goals: self.goals,
            steps: self.steps,
            countdown: self.countdown,
            next_entity_id: self.next_entity_id,
            rng: self.rng.clone(),
        }
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        self.entities = snapshot.entities.clone();
        self.controlled_actor = snapshot.controlled_actor;
        self.coins = snapshot.coins;
        self.goals = snapshot.goals;
        self.steps = snapshot.steps;
        self.countdown = snapshot.countdown;
        self.next_entity_id = snapshot.next_entity_id;
        self.rng = snapshot.rng.clone();
        self.commands.clear();
    }

    /// Capture the as-loaded state. The checkpoint starts equal to it.
    pub fn capture_original(&mut self) {
        let snap = self.snapshot();
        self.checkpoint = Some(Box::new(snap.clone()));
        self.original = Some(Box::new(snap));
    }

    /// Replace the checkpoint with the current working state.
    pub fn capture_checkpoint(&mut self) {
        self.checkpoint = Some(Box::new(self.snapshot()));
    }

    /// Restore the working state from the checkpoint.
    pub fn revert_to_checkpoint(&mut self) {
        if let Some(snap) = self.checkpoint.take() {
            self.restore(&snap);
            self.checkpoint = Some(snap);
        }
    }

    /// Restore the working state from the original.
    pub fn restart_from_original(&mut self) {
        if let Some(snap) = self.original.take() {
            self.restore(&snap);
            self.checkpoint = Some(snap.clone());
            self.original = Some(snap);
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Push a simulation event.
    pub fn push_event(&mut self, event: SimEvent) {
        self.pending_events.push(event);
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng.state(), |hasher| {
            hasher.update_u32(self.entities.len() as u32);
            for entity in &self.entities {
                entity.hash_into(hasher);
            }
            hasher.update_u32(self.controlled_actor.map_or(u32::MAX, |id| id.raw()));
            hasher.update_u32(self.coins);
            hasher.update_u32(self.goals);
            hasher.update_u32(self.steps);
            hasher.update_u32(self.countdown);
            self.hash_options(hasher);
        })
    }

    fn hash_options(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.options.tick_period);
        hasher.update_str(&self.options.next_level_link);
        hasher.update_u32(self.options.max_steps);
        hasher.update_u32(self.options.required_goals);
        hasher.update_bool(self.options.sync_actors);
        hasher.update_bool(self.options.sync_death);
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(LevelOptions::default(), 0)
    }
}

// =============================================================================
// TESTS
// =============================================================================
