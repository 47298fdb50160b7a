use crate::core::errors::{Result, TandemError};
use crate::core::pacing::Pacing;
use crate::resource::ordered::ResourceSet;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of one actor contending for resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActorPhase {
    Idle = 0,
    Acquiring = 1,
    Holding = 2,
    Releasing = 3,
    Done = 4,
}

impl From<u8> for ActorPhase {
    fn from(value: u8) -> Self {
        match value {
            0 => ActorPhase::Idle,
            1 => ActorPhase::Acquiring,
            2 => ActorPhase::Holding,
            3 => ActorPhase::Releasing,
            4 => ActorPhase::Done,
            _ => ActorPhase::Idle,
        }
    }
}

/// Atomic per-actor state observable while the actor runs
#[derive(Debug)]
pub struct ActorState {
    pub id: usize,
    phase: AtomicU8,
    completed_cycles: AtomicU32,
}

impl ActorState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            phase: AtomicU8::new(ActorPhase::Idle as u8),
            completed_cycles: AtomicU32::new(0),
        }
    }

    /// Current phase
    pub fn phase(&self) -> ActorPhase {
        ActorPhase::from(self.phase.load(Ordering::Relaxed))
    }

    /// Move to a new phase, returning the previous one
    pub fn set_phase(&self, phase: ActorPhase) -> ActorPhase {
        ActorPhase::from(self.phase.swap(phase as u8, Ordering::Relaxed))
    }

    /// Record one finished cycle
    pub fn complete_cycle(&self) -> u32 {
        self.completed_cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cycles finished so far
    pub fn cycles(&self) -> u32 {
        self.completed_cycles.load(Ordering::Relaxed)
    }

    /// Whether the actor has reached its terminal phase
    pub fn is_done(&self) -> bool {
        self.phase() == ActorPhase::Done
    }
}

/// Configuration for a ring of actors contending over adjacent resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Number of actors; the resource set has the same size, and actor `i`
    /// needs resources `i` and `(i + 1) % actors` — the cycle topology that
    /// deadlocks under naive acquisition
    pub actors: usize,
    /// Full idle→holding cycles each actor performs before finishing
    pub cycles_per_actor: u32,
    /// Pause while idle, before reaching for the resources
    pub think_pacing: Pacing,
    /// Pause while holding both resources
    pub hold_pacing: Pacing,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            actors: 3,
            cycles_per_actor: 3,
            think_pacing: Pacing::None,
            hold_pacing: Pacing::None,
        }
    }
}

impl RingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.actors < 2 {
            return Err(TandemError::configuration_field(
                "a ring needs at least 2 actors",
                "actors",
            ));
        }
        if self.cycles_per_actor == 0 {
            return Err(TandemError::configuration_field(
                "cycles_per_actor must be greater than 0",
                "cycles_per_actor",
            ));
        }
        self.think_pacing.validate()?;
        self.hold_pacing.validate()
    }
}

/// Final numbers for one actor after a ring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorReport {
    pub actor: usize,
    pub cycles_completed: u32,
    pub phase: ActorPhase,
}

/// Run `actors` concurrent actors arranged in a cycle over one resource set.
///
/// Every actor needs its own index and its right neighbor's, the arrangement
/// that forms a circular wait when each grabs its left resource first. Going
/// through `acquire_in_order` breaks the cycle structurally, so all actors
/// finish every configured cycle; no timeouts or retries are involved.
pub async fn run_ring_actors(config: &RingConfig) -> Result<Vec<ActorReport>> {
    config.validate()?;

    let set = Arc::new(ResourceSet::new(config.actors)?);
    let states: Vec<Arc<ActorState>> = (0..config.actors)
        .map(|id| Arc::new(ActorState::new(id)))
        .collect();

    let mut handles = Vec::with_capacity(config.actors);
    for (actor_id, state) in states.iter().enumerate() {
        let set = Arc::clone(&set);
        let state = Arc::clone(state);
        let config = config.clone();
        // actor_id is passed into the task explicitly, never read back from
        // shared loop state
        handles.push(tokio::spawn(async move {
            run_actor(actor_id, set, state, config).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    Ok(states
        .iter()
        .map(|state| ActorReport {
            actor: state.id,
            cycles_completed: state.cycles(),
            phase: state.phase(),
        })
        .collect())
}

async fn run_actor(
    actor_id: usize,
    set: Arc<ResourceSet>,
    state: Arc<ActorState>,
    config: RingConfig,
) -> Result<()> {
    let needs = [actor_id, (actor_id + 1) % config.actors];

    for cycle in 1..=config.cycles_per_actor {
        state.set_phase(ActorPhase::Idle);
        config.think_pacing.pause().await;

        state.set_phase(ActorPhase::Acquiring);
        let claim = set.acquire_in_order(&needs).await?;

        state.set_phase(ActorPhase::Holding);
        config.hold_pacing.pause().await;

        state.set_phase(ActorPhase::Releasing);
        claim.release_all();

        let done = state.complete_cycle();
        debug!(
            actor = actor_id,
            cycle,
            total = done,
            "cycle complete"
        );
    }

    state.set_phase(ActorPhase::Done);
    Ok(())
}
