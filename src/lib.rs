// Core infrastructure modules
pub mod core {
    pub mod errors;
    pub mod pacing;
}

// Four coordination primitives, each runnable standalone
pub mod channel; // bounded producer/consumer handoff
pub mod counter; // guarded vs. unguarded shared mutation
pub mod pool; // parallel dispatch over a fixed worker pool
pub mod resource; // ordered acquisition of exclusive resources

// Re-exports for convenience
pub use crate::core::errors::{Result, TandemError};
pub use crate::core::pacing::Pacing;

pub use channel::{BoundedChannel, ChannelStats, ProducerConsumerConfig, ProducerConsumerReport};
pub use counter::{CounterReport, CounterRunConfig, SharedCounter};
pub use pool::{ComparisonReport, Outcome, TaskPool, WorkUnit};
pub use resource::{ActorPhase, ActorReport, ResourceClaim, ResourceSet, RingConfig};
