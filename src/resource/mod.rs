// Resource-set primitive: circular-wait deadlock avoidance through a global
// ascending acquisition order
mod actors;
mod ordered;

pub use actors::{run_ring_actors, ActorPhase, ActorReport, ActorState, RingConfig};
pub use ordered::{ResourceClaim, ResourceSet};
