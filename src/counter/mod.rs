// Shared-counter primitive: the read-modify-write race and its fix
mod shared;

pub use shared::{run_increments, CounterReport, CounterRunConfig, SharedCounter};
