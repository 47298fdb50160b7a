// Task-pool primitive: parallel dispatch of independent work units over a
// fixed set of workers
mod task_pool;
pub mod units;

pub use task_pool::{
    compare_sequential_vs_parallel, ComparisonReport, Outcome, TaskPool, WorkUnit,
};
