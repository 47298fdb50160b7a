use crate::core::errors::{Result, TandemError};
use async_trait::async_trait;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// An independent, self-contained piece of computation.
///
/// Units submitted together must not depend on one another; the pool gives
/// no cross-unit ordering guarantee. `id` is the unit's identity in the
/// outcome map, written exactly once per run.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Identity of this unit in the outcome map
    fn id(&self) -> String;

    /// Perform the work
    async fn execute(&self) -> Result<Value>;
}

/// Recorded result of exactly one work unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    Completed { value: Value, duration_ms: u64 },
    Failed { reason: String, duration_ms: u64 },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::Completed { duration_ms, .. } | Self::Failed { duration_ms, .. } => *duration_ms,
        }
    }
}

/// A fixed-size pool of worker execution contexts draining a queue of
/// independent work units.
///
/// Work-queue scheduling: a unit becomes eligible as soon as it is enqueued;
/// no priority, no preemption — a worker that claims a unit runs it to
/// completion or failure before taking the next. A unit fault is recorded as
/// a `Failed` outcome for that unit alone and never aborts siblings or the
/// pool.
pub struct TaskPool {
    workers: usize,
    pending: SegQueue<Arc<dyn WorkUnit>>,
    pending_len: AtomicUsize,
}

impl TaskPool {
    /// Create a pool dispatching over exactly `workers` execution contexts
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(TandemError::configuration_field(
                "worker count must be greater than 0",
                "workers",
            ));
        }
        Ok(Self {
            workers,
            pending: SegQueue::new(),
            pending_len: AtomicUsize::new(0),
        })
    }

    /// Create a pool sized to the machine's parallelism
    pub fn with_default_workers() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            pending: SegQueue::new(),
            pending_len: AtomicUsize::new(0),
        }
    }

    /// Number of worker execution contexts
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Enqueue one unit
    pub fn submit_one(&self, unit: Arc<dyn WorkUnit>) {
        self.pending.push(unit);
        self.pending_len.fetch_add(1, Ordering::Relaxed);
    }

    /// Enqueue a batch of units
    pub fn submit<I>(&self, units: I)
    where
        I: IntoIterator<Item = Arc<dyn WorkUnit>>,
    {
        for unit in units {
            self.submit_one(unit);
        }
    }

    /// Units waiting for the next `run_all`
    pub fn pending(&self) -> usize {
        self.pending_len.load(Ordering::Relaxed)
    }

    /// Dispatch every pending unit across the workers and block the caller
    /// until each one has completed or failed.
    ///
    /// Returns one outcome per submitted unit identity. Duplicate identities
    /// are rejected before anything runs, since each identity's outcome is
    /// written at most once.
    pub async fn run_all(&self) -> Result<HashMap<String, Outcome>> {
        let mut drained = Vec::new();
        while let Some(unit) = self.pending.pop() {
            drained.push(unit);
        }
        self.pending_len.store(0, Ordering::Relaxed);

        let mut seen = HashSet::with_capacity(drained.len());
        for unit in &drained {
            let unit_id = unit.id();
            if !seen.insert(unit_id.clone()) {
                return Err(TandemError::validation(format!(
                    "duplicate work unit identity: {unit_id}"
                )));
            }
        }
        if drained.is_empty() {
            return Ok(HashMap::new());
        }

        let total = drained.len();
        let queue: Arc<SegQueue<Arc<dyn WorkUnit>>> = Arc::new(SegQueue::new());
        for unit in drained {
            queue.push(unit);
        }
        let results: Arc<DashMap<String, Outcome>> = Arc::new(DashMap::with_capacity(total));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_index in 0..self.workers {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            // the worker index travels as an explicit argument
            handles.push(tokio::spawn(worker_loop(worker_index, queue, results)));
        }
        for joined in join_all(handles).await {
            joined?;
        }

        debug!(units = total, workers = self.workers, "run complete");
        let collected = Arc::try_unwrap(results)
            .map(|map| map.into_iter().collect::<HashMap<_, _>>())
            .unwrap_or_else(|shared| {
                shared
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect()
            });
        Ok(collected)
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<SegQueue<Arc<dyn WorkUnit>>>,
    results: Arc<DashMap<String, Outcome>>,
) {
    let mut executed = 0u64;
    while let Some(unit) = queue.pop() {
        let unit_id = unit.id();
        debug!(worker, unit = %unit_id, "unit started");
        let started = Instant::now();

        // Run the unit in its own task so a panic is confined to the unit
        // instead of taking the worker down with it.
        let execution = tokio::spawn({
            let unit = Arc::clone(&unit);
            async move { unit.execute().await }
        });
        let duration_ms = |started: Instant| started.elapsed().as_millis() as u64;
        let outcome = match execution.await {
            Ok(Ok(value)) => Outcome::Completed {
                value,
                duration_ms: duration_ms(started),
            },
            Ok(Err(err)) => {
                warn!(worker, unit = %unit_id, error = %err, "unit failed");
                Outcome::Failed {
                    reason: err.to_string(),
                    duration_ms: duration_ms(started),
                }
            }
            Err(join_err) => {
                warn!(worker, unit = %unit_id, "unit panicked");
                Outcome::Failed {
                    reason: format!("work unit panicked: {join_err}"),
                    duration_ms: duration_ms(started),
                }
            }
        };

        if results.insert(unit_id.clone(), outcome).is_some() {
            // identities were validated up front, so this cannot fire
            warn!(unit = %unit_id, "outcome overwritten");
        }
        executed += 1;
    }
    debug!(worker, executed, "worker drained queue");
}

/// Durations of one sequential and one parallel run over the same units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub units: usize,
    pub workers: usize,
    pub sequential_ms: u64,
    pub parallel_ms: u64,
    pub speedup: f64,
}

/// Run the same unit sequence once on a single worker and once on `workers`
/// workers, reporting elapsed wall time for each. Observational only; the
/// coordination contract is `run_all`'s.
pub async fn compare_sequential_vs_parallel(
    units: &[Arc<dyn WorkUnit>],
    workers: usize,
) -> Result<ComparisonReport> {
    let sequential_pool = TaskPool::new(1)?;
    sequential_pool.submit(units.iter().cloned());
    let started = Instant::now();
    sequential_pool.run_all().await?;
    let sequential = started.elapsed();

    let parallel_pool = TaskPool::new(workers)?;
    parallel_pool.submit(units.iter().cloned());
    let started = Instant::now();
    parallel_pool.run_all().await?;
    let parallel = started.elapsed();

    Ok(ComparisonReport {
        units: units.len(),
        workers,
        sequential_ms: sequential.as_millis() as u64,
        parallel_ms: parallel.as_millis() as u64,
        speedup: sequential.as_secs_f64() / parallel.as_secs_f64().max(f64::EPSILON),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::units::{FailingUnit, SleepUnit};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    struct EchoUnit {
        id: String,
    }

    #[async_trait]
    impl WorkUnit for EchoUnit {
        fn id(&self) -> String {
            self.id.clone()
        }

        async fn execute(&self) -> Result<Value> {
            Ok(json!({ "echo": self.id }))
        }
    }

    struct PanicUnit;

    #[async_trait]
    impl WorkUnit for PanicUnit {
        fn id(&self) -> String {
            "panic-unit".to_string()
        }

        async fn execute(&self) -> Result<Value> {
            panic!("deliberate test panic");
        }
    }

    fn echo(id: &str) -> Arc<dyn WorkUnit> {
        Arc::new(EchoUnit { id: id.to_string() })
    }

    #[tokio::test]
    async fn test_rejects_zero_workers() {
        assert!(TaskPool::new(0).is_err());
        assert!(TaskPool::with_default_workers().workers() >= 1);
    }

    #[tokio::test]
    async fn test_empty_run_returns_empty_map() {
        let pool = TaskPool::new(2).unwrap();
        assert!(pool.run_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_unit_gets_exactly_one_outcome() {
        let pool = TaskPool::new(3).unwrap();
        let ids: Vec<String> = (0..8).map(|n| format!("unit-{n}")).collect();
        pool.submit(ids.iter().map(|id| echo(id)));
        assert_eq!(pool.pending(), 8);

        let outcomes = pool.run_all().await.unwrap();
        assert_eq!(pool.pending(), 0);
        assert_eq!(outcomes.len(), 8);
        for id in &ids {
            assert!(outcomes[id].is_completed(), "missing outcome for {id}");
        }
    }

    #[tokio::test]
    async fn test_duplicate_identities_are_rejected() {
        let pool = TaskPool::new(2).unwrap();
        pool.submit([echo("same"), echo("same")]);
        let err = pool.run_all().await.unwrap_err();
        assert!(matches!(err, TandemError::Validation { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_is_isolated_to_one_unit() {
        let pool = TaskPool::new(2).unwrap();
        pool.submit([
            echo("ok-1"),
            Arc::new(FailingUnit::new("broken", "synthetic fault")) as Arc<dyn WorkUnit>,
            echo("ok-2"),
        ]);

        let outcomes = pool.run_all().await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes["ok-1"].is_completed());
        assert!(outcomes["ok-2"].is_completed());
        match &outcomes["broken"] {
            Outcome::Failed { reason, .. } => assert!(reason.contains("synthetic fault")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panic_is_isolated_to_one_unit() {
        let pool = TaskPool::new(2).unwrap();
        pool.submit([echo("alive"), Arc::new(PanicUnit) as Arc<dyn WorkUnit>]);

        let outcomes = pool.run_all().await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes["alive"].is_completed());
        match &outcomes["panic-unit"] {
            Outcome::Failed { reason, .. } => assert!(reason.contains("panicked")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    // ceil(6 / 3) * 100ms = 200ms of sleeping; the bound leaves room for
    // scheduler noise without letting a serialized run (600ms) pass.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_run_is_batched_not_serialized() {
        let pool = TaskPool::new(3).unwrap();
        pool.submit((0..6).map(|n| {
            Arc::new(SleepUnit::new(
                format!("sleep-{n}"),
                Duration::from_millis(100),
            )) as Arc<dyn WorkUnit>
        }));

        let started = Instant::now();
        let outcomes = pool.run_all().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcomes.len(), 6);
        assert!(elapsed >= Duration::from_millis(190), "finished too fast: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(450), "serialized: {elapsed:?}");
        for outcome in outcomes.values() {
            assert!(outcome.duration_ms() >= 90);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_comparison_reports_real_speedup() {
        let units: Vec<Arc<dyn WorkUnit>> = (0..6)
            .map(|n| {
                Arc::new(SleepUnit::new(
                    format!("sleep-{n}"),
                    Duration::from_millis(50),
                )) as Arc<dyn WorkUnit>
            })
            .collect();

        let report = compare_sequential_vs_parallel(&units, 3).await.unwrap();
        assert_eq!(report.units, 6);
        assert_eq!(report.workers, 3);
        assert!(report.sequential_ms >= 290);
        assert!(
            report.speedup > 1.5,
            "expected speedup, got {:.2}",
            report.speedup
        );
    }
}
