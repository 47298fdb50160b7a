use crate::core::errors::{Result, TandemError};
use crate::core::pacing::Pacing;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A shared counter mutated by concurrent execution contexts.
///
/// Each increment is deliberately split into a load, a paced pause, and a
/// store, so the read-modify-write window is wide enough to observe. When the
/// counter is guarded, the whole sequence runs under a mutex and the final
/// value after N increments is exactly N. When unguarded, concurrent
/// increments may interleave and overwrite each other; the resulting lost
/// updates are an expected, documented outcome, not an error.
#[derive(Debug)]
pub struct SharedCounter {
    value: AtomicI64,
    guard: Option<Mutex<()>>,
    pacing: Pacing,
}

impl SharedCounter {
    /// Create a counter starting at zero
    pub fn new(guarded: bool) -> Self {
        Self::with_pacing(guarded, Pacing::default())
    }

    /// Create a counter whose read-modify-write window is widened by `pacing`
    pub fn with_pacing(guarded: bool, pacing: Pacing) -> Self {
        Self {
            value: AtomicI64::new(0),
            guard: guarded.then(|| Mutex::new(())),
            pacing,
        }
    }

    /// Whether increments are serialized by a lock
    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// Current counter value
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Increment the counter by one.
    ///
    /// Guarded: at most one execution context runs the read-modify-write at
    /// a time. Unguarded: the three steps may interleave across contexts and
    /// the write may clobber a concurrent update.
    pub async fn increment(&self) {
        match &self.guard {
            Some(lock) => {
                let _held = lock.lock().await;
                self.read_modify_write().await;
            }
            None => self.read_modify_write().await,
        }
    }

    async fn read_modify_write(&self) {
        let snapshot = self.value.load(Ordering::SeqCst);
        self.pacing.pause().await;
        self.value.store(snapshot + 1, Ordering::SeqCst);
    }
}

/// Configuration for a concurrent increment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterRunConfig {
    /// Serialize increments with a lock
    pub guarded: bool,
    /// Number of concurrent execution contexts
    pub contexts: usize,
    /// Increments performed by each context
    pub increments_per_context: usize,
    /// Pause inserted between the read and the write of each increment
    pub pacing: Pacing,
}

impl Default for CounterRunConfig {
    fn default() -> Self {
        Self {
            guarded: false,
            contexts: 3,
            increments_per_context: 1000,
            pacing: Pacing::None,
        }
    }
}

impl CounterRunConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.contexts == 0 {
            return Err(TandemError::configuration_field(
                "contexts must be greater than 0",
                "contexts",
            ));
        }
        if self.increments_per_context == 0 {
            return Err(TandemError::configuration_field(
                "increments_per_context must be greater than 0",
                "increments_per_context",
            ));
        }
        self.pacing.validate()
    }
}

/// Numeric result of a concurrent increment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterReport {
    /// Total increments performed
    pub expected: i64,
    /// Final counter value
    pub observed: i64,
    /// expected - observed; zero whenever the counter is guarded
    pub lost_updates: i64,
}

/// Run `contexts` concurrent execution contexts, each incrementing a fresh
/// counter `increments_per_context` times, and report the final tally.
pub async fn run_increments(config: &CounterRunConfig) -> Result<CounterReport> {
    config.validate()?;

    let counter = Arc::new(SharedCounter::with_pacing(
        config.guarded,
        config.pacing.clone(),
    ));
    let increments = config.increments_per_context;

    let mut handles = Vec::with_capacity(config.contexts);
    for context_index in 0..config.contexts {
        let counter = Arc::clone(&counter);
        // context_index is bound per spawn, never captured from the loop
        handles.push(tokio::spawn(async move {
            for _ in 0..increments {
                counter.increment().await;
            }
            debug!(context = context_index, increments, "context finished");
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let expected = (config.contexts * increments) as i64;
    let observed = counter.value();
    Ok(CounterReport {
        expected,
        observed,
        lost_updates: expected - observed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_guarded_counter_is_exact() {
        let config = CounterRunConfig {
            guarded: true,
            contexts: 4,
            increments_per_context: 250,
            pacing: Pacing::None,
        };
        let report = run_increments(&config).await.unwrap();
        assert_eq!(report.observed, 1000);
        assert_eq!(report.lost_updates, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_guarded_counter_is_exact_under_contention_delay() {
        let config = CounterRunConfig {
            guarded: true,
            contexts: 3,
            increments_per_context: 20,
            pacing: Pacing::Fixed(Duration::from_micros(200)),
        };
        let report = run_increments(&config).await.unwrap();
        assert_eq!(report.observed, report.expected);
    }

    // The race is statistical: any single run may happen to be exact, so the
    // assertion is that repeated contended runs reproduce at least one lost
    // update, not that every run does.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unguarded_counter_loses_updates_under_contention() {
        let config = CounterRunConfig {
            guarded: false,
            contexts: 4,
            increments_per_context: 50,
            pacing: Pacing::Fixed(Duration::from_micros(500)),
        };

        let mut raced = false;
        for _ in 0..25 {
            let report = run_increments(&config).await.unwrap();
            assert!(report.observed <= report.expected);
            if report.lost_updates > 0 {
                raced = true;
                break;
            }
        }
        assert!(raced, "no lost update observed across repeated trials");
    }

    #[tokio::test]
    async fn test_single_context_increments() {
        let counter = SharedCounter::new(true);
        assert!(counter.is_guarded());
        for _ in 0..10 {
            counter.increment().await;
        }
        assert_eq!(counter.value(), 10);

        let unguarded = SharedCounter::new(false);
        assert!(!unguarded.is_guarded());
        unguarded.increment().await;
        assert_eq!(unguarded.value(), 1);
    }

    #[tokio::test]
    async fn test_config_validation() {
        let config = CounterRunConfig {
            contexts: 0,
            ..Default::default()
        };
        assert!(run_increments(&config).await.is_err());
    }
}
