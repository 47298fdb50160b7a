//! Sample work units for demos and tests: an I/O-bound stand-in, a CPU-bound
//! computation, a mixed accumulator, and an always-failing unit.

use crate::core::errors::{Result, TandemError};
use crate::core::pacing::Pacing;
use crate::pool::task_pool::WorkUnit;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

/// Sleeps for a fixed duration; stands in for file or network work
pub struct SleepUnit {
    id: String,
    duration: Duration,
}

impl SleepUnit {
    pub fn new<S: Into<String>>(id: S, duration: Duration) -> Self {
        Self {
            id: id.into(),
            duration,
        }
    }
}

#[async_trait]
impl WorkUnit for SleepUnit {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn execute(&self) -> Result<Value> {
        sleep(self.duration).await;
        Ok(json!({ "slept_ms": self.duration.as_millis() as u64 }))
    }
}

// Largest n whose Fibonacci number fits in a u128.
const MAX_FIBONACCI_N: u32 = 186;

/// Computes the nth Fibonacci number iteratively, then pauses per pacing
pub struct FibonacciUnit {
    n: u32,
    pacing: Pacing,
}

impl FibonacciUnit {
    pub fn new(n: u32, pacing: Pacing) -> Self {
        Self { n, pacing }
    }
}

#[async_trait]
impl WorkUnit for FibonacciUnit {
    fn id(&self) -> String {
        format!("fibonacci-{}", self.n)
    }

    async fn execute(&self) -> Result<Value> {
        if self.n > MAX_FIBONACCI_N {
            return Err(TandemError::work_unit(
                self.id(),
                format!("n must be at most {MAX_FIBONACCI_N}"),
            ));
        }
        // pair holds (F(k-1), F(k)); stopping at k = n never computes the
        // out-of-range F(n + 1)
        let mut pair: (u128, u128) = (0, 1);
        for _ in 1..self.n {
            pair = (pair.1, pair.0 + pair.1);
        }
        let value = if self.n == 0 { 0 } else { pair.1 };
        self.pacing.pause().await;
        Ok(json!({ "n": self.n, "value": value.to_string() }))
    }
}

/// Accumulates a sum with a paced pause every few hundred steps
pub struct CountingUnit {
    id: String,
    upto: u64,
    pacing: Pacing,
}

impl CountingUnit {
    pub fn new<S: Into<String>>(id: S, upto: u64, pacing: Pacing) -> Self {
        Self {
            id: id.into(),
            upto,
            pacing,
        }
    }
}

#[async_trait]
impl WorkUnit for CountingUnit {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn execute(&self) -> Result<Value> {
        let mut total: u64 = 0;
        for step in 1..=self.upto {
            total += step;
            if step % 200 == 0 {
                self.pacing.pause().await;
            }
        }
        Ok(json!({ "upto": self.upto, "sum": total }))
    }
}

/// Always fails; exercises the pool's failure isolation
pub struct FailingUnit {
    id: String,
    reason: String,
}

impl FailingUnit {
    pub fn new<S: Into<String>, M: Into<String>>(id: S, reason: M) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl WorkUnit for FailingUnit {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn execute(&self) -> Result<Value> {
        Err(TandemError::work_unit(self.id.clone(), self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fibonacci_values() {
        for (n, expected) in [(0u32, "0"), (1, "1"), (10, "55"), (20, "6765")] {
            let unit = FibonacciUnit::new(n, Pacing::None);
            let value = unit.execute().await.unwrap();
            assert_eq!(value["value"], expected);
        }
    }

    #[tokio::test]
    async fn test_fibonacci_overflow_guard() {
        let unit = FibonacciUnit::new(MAX_FIBONACCI_N + 1, Pacing::None);
        assert!(unit.execute().await.is_err());

        let unit = FibonacciUnit::new(MAX_FIBONACCI_N, Pacing::None);
        assert!(unit.execute().await.is_ok());
    }

    #[tokio::test]
    async fn test_counting_sum() {
        let unit = CountingUnit::new("count", 1000, Pacing::None);
        let value = unit.execute().await.unwrap();
        assert_eq!(value["sum"], 500_500u64);
    }

    #[tokio::test]
    async fn test_failing_unit_reports_reason() {
        let unit = FailingUnit::new("doomed", "no disk left");
        let err = unit.execute().await.unwrap_err();
        assert!(err.to_string().contains("no disk left"));
    }
}
