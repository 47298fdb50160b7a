use crate::core::errors::{Result, TandemError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Injectable delay source used to pace simulated work.
///
/// Every think/prep/hold delay in the toolkit flows through one of these, so
/// demos can run with realistic jitter while tests substitute `Pacing::None`
/// for determinism.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Pacing {
    /// No delay at all
    #[default]
    None,
    /// Constant pause per step
    Fixed(Duration),
    /// Uniformly random pause between `min` and `max` inclusive
    Jittered { min: Duration, max: Duration },
}

impl Pacing {
    /// Jittered pacing from millisecond bounds
    pub fn jittered_ms(min_ms: u64, max_ms: u64) -> Self {
        Self::Jittered {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms),
        }
    }

    /// Validate the pacing bounds
    pub fn validate(&self) -> Result<()> {
        if let Self::Jittered { min, max } = self {
            if min > max {
                return Err(TandemError::configuration_field(
                    "jitter min must not exceed max",
                    "pacing",
                ));
            }
        }
        Ok(())
    }

    /// Draw the next pause duration
    pub fn sample(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(duration) => *duration,
            Self::Jittered { min, max } => {
                let low = min.as_nanos() as u64;
                let high = max.as_nanos() as u64;
                Duration::from_nanos(fastrand::u64(low..=high))
            }
        }
    }

    /// Pause the calling execution context for one sampled duration
    pub async fn pause(&self) {
        let duration = self.sample();
        if !duration.is_zero() {
            sleep(duration).await;
        }
    }
}
