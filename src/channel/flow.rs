use crate::channel::bounded::BoundedChannel;
use crate::core::errors::{Result, TandemError};
use crate::core::pacing::Pacing;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for a producer/consumer run over one bounded channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConsumerConfig {
    /// Channel capacity
    pub capacity: usize,
    /// Items produced in total, across all producers
    pub total_items: usize,
    /// Number of producer execution contexts
    pub producers: usize,
    /// Number of consumer execution contexts
    pub consumers: usize,
    /// Bound on each individual put/get wait
    pub op_timeout: Duration,
    /// Pause before each item is produced
    pub produce_pacing: Pacing,
    /// Pause after each item is consumed
    pub consume_pacing: Pacing,
}

impl Default for ProducerConsumerConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            total_items: 12,
            producers: 2,
            consumers: 2,
            op_timeout: Duration::from_secs(2),
            produce_pacing: Pacing::None,
            consume_pacing: Pacing::None,
        }
    }
}

impl ProducerConsumerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(TandemError::configuration_field(
                "capacity must be greater than 0",
                "capacity",
            ));
        }
        if self.total_items == 0 {
            return Err(TandemError::configuration_field(
                "total_items must be greater than 0",
                "total_items",
            ));
        }
        if self.producers == 0 || self.consumers == 0 {
            return Err(TandemError::configuration(
                "at least one producer and one consumer are required",
            ));
        }
        if self.op_timeout.is_zero() {
            return Err(TandemError::configuration_field(
                "op_timeout must be non-zero",
                "op_timeout",
            ));
        }
        self.produce_pacing.validate()?;
        self.consume_pacing.validate()
    }
}

/// Numeric result of a producer/consumer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConsumerReport {
    pub produced: u64,
    pub consumed: u64,
    /// Items left in the channel after the drain; zero on a clean run
    pub remaining: usize,
    pub elapsed_ms: u64,
}

// A put that timed out is retried with a fresh copy of the item this many
// times before the failure is propagated.
const MAX_PUT_ATTEMPTS: u32 = 8;

/// Run `producers` producer contexts feeding `consumers` consumer contexts
/// through one bounded channel until `total_items` items have moved through.
///
/// Producers claim item sequence numbers from a single shared counter, so the
/// global cap holds no matter how the producers interleave. Once every
/// producer is done the channel is closed; consumers drain the remainder and
/// stop at closed-and-empty.
pub async fn run_producer_consumer(
    config: &ProducerConsumerConfig,
) -> Result<ProducerConsumerReport> {
    config.validate()?;

    let channel = Arc::new(BoundedChannel::<String>::new(config.capacity)?);
    let sequence = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let mut producer_handles = Vec::with_capacity(config.producers);
    for producer_index in 0..config.producers {
        let channel = Arc::clone(&channel);
        let sequence = Arc::clone(&sequence);
        let total_items = config.total_items;
        let pacing = config.produce_pacing.clone();
        let op_timeout = config.op_timeout;
        producer_handles.push(tokio::spawn(async move {
            let mut made = 0u64;
            loop {
                let item_id = sequence.fetch_add(1, Ordering::SeqCst);
                if item_id >= total_items {
                    break;
                }
                pacing.pause().await;
                put_with_retry(&channel, item_id, op_timeout, producer_index).await?;
                made += 1;
            }
            debug!(producer = producer_index, produced = made, "producer finished");
            Ok::<u64, TandemError>(made)
        }));
    }

    let mut consumer_handles = Vec::with_capacity(config.consumers);
    for consumer_index in 0..config.consumers {
        let channel = Arc::clone(&channel);
        let pacing = config.consume_pacing.clone();
        let op_timeout = config.op_timeout;
        consumer_handles.push(tokio::spawn(async move {
            let mut taken = 0u64;
            loop {
                match channel.get(op_timeout).await {
                    Ok(item) => {
                        pacing.pause().await;
                        taken += 1;
                        debug!(consumer = consumer_index, %item, "consumed");
                    }
                    Err(TandemError::Empty { .. }) if channel.is_closed() => break,
                    Err(TandemError::Empty { .. }) => {
                        // producers still running; keep waiting
                        debug!(consumer = consumer_index, "channel empty, waiting");
                    }
                    Err(err) => return Err(err),
                }
            }
            debug!(consumer = consumer_index, consumed = taken, "consumer finished");
            Ok(taken)
        }));
    }

    let mut produced = 0u64;
    let mut first_error = None;
    for handle in producer_handles {
        match handle.await {
            Ok(Ok(made)) => produced += made,
            Ok(Err(err)) => first_error = first_error.or(Some(err)),
            Err(join_err) => first_error = first_error.or(Some(join_err.into())),
        }
    }
    // Close even after a producer failure so consumers stop at
    // closed-and-empty instead of waiting forever.
    channel.close_for_producers();

    let mut consumed = 0u64;
    for handle in consumer_handles {
        match handle.await {
            Ok(Ok(taken)) => consumed += taken,
            Ok(Err(err)) => first_error = first_error.or(Some(err)),
            Err(join_err) => first_error = first_error.or(Some(join_err.into())),
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    Ok(ProducerConsumerReport {
        produced,
        consumed,
        remaining: channel.size(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

async fn put_with_retry(
    channel: &BoundedChannel<String>,
    item_id: usize,
    op_timeout: Duration,
    producer: usize,
) -> Result<()> {
    for attempt in 1..=MAX_PUT_ATTEMPTS {
        match channel.put(format!("item-{item_id}"), op_timeout).await {
            Ok(()) => return Ok(()),
            Err(err @ TandemError::Full { .. }) => {
                warn!(producer, item_id, attempt, "channel full, retrying");
                if attempt == MAX_PUT_ATTEMPTS {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("retry loop returns on final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scenario_two_producers_two_consumers() {
        let config = ProducerConsumerConfig::default();
        let report = run_producer_consumer(&config).await.unwrap();

        assert_eq!(report.produced, 12);
        assert_eq!(report.consumed, 12);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scenario_with_pacing_and_tight_capacity() {
        let config = ProducerConsumerConfig {
            capacity: 2,
            total_items: 20,
            producers: 3,
            consumers: 2,
            produce_pacing: Pacing::jittered_ms(0, 2),
            consume_pacing: Pacing::jittered_ms(0, 2),
            ..Default::default()
        };
        let report = run_producer_consumer(&config).await.unwrap();

        assert_eq!(report.produced, 20);
        assert_eq!(report.consumed, 20);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn test_config_validation() {
        let config = ProducerConsumerConfig {
            consumers: 0,
            ..Default::default()
        };
        assert!(run_producer_consumer(&config).await.is_err());
    }
}
