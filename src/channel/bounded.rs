use crate::core::errors::{Result, TandemError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};
use tracing::debug;

/// A fixed-capacity FIFO buffer coordinating producers and consumers.
///
/// `put` and `get` park the calling execution context on a notification
/// signal with a bounded timeout; neither ever busy-spins. Items are
/// delivered in the single global order they arrived at the buffer,
/// regardless of how many producers inserted them.
#[derive(Debug)]
pub struct BoundedChannel<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    space_available: Notify,
    item_available: Notify,
    occupancy: AtomicUsize,
    produced: AtomicU64,
    consumed: AtomicU64,
    closed: AtomicBool,
}

/// Point-in-time channel counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub capacity: usize,
    pub occupancy: usize,
    pub produced: u64,
    pub consumed: u64,
    pub closed: bool,
}

impl<T: Send> BoundedChannel<T> {
    /// Create an empty channel holding at most `capacity` items
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TandemError::configuration_field(
                "capacity must be greater than 0",
                "capacity",
            ));
        }
        Ok(Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            space_available: Notify::new(),
            item_available: Notify::new(),
            occupancy: AtomicUsize::new(0),
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Append `item` at the tail, waiting up to `timeout` for a free slot.
    ///
    /// Fails with `Full` once the timeout elapses and with `Closed` after
    /// `close_for_producers`. A failed put drops the item; callers that want
    /// to retry keep their own copy.
    pub async fn put(&self, item: T, timeout_limit: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started + timeout_limit;
        let mut pending = Some(item);

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(TandemError::Closed);
            }
            {
                let mut items = self.items.lock().await;
                if items.len() < self.capacity {
                    if let Some(value) = pending.take() {
                        items.push_back(value);
                    }
                    self.occupancy.store(items.len(), Ordering::Release);
                    drop(items);
                    self.produced.fetch_add(1, Ordering::Relaxed);
                    self.item_available.notify_one();
                    return Ok(());
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TandemError::full(
                    self.capacity,
                    started.elapsed().as_millis() as u64,
                ));
            }
            // Park until a consumer frees a slot or the deadline passes; an
            // expired wait falls through to one final occupancy check above.
            let _ = timeout(deadline - now, self.space_available.notified()).await;
        }
    }

    /// Remove and return the head item, waiting up to `timeout` for one.
    ///
    /// Fails with `Empty` once the timeout elapses. After the channel is
    /// closed for producers and fully drained, fails with `Empty`
    /// immediately: nothing can arrive anymore, so waiters are not held to
    /// their full timeout.
    pub async fn get(&self, timeout_limit: Duration) -> Result<T> {
        let started = Instant::now();
        let deadline = started + timeout_limit;

        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(item) = items.pop_front() {
                    self.occupancy.store(items.len(), Ordering::Release);
                    drop(items);
                    self.consumed.fetch_add(1, Ordering::Relaxed);
                    self.space_available.notify_one();
                    return Ok(item);
                }
            }

            if self.closed.load(Ordering::Acquire) {
                return Err(TandemError::empty(started.elapsed().as_millis() as u64));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TandemError::empty(started.elapsed().as_millis() as u64));
            }
            let _ = timeout(deadline - now, self.item_available.notified()).await;
        }
    }

    /// Current occupancy. Advisory only: another context may change it the
    /// instant this returns; there is no synchronization carrying the value
    /// forward. That race is inherent to the operation, not a defect.
    pub fn size(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    /// Advisory emptiness check; see `size`
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Maximum number of items the channel holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `close_for_producers` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Irreversibly signal that no more items will be produced.
    ///
    /// Blocked producers wake and fail `Closed`; blocked consumers wake and
    /// keep draining until the channel is empty, after which `get` fails
    /// `Empty` without waiting.
    pub fn close_for_producers(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("channel closed for producers");
        }
        self.space_available.notify_waiters();
        self.item_available.notify_waiters();
    }

    /// Point-in-time counters; advisory like `size`
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            capacity: self.capacity,
            occupancy: self.size(),
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_rejects_zero_capacity() {
        assert!(BoundedChannel::<u32>::new(0).is_err());
    }

    #[tokio::test]
    async fn test_fifo_order_single_consumer() {
        let channel = BoundedChannel::new(4).unwrap();
        for n in 0..4 {
            channel.put(n, LONG).await.unwrap();
        }
        for n in 0..4 {
            assert_eq!(channel.get(LONG).await.unwrap(), n);
        }
    }

    #[tokio::test]
    async fn test_put_times_out_when_full() {
        let channel = BoundedChannel::new(2).unwrap();
        channel.put(1, LONG).await.unwrap();
        channel.put(2, LONG).await.unwrap();
        assert_eq!(channel.size(), 2);

        let err = channel.put(3, SHORT).await.unwrap_err();
        assert!(matches!(err, TandemError::Full { capacity: 2, .. }));
        assert_eq!(channel.size(), 2);
    }

    #[tokio::test]
    async fn test_get_times_out_when_empty() {
        let channel = BoundedChannel::<u32>::new(2).unwrap();
        let err = channel.get(SHORT).await.unwrap_err();
        assert!(matches!(err, TandemError::Empty { .. }));
    }

    #[tokio::test]
    async fn test_put_unblocks_on_get() {
        let channel = Arc::new(BoundedChannel::new(1).unwrap());
        channel.put(1u32, LONG).await.unwrap();

        let producer = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.put(2, LONG).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(channel.get(LONG).await.unwrap(), 1);
        producer.await.unwrap().unwrap();
        assert_eq!(channel.get(LONG).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_after_close_fails_closed() {
        let channel = BoundedChannel::new(2).unwrap();
        channel.put(1u32, LONG).await.unwrap();
        channel.close_for_producers();

        let err = channel.put(2, LONG).await.unwrap_err();
        assert!(matches!(err, TandemError::Closed));
    }

    #[tokio::test]
    async fn test_drain_after_close_then_empty() {
        let channel = BoundedChannel::new(4).unwrap();
        channel.put("a", LONG).await.unwrap();
        channel.put("b", LONG).await.unwrap();
        channel.close_for_producers();

        // remaining items still drain in order
        assert_eq!(channel.get(LONG).await.unwrap(), "a");
        assert_eq!(channel.get(LONG).await.unwrap(), "b");
        assert_eq!(channel.size(), 0);

        // closed and drained: fails without sitting out the timeout
        let started = std::time::Instant::now();
        let err = channel.get(Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, TandemError::Empty { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_consumer() {
        let channel = Arc::new(BoundedChannel::<u32>::new(2).unwrap());
        let consumer = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.get(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        channel.close_for_producers();
        let err = consumer.await.unwrap().unwrap_err();
        assert!(matches!(err, TandemError::Empty { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_occupancy_never_exceeds_capacity() {
        let channel = Arc::new(BoundedChannel::new(3).unwrap());

        let mut producers = Vec::new();
        for producer in 0..2u32 {
            let channel = Arc::clone(&channel);
            producers.push(tokio::spawn(async move {
                for n in 0..50u32 {
                    channel.put(producer * 100 + n, LONG).await.unwrap();
                }
            }));
        }
        let watcher = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move {
                let mut seen = 0;
                while seen < 100 {
                    assert!(channel.size() <= channel.capacity());
                    if channel.get(LONG).await.is_ok() {
                        seen += 1;
                    }
                }
                seen
            })
        };

        for handle in producers {
            handle.await.unwrap();
        }
        assert_eq!(watcher.await.unwrap(), 100);
        let stats = channel.stats();
        assert_eq!(stats.produced, 100);
        assert_eq!(stats.consumed, 100);
        assert_eq!(stats.occupancy, 0);
    }
}
