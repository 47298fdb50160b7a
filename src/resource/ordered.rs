use crate::core::errors::{Result, TandemError};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// A fixed collection of exclusive resources indexed `0..len`.
///
/// Actors that need several resources at once must go through
/// `acquire_in_order`, which imposes one global total order on acquisition:
/// indices are always locked ascending. With every actor following that
/// order, no circular wait chain can form, so the classic hold-and-wait
/// deadlock is ruled out by construction rather than detected at runtime.
/// Locking the underlying resources directly, out of order, is unsupported
/// misuse: the set offers no detection and the process may deadlock.
#[derive(Debug)]
pub struct ResourceSet {
    resources: Vec<Arc<Mutex<()>>>,
}

impl ResourceSet {
    /// Create a set of `count` exclusive resources
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(TandemError::configuration_field(
                "resource count must be greater than 0",
                "count",
            ));
        }
        Ok(Self {
            resources: (0..count).map(|_| Arc::new(Mutex::new(()))).collect(),
        })
    }

    /// Number of resources in the set
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Always false: the set cannot be constructed empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Acquire every requested resource, blocking per resource as needed.
    ///
    /// The request is sorted ascending and deduplicated before anything is
    /// locked; that sort is the deadlock-avoidance contract itself, so there
    /// is deliberately no entry point that skips it. Duplicate indices are
    /// collapsed rather than rejected.
    pub async fn acquire_in_order(&self, indices: &[usize]) -> Result<ResourceClaim> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        for &index in &sorted {
            if index >= self.resources.len() {
                return Err(TandemError::unknown_resource(index, self.resources.len()));
            }
        }

        let mut held = Vec::with_capacity(sorted.len());
        for index in sorted {
            let guard = Arc::clone(&self.resources[index]).lock_owned().await;
            debug!(index, "resource acquired");
            held.push((index, guard));
        }
        Ok(ResourceClaim { held })
    }
}

/// Handle over the resources one acquisition call locked.
///
/// Dropping the claim releases everything; release order does not affect the
/// deadlock-avoidance guarantee, which depends only on acquisition order.
#[derive(Debug)]
pub struct ResourceClaim {
    held: Vec<(usize, OwnedMutexGuard<()>)>,
}

impl ResourceClaim {
    /// Indices currently held, in acquisition order
    pub fn indices(&self) -> Vec<usize> {
        self.held.iter().map(|(index, _)| *index).collect()
    }

    /// Release every held resource
    pub fn release_all(self) {
        for (index, guard) in self.held {
            drop(guard);
            debug!(index, "resource released");
        }
    }
}
