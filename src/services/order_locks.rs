use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process mutual exclusion per order id.
///
/// Entries are dropped once nobody holds or waits on them, so the map only
/// grows with the number of orders being confirmed right now.
#[derive(Clone, Default)]
pub struct OrderLocks {
    inner: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds the lock for `order_id`.
    pub async fn lock(&self, order_id: i32) -> OrderLockGuard {
        let mutex = self.inner.entry(order_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        OrderLockGuard {
            order_id,
            guard: Some(guard),
            locks: Arc::clone(&self.inner),
        }
    }

    /// Number of orders with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub struct OrderLockGuard {
    order_id: i32,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        // Release first so the guard's handle no longer counts.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.order_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
