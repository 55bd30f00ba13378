//! Pool statistics
//!
//! Open/idle counts come straight from the sqlx pool. Wait and close-reason
//! counters are kept here because sqlx does not track them: waits are recorded
//! on the acquire path, closes by the pool's release hook.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use sqlx::AnyPool;

/// Read-only snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Maximum number of open connections
    pub max_open_connections: u32,
    /// Established connections, both in use and idle
    pub open_connections: u32,
    pub in_use: u32,
    pub idle: u32,
    /// Acquires that found the pool exhausted
    pub wait_count: u64,
    /// Total time spent in those acquires
    pub wait_duration: Duration,
    /// Connections closed because the idle cap was reached
    pub max_idle_closed: u64,
    /// Connections closed on release after exceeding their lifetime
    pub max_lifetime_closed: u64,
}

/// Counters shared between the manager and the pool's release hook.
#[derive(Debug)]
pub(crate) struct PoolCounters {
    max_idle: u32,
    max_lifetime: Option<Duration>,
    pool: RwLock<Option<AnyPool>>,
    wait_count: AtomicU64,
    wait_nanos: AtomicU64,
    max_idle_closed: AtomicU64,
    max_lifetime_closed: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn new(max_idle: u32, max_lifetime: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            max_idle,
            max_lifetime,
            pool: RwLock::new(None),
            wait_count: AtomicU64::new(0),
            wait_nanos: AtomicU64::new(0),
            max_idle_closed: AtomicU64::new(0),
            max_lifetime_closed: AtomicU64::new(0),
        })
    }

    /// Let the release hook see the pool's idle count.
    pub(crate) fn attach(&self, pool: &AnyPool) {
        if let Ok(mut slot) = self.pool.write() {
            *slot = Some(pool.clone());
        }
    }

    /// Drop the hook's pool handle. The pool's options own the hook, so the
    /// handle must be released for the pool to be freed.
    pub(crate) fn detach(&self) {
        if let Ok(mut slot) = self.pool.write() {
            slot.take();
        }
    }

    /// Whether the pool is exhausted, i.e. an acquire is about to wait.
    pub(crate) fn is_exhausted(pool: &AnyPool) -> bool {
        pool.num_idle() == 0 && pool.size() >= pool.options().get_max_connections()
    }

    pub(crate) fn record_wait(&self, waited: Duration) {
        self.wait_count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Decide whether a released connection goes back to the idle set.
    pub(crate) fn keep_on_release(&self, age: Duration) -> bool {
        if let Some(lifetime) = self.max_lifetime {
            if age >= lifetime {
                self.max_lifetime_closed.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        let idle = match self.pool.read() {
            Ok(slot) => slot.as_ref().map(|pool| pool.num_idle()),
            Err(_) => None,
        };
        if let Some(idle) = idle {
            if idle >= self.max_idle as usize {
                self.max_idle_closed.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        true
    }

    pub(crate) fn snapshot(&self, pool: &AnyPool) -> PoolStats {
        let open = pool.size();
        let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX).min(open);
        PoolStats {
            max_open_connections: pool.options().get_max_connections(),
            open_connections: open,
            in_use: open - idle,
            idle,
            wait_count: self.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(self.wait_nanos.load(Ordering::Relaxed)),
            max_idle_closed: self.max_idle_closed.load(Ordering::Relaxed),
            max_lifetime_closed: self.max_lifetime_closed.load(Ordering::Relaxed),
        }
    }
}
