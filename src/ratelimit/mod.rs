//! Fixed-window rate limiter
//!
//! Counters live behind [`CounterStore`]. The in-memory store is only
//! correct for a single process; a multi-instance deployment swaps in a
//! shared store without touching call sites.

mod memory;

pub use memory::InMemoryCounterStore;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{PortalError, PortalResult};

/// Counter state for one key after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Storage for per-key windows.
pub trait CounterStore: Send + Sync {
    /// Count one request for `key`. Starts a fresh window (count 1) on first
    /// use or once `now >= reset_at`.
    fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> WindowCount;

    /// Drop windows that ended at or before `now`. Returns how many were dropped.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Request budget for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()), clock)
    }

    pub fn check(&self, key: &str, quota: Quota) -> RateDecision {
        let hit = self.store.hit(key, quota.window, self.clock.now());
        let allowed = hit.count <= quota.max_requests;
        if !allowed {
            tracing::debug!("Rate limit hit for {} ({} > {})", key, hit.count, quota.max_requests);
        }
        RateDecision {
            allowed,
            remaining: quota.max_requests.saturating_sub(hit.count),
            reset_at: hit.reset_at,
        }
    }

    /// [`RateLimiter::check`], turning a denial into `RateLimited`.
    pub fn enforce(&self, key: &str, quota: Quota) -> PortalResult<RateDecision> {
        let decision = self.check(key, quota);
        if decision.allowed {
            return Ok(decision);
        }
        let retry_after_secs = (decision.reset_at - self.clock.now()).num_seconds().max(1) as u64;
        Err(PortalError::RateLimited {
            reset_at: decision.reset_at,
            retry_after_secs,
        })
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(self.clock.now())
    }
}
