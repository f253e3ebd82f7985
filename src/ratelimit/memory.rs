//! Process-local counter store

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{CounterStore, WindowCount};

#[derive(Default)]
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, WindowCount>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> WindowCount {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let mut guard = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let entry = guard.entry(key.to_string()).or_insert(WindowCount {
            count: 0,
            reset_at: now,
        });
        if now >= entry.reset_at {
            entry.count = 1;
            entry.reset_at = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        } else {
            entry.count = entry.count.saturating_add(1);
        }
        *entry
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|_, w| w.reset_at > now);
        let purged = before - guard.len();
        if purged > 0 {
            tracing::debug!("Purged {} expired rate-limit windows", purged);
        }
        purged
    }
}
