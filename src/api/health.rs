//! Shared health state for the /health endpoint.
//! Updated by the insider buying handler, read by /health.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// Insider cache lookups that failed to rebuild.
    pub cache_failures: AtomicU64,
    /// Unix seconds of the last failed rebuild (0 = none).
    pub last_cache_failure_at: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_failure(&self, at_unix_secs: u64) {
        self.cache_failures.fetch_add(1, Ordering::Relaxed);
        self.last_cache_failure_at.store(at_unix_secs, Ordering::Relaxed);
    }

    pub fn cache_failures(&self) -> u64 {
        self.cache_failures.load(Ordering::Relaxed)
    }

    pub fn last_cache_failure_at(&self) -> Option<u64> {
        match self.last_cache_failure_at.load(Ordering::Relaxed) {
            0 => None,
            at => Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_accumulate() {
        let health = HealthState::new();
        assert_eq!(health.last_cache_failure_at(), None);
        health.record_cache_failure(1_700_000_000);
        health.record_cache_failure(1_700_000_060);
        assert_eq!(health.cache_failures(), 2);
        assert_eq!(health.last_cache_failure_at(), Some(1_700_000_060));
    }
}
