// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cached engine health state.
//!
//! Probing the engine before every search would double its round trips, so
//! a check result is reused for a short interval. A failed query marks the
//! engine unhealthy right away; the next check after the interval may
//! restore it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::engine::EngineClient;

pub struct EngineHealth {
    /// Last known health state
    healthy: AtomicBool,
    /// Consecutive failure count
    failures: AtomicU64,
    /// When `healthy` was last established
    last_checked: Mutex<Option<Instant>>,
    interval: Duration,
    /// Lock for health check (prevent thundering herd)
    checking: tokio::sync::Mutex<()>,
}

impl EngineHealth {
    pub fn new(interval: Duration) -> Self {
        Self {
            healthy: AtomicBool::new(true),
            failures: AtomicU64::new(0),
            last_checked: Mutex::new(None),
            interval,
            checking: tokio::sync::Mutex::new(()),
        }
    }

    /// Record a successful engine query.
    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        if !self.healthy.swap(true, Ordering::AcqRel) {
            info!("Search engine recovered");
        }
    }

    /// Record a failed engine query; the engine counts as down until re-checked.
    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if self.healthy.swap(false, Ordering::AcqRel) {
            warn!(failures, "Search engine marked unhealthy");
        }
        *self.last_checked.lock() = Some(Instant::now());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    /// Cached health, probing the engine when the cached state is too old.
    pub async fn check(&self, engine: &dyn EngineClient) -> bool {
        if let Some(state) = self.cached() {
            return state;
        }

        let _guard = self.checking.lock().await;
        if let Some(state) = self.cached() {
            return state;
        }

        let ok = engine.healthy().await;
        debug!(healthy = ok, "Search engine health check");
        if ok {
            self.record_success();
            *self.last_checked.lock() = Some(Instant::now());
        } else {
            self.record_failure();
        }
        ok
    }

    fn cached(&self) -> Option<bool> {
        let last = (*self.last_checked.lock())?;
        (last.elapsed() < self.interval).then(|| self.is_healthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;

    #[tokio::test]
    async fn test_check_result_is_cached() {
        let engine = ScriptedEngine::empty();
        let health = EngineHealth::new(Duration::from_secs(60));

        assert!(health.check(&engine).await);
        assert!(health.check(&engine).await);
        assert_eq!(engine.health_checks(), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_always_checks() {
        let engine = ScriptedEngine::empty();
        let health = EngineHealth::new(Duration::ZERO);

        assert!(health.check(&engine).await);
        engine.set_healthy(false);
        assert!(!health.check(&engine).await);
        assert_eq!(engine.health_checks(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_marks_unhealthy_without_check() {
        let engine = ScriptedEngine::empty();
        let health = EngineHealth::new(Duration::from_secs(60));

        health.record_failure();
        assert!(!health.check(&engine).await);
        assert_eq!(engine.health_checks(), 0);
        assert_eq!(health.failure_count(), 1);
    }

    #[test]
    fn test_success_resets_failures() {
        let health = EngineHealth::new(Duration::from_secs(1));
        health.record_failure();
        health.record_failure();
        assert!(!health.is_healthy());

        health.record_success();
        assert!(health.is_healthy());
        assert_eq!(health.failure_count(), 0);
    }
}
