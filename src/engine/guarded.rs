// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine client behind a circuit breaker and a cached health state.
//!
//! ```text
//! execute(sql)
//!     │
//!     ├─→ circuit open? ──→ Unreachable (engine untouched)
//!     │
//!     └─→ inner.execute ──ok──→ health.record_success
//!                        └─err─→ health.record_failure (connection errors only)
//!
//! Only connection errors count against the circuit; a burst of rejected
//! statements falls back those requests alone.
//!
//! healthy() ──→ cached check, re-checked after the health interval
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::{EngineClient, EngineError, RowCursor};
use crate::resilience::{CircuitBreaker, CircuitConfig, CircuitError, EngineHealth};

pub struct GuardedEngine {
    inner: Arc<dyn EngineClient>,
    breaker: CircuitBreaker,
    health: EngineHealth,
}

impl GuardedEngine {
    pub fn new(inner: Arc<dyn EngineClient>, circuit: CircuitConfig, health: EngineHealth) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("engine", circuit),
            health,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn health(&self) -> &EngineHealth {
        &self.health
    }
}

#[async_trait]
impl EngineClient for GuardedEngine {
    async fn execute(&self, query: &str) -> Result<RowCursor, EngineError> {
        // A rejected statement says nothing about engine health.
        let counts = |e: &EngineError| e.is_unreachable();
        match self.breaker.call_with(counts, || self.inner.execute(query)).await {
            Ok(cursor) => {
                self.health.record_success();
                Ok(cursor)
            }
            Err(CircuitError::Rejected) => Err(EngineError::Unreachable("circuit breaker open".into())),
            Err(CircuitError::Inner(e)) => {
                if e.is_unreachable() {
                    self.health.record_failure();
                }
                Err(e)
            }
        }
    }

    async fn healthy(&self) -> bool {
        self.health.check(self.inner.as_ref()).await
    }

    fn escape(&self, text: &str) -> String {
        self.inner.escape(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use std::time::Duration;

    fn guarded(inner: Arc<ScriptedEngine>) -> GuardedEngine {
        let circuit = CircuitConfig {
            failure_threshold: 2,
            success_threshold: 1,
            recovery_timeout: Duration::from_secs(60),
        };
        GuardedEngine::new(inner, circuit, EngineHealth::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_unreachable_marks_unhealthy() {
        let inner = Arc::new(ScriptedEngine::failing(EngineError::Unreachable("refused".into())));
        let engine = guarded(inner.clone());

        assert!(engine.execute("SELECT 1").await.unwrap_err().is_unreachable());
        assert!(!engine.healthy().await);
        assert_eq!(inner.health_checks(), 0);
    }

    #[tokio::test]
    async fn test_query_error_keeps_engine_healthy() {
        let inner = Arc::new(ScriptedEngine::new(|sql| {
            if sql.contains("nope") {
                Err(EngineError::Query {
                    message: "unknown column".into(),
                })
            } else {
                Ok(RowCursor::empty())
            }
        }));
        let engine = guarded(inner.clone());

        for _ in 0..20 {
            let err = engine.execute("SELECT nope").await.unwrap_err();
            assert!(matches!(err, EngineError::Query { .. }));
        }

        assert!(engine.health().is_healthy());
        assert!(!engine.breaker().is_open());
        assert_eq!(engine.breaker().rejections(), 0);
        assert!(engine.execute("SELECT id FROM products").await.is_ok());
        assert_eq!(inner.execute_count(), 21);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_engine() {
        let inner = Arc::new(ScriptedEngine::failing(EngineError::Unreachable("refused".into())));
        let engine = guarded(inner.clone());

        for _ in 0..4 {
            let _ = engine.execute("SELECT 1").await;
        }
        let before = inner.execute_count();
        let err = engine.execute("SELECT 1").await.unwrap_err();

        assert_eq!(err, EngineError::Unreachable("circuit breaker open".into()));
        assert_eq!(inner.execute_count(), before);
        assert!(engine.breaker().is_open());
    }
}
