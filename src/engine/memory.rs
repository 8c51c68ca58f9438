// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process engine double.
//!
//! [`ScriptedEngine`] answers each statement with a caller-supplied responder
//! and keeps a log of everything it was asked to run, so callers can assert
//! on exact round-trip counts and compiled statements without a live engine.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::traits::{EngineClient, EngineError, RowCursor};

type Responder = dyn Fn(&str) -> Result<RowCursor, EngineError> + Send + Sync;

pub struct ScriptedEngine {
    responder: Box<Responder>,
    healthy: AtomicBool,
    executed: Mutex<Vec<String>>,
    health_checks: AtomicU64,
}

impl ScriptedEngine {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<RowCursor, EngineError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            healthy: AtomicBool::new(true),
            executed: Mutex::new(Vec::new()),
            health_checks: AtomicU64::new(0),
        }
    }

    /// An engine that answers every statement with an empty result.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|_| Ok(RowCursor::empty()))
    }

    /// An engine whose every statement fails with `err`.
    pub fn failing(err: EngineError) -> Self {
        Self::new(move |_| Err(err.clone()))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    /// Statements executed so far, oldest first.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    #[must_use]
    pub fn execute_count(&self) -> usize {
        self.executed.lock().len()
    }

    #[must_use]
    pub fn health_checks(&self) -> u64 {
        self.health_checks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EngineClient for ScriptedEngine {
    async fn execute(&self, query: &str) -> Result<RowCursor, EngineError> {
        self.executed.lock().push(query.to_string());
        (self.responder)(query)
    }

    async fn healthy(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::Relaxed);
        self.healthy.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ResultSet, Value};

    #[tokio::test]
    async fn test_records_queries_in_order() {
        let engine = ScriptedEngine::empty();
        engine.execute("SELECT 1").await.unwrap();
        engine.execute("SELECT 2").await.unwrap();
        assert_eq!(engine.executed(), vec!["SELECT 1", "SELECT 2"]);
        assert_eq!(engine.execute_count(), 2);
    }

    #[tokio::test]
    async fn test_responder_output_returned() {
        let engine = ScriptedEngine::new(|_| {
            Ok(RowCursor::single(ResultSet::new(
                vec!["id".into()],
                vec![vec![Value::Int(7)], vec![Value::Int(3)]],
            )))
        });
        let cursor = engine.execute("SELECT id FROM products").await.unwrap();
        assert_eq!(cursor.ids().unwrap(), vec![7, 3]);
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let engine = ScriptedEngine::empty();
        assert!(engine.healthy().await);
        engine.set_healthy(false);
        assert!(!engine.healthy().await);
        assert_eq!(engine.health_checks(), 2);
    }

    #[tokio::test]
    async fn test_failing_engine() {
        let engine = ScriptedEngine::failing(EngineError::Unreachable("down".into()));
        let err = engine.execute("SELECT id FROM products").await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
