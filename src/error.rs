// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

use crate::engine::EngineError;
use crate::resilience::CircuitError;

/// Origin store (fallback search, hydration, synonym table) failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("origin store not configured")]
    NotConfigured,
    #[error("origin store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Errors surfaced by the search subsystem.
///
/// Engine failures are normally absorbed by the fallback path; a caller of
/// [`crate::SearchExecutor::search`] only sees the variants that leave no
/// result to return.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Connect failure, timeout, or an open circuit
    #[error("search engine unreachable: {0}")]
    EngineUnreachable(String),
    /// The engine rejected the statement
    #[error("search engine query error: {0}")]
    EngineQuery(String),
    #[error(transparent)]
    Origin(#[from] StoreError),
    /// The request could not be turned into a filter spec at all
    #[error("invalid filter spec: {0}")]
    InvalidFilterSpec(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl SearchError {
    /// Whether this failure should send the request down the fallback path.
    #[must_use]
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::EngineUnreachable(_) | Self::EngineQuery(_))
    }

    /// Label for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EngineUnreachable(_) => "engine_unreachable",
            Self::EngineQuery(_) => "engine_query",
            Self::Origin(_) => "origin",
            Self::InvalidFilterSpec(_) => "invalid_filter_spec",
            Self::Config(_) => "config",
        }
    }
}

impl From<EngineError> for SearchError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unreachable(msg) => SearchError::EngineUnreachable(msg),
            EngineError::Query { message } => SearchError::EngineQuery(message),
            EngineError::Decode(msg) => SearchError::EngineQuery(msg),
        }
    }
}

impl From<CircuitError<EngineError>> for SearchError {
    fn from(err: CircuitError<EngineError>) -> Self {
        match err {
            CircuitError::Rejected => SearchError::EngineUnreachable("circuit breaker open".into()),
            CircuitError::Inner(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_trigger_fallback() {
        let err: SearchError = EngineError::Unreachable("refused".into()).into();
        assert!(err.triggers_fallback());
        assert_eq!(err.reason(), "engine_unreachable");

        let err: SearchError = EngineError::Query { message: "unknown field".into() }.into();
        assert!(err.triggers_fallback());

        let err: SearchError = CircuitError::<EngineError>::Rejected.into();
        assert_eq!(err, SearchError::EngineUnreachable("circuit breaker open".into()));
    }

    #[test]
    fn test_origin_errors_do_not_trigger_fallback() {
        let err: SearchError = StoreError::NotConfigured.into();
        assert!(!err.triggers_fallback());
        assert_eq!(err.to_string(), "origin store not configured");
    }
}
