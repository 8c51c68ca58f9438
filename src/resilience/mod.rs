// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Failure handling around the search engine and the origin store.

pub mod circuit_breaker;
pub mod health;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError, CircuitState};
pub use health::EngineHealth;
pub use retry::{retry, RetryConfig};
