// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for catalog search.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `catalog_search_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `source`: engine, cache, fallback, short_circuit
//! - `status`: success, error, unreachable, rejected
//! - `reason`: why a request fell back

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// SEARCH - Request outcomes
// ═══════════════════════════════════════════════════════════════════════════

/// Record a completed search request
pub fn record_search(source: &str, status: &str) {
    counter!(
        "catalog_search_requests_total",
        "source" => source.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record end-to-end search latency
pub fn record_search_latency(source: &str, duration: Duration) {
    histogram!(
        "catalog_search_request_seconds",
        "source" => source.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record total matches of a search
pub fn record_search_results(total: u64) {
    histogram!("catalog_search_results").record(total as f64);
}

/// Record a request served by the origin store
pub fn record_fallback(reason: &str) {
    counter!(
        "catalog_search_fallbacks_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a stock-priority page and the round trips it cost
pub fn record_stock_priority_page(round_trips: usize) {
    histogram!("catalog_search_stock_priority_round_trips").record(round_trips as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE - Wire-level metrics
// ═══════════════════════════════════════════════════════════════════════════

/// Record one engine statement
pub fn record_engine_query(status: &str, duration: Duration) {
    counter!(
        "catalog_search_engine_queries_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("catalog_search_engine_query_seconds").record(duration.as_secs_f64());
}

/// Set engine health (1 = healthy, 0 = unhealthy)
pub fn set_engine_healthy(healthy: bool) {
    gauge!("catalog_search_engine_healthy").set(if healthy { 1.0 } else { 0.0 });
}

/// Record circuit breaker call outcome
pub fn record_circuit_breaker_call(circuit: &str, outcome: &str) {
    counter!(
        "catalog_search_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// FACETS
// ═══════════════════════════════════════════════════════════════════════════

/// Record one facet aggregate query
pub fn record_facet_query(taxonomy: &str, status: &str) {
    counter!(
        "catalog_search_facet_queries_total",
        "taxonomy" => taxonomy.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHES - Result cache and synonym map
// ═══════════════════════════════════════════════════════════════════════════

/// Record result cache hit/miss
pub fn record_result_cache(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(
        "catalog_search_result_cache_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Set result cache stats gauges
pub fn set_result_cache_stats(entries: usize, hit_rate: f64) {
    gauge!("catalog_search_result_cache_entries").set(entries as f64);
    gauge!("catalog_search_result_cache_hit_rate").set(hit_rate);
}

/// Record result cache invalidation
pub fn record_cache_invalidation(event: &str, removed: usize) {
    counter!(
        "catalog_search_result_cache_invalidated_total",
        "event" => event.to_string()
    )
    .increment(removed as u64);
}

/// Record a synonym map rebuild
pub fn record_synonym_rebuild(status: &str, duration: Duration) {
    counter!(
        "catalog_search_synonym_rebuilds_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("catalog_search_synonym_rebuild_seconds").record(duration.as_secs_f64());
}
