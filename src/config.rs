//! Configuration for catalog search.
//!
//! # Example
//!
//! ```
//! use catalog_search::SearchConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SearchConfig::default();
//! assert_eq!(config.index, "products");
//! assert_eq!(config.max_matches, 10_000);
//!
//! // Full config
//! let config = SearchConfig {
//!     engine_url: "mysql://127.0.0.1:9306".into(),
//!     origin_url: Some("mysql://wp:wp@localhost/wordpress".into()),
//!     default_page_size: 24,
//!     prioritize_in_stock: true,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitConfig;

/// Weight of one searchable full-text field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldWeight {
    pub field: String,
    pub weight: u32,
}

impl FieldWeight {
    pub fn new(field: impl Into<String>, weight: u32) -> Self {
        Self { field: field.into(), weight }
    }
}

/// Configuration for the search subsystem.
///
/// All fields have defaults suitable for a single storefront. At minimum,
/// set `engine_url` and `origin_url` for production use.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Engine SQL listener (e.g., "mysql://127.0.0.1:9306")
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// Origin store connection string, used by the fallback path
    #[serde(default)]
    pub origin_url: Option<String>,

    /// Engine index holding the documents
    #[serde(default = "default_index")]
    pub index: String,

    /// Origin table prefix (e.g., "wp_")
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Engine timeouts, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// How long a health check result is reused (0 = check every request)
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Engine connection pool size
    #[serde(default = "default_engine_max_connections")]
    pub engine_max_connections: u32,

    /// Engine scan window; raised per query to cover offset + page size
    #[serde(default = "default_max_matches")]
    pub max_matches: u64,

    /// Paging
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Full-text fields searched by MATCH, in emission order
    #[serde(default = "default_field_weights")]
    pub field_weights: Vec<FieldWeight>,

    /// Engine ranker
    #[serde(default = "default_ranker")]
    pub ranker: String,

    /// Tokens whose length falls in this range also get a prefix wildcard
    #[serde(default = "default_wildcard_min_len")]
    pub wildcard_min_len: usize,
    #[serde(default = "default_wildcard_max_len")]
    pub wildcard_max_len: usize,

    /// Synonym map TTL in seconds
    #[serde(default = "default_synonym_ttl_secs")]
    pub synonym_ttl_secs: u64,

    /// Distinct term ids returned per facet taxonomy
    #[serde(default = "default_facet_limit")]
    pub facet_limit: usize,

    /// Result cache
    #[serde(default = "default_result_cache_ttl_secs")]
    pub result_cache_ttl_secs: u64,
    #[serde(default = "default_result_cache_max_entries")]
    pub result_cache_max_entries: usize,

    /// Rank in-stock documents ahead of out-of-stock ones by default
    #[serde(default)]
    pub prioritize_in_stock: bool,

    /// Post types whose documents carry a stock status
    #[serde(default = "default_stock_post_types")]
    pub stock_post_types: Vec<String>,

    /// Engine circuit breaker
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "default_circuit_success_threshold")]
    pub circuit_success_threshold: u32,
    #[serde(default = "default_circuit_recovery_secs")]
    pub circuit_recovery_secs: u64,
}

fn default_engine_url() -> String { "mysql://127.0.0.1:9306".to_string() }
fn default_index() -> String { "products".to_string() }
fn default_table_prefix() -> String { "wp_".to_string() }
fn default_connect_timeout_ms() -> u64 { 1000 }
fn default_query_timeout_ms() -> u64 { 1500 }
fn default_health_timeout_ms() -> u64 { 250 }
fn default_health_check_interval_ms() -> u64 { 1000 }
fn default_engine_max_connections() -> u32 { 16 }
fn default_max_matches() -> u64 { 10_000 }
fn default_page_size() -> u32 { 12 }
fn default_max_page_size() -> u32 { 100 }
fn default_field_weights() -> Vec<FieldWeight> {
    vec![
        FieldWeight::new("title", 10),
        FieldWeight::new("sku", 8),
        FieldWeight::new("categories", 3),
        FieldWeight::new("tags", 2),
        FieldWeight::new("content", 1),
    ]
}
fn default_ranker() -> String { "proximity_bm25".to_string() }
fn default_wildcard_min_len() -> usize { 3 }
fn default_wildcard_max_len() -> usize { 4 }
fn default_synonym_ttl_secs() -> u64 { 3600 }
fn default_facet_limit() -> usize { 1000 }
fn default_result_cache_ttl_secs() -> u64 { 300 }
fn default_result_cache_max_entries() -> usize { 1000 }
fn default_stock_post_types() -> Vec<String> {
    vec!["product".to_string(), "product_variation".to_string()]
}
fn default_circuit_failure_threshold() -> u32 { 5 }
fn default_circuit_success_threshold() -> u32 { 2 }
fn default_circuit_recovery_secs() -> u64 { 30 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine_url: default_engine_url(),
            origin_url: None,
            index: default_index(),
            table_prefix: default_table_prefix(),
            connect_timeout_ms: default_connect_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            engine_max_connections: default_engine_max_connections(),
            max_matches: default_max_matches(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            field_weights: default_field_weights(),
            ranker: default_ranker(),
            wildcard_min_len: default_wildcard_min_len(),
            wildcard_max_len: default_wildcard_max_len(),
            synonym_ttl_secs: default_synonym_ttl_secs(),
            facet_limit: default_facet_limit(),
            result_cache_ttl_secs: default_result_cache_ttl_secs(),
            result_cache_max_entries: default_result_cache_max_entries(),
            prioritize_in_stock: false,
            stock_post_types: default_stock_post_types(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_success_threshold: default_circuit_success_threshold(),
            circuit_recovery_secs: default_circuit_recovery_secs(),
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    #[must_use]
    pub fn synonym_ttl(&self) -> Duration {
        Duration::from_secs(self.synonym_ttl_secs)
    }

    #[must_use]
    pub fn result_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.result_cache_ttl_secs)
    }

    #[must_use]
    pub fn circuit(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.circuit_failure_threshold,
            success_threshold: self.circuit_success_threshold,
            recovery_timeout: Duration::from_secs(self.circuit_recovery_secs),
        }
    }

    /// True when every given post type carries a stock status.
    pub fn supports_stock<S: AsRef<str>>(&self, post_types: &[S]) -> bool {
        !post_types.is_empty()
            && post_types
                .iter()
                .all(|pt| self.stock_post_types.iter().any(|s| s == pt.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_uses_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"index": "catalog"}"#).unwrap();
        assert_eq!(config.index, "catalog");
        assert_eq!(config.query_timeout_ms, 1500);
        assert_eq!(config.field_weights[0], FieldWeight::new("title", 10));
        assert!(!config.prioritize_in_stock);
    }

    #[test]
    fn test_field_weights_override() {
        let config: SearchConfig = serde_json::from_str(
            r#"{"field_weights": [{"field": "title", "weight": 5}]}"#,
        )
        .unwrap();
        assert_eq!(config.field_weights, vec![FieldWeight::new("title", 5)]);
    }

    #[test]
    fn test_supports_stock() {
        let config = SearchConfig::default();
        assert!(config.supports_stock(&["product"]));
        assert!(config.supports_stock(&["product", "product_variation"]));
        assert!(!config.supports_stock(&["product", "post"]));
        assert!(!config.supports_stock::<&str>(&[]));
    }
}
