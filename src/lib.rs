//! # Catalog Search
//!
//! A search planner for storefront catalogs backed by an external full-text
//! engine that speaks SQL over the MySQL wire protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Search Executor                       │
//! │  • SearchRequest → normalized FilterSpec                    │
//! │  • BuildingSpec → Expanding → Executing/Fallback → Done     │
//! └─────────────────────────────────────────────────────────────┘
//!            │                    │                    │
//!            ▼                    ▼                    ▼
//! ┌──────────────────┐ ┌────────────────────┐ ┌──────────────────┐
//! │ Synonym Expander │ │   Query Compiler   │ │   Result Cache   │
//! │ • TTL'd map      │ │ • MATCH + WHERE    │ │ • sha256 keys    │
//! │ • OR groups      │ │ • COUNT / FACET    │ │ • invalidation   │
//! └──────────────────┘ └────────────────────┘ └──────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Guarded Engine Client                       │
//! │  • Circuit breaker + cached health check                    │
//! │  • Pooled connections, one per statement                    │
//! └─────────────────────────────────────────────────────────────┘
//!                                 │ unhealthy / error
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Origin Store (fallback + hydration)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_search::{IndexSchema, SearchConfig, SearchExecutor, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SearchConfig {
//!         engine_url: "mysql://127.0.0.1:9306".into(),
//!         origin_url: Some("mysql://wp:wp@localhost/wordpress".into()),
//!         prioritize_in_stock: true,
//!         ..Default::default()
//!     };
//!     let schema = IndexSchema::products(&config.index, &["pa_color", "pa_size"]);
//!     let executor = SearchExecutor::connect(config, schema).await.expect("Failed to connect");
//!
//!     let request = SearchRequest::from_params([("s", "red dress"), ("filter_color", "5,7")]);
//!     let result = executor.search(&request).await.expect("Invalid request");
//!     println!("{} of {} (fallback: {})", result.ids.len(), result.total, result.fallback);
//! }
//! ```
//!
//! ## Features
//!
//! - **Stock-Priority Paging**: in-stock first across all pages, at most 3 round trips
//! - **Single-Query Facets**: one aggregate statement per taxonomy
//! - **Synonym Expansion**: OR groups per token, prefix wildcards for short tokens
//! - **Origin Fallback**: degraded results instead of errors when the engine is down
//! - **Circuit Breaker**: stop hammering an engine that keeps failing
//!
//! ## Modules
//!
//! - [`executor`]: The [`SearchExecutor`] and its request, paging and fallback parts
//! - [`query`]: Filter spec, index schema and the query compiler
//! - [`engine`]: Engine client trait, MySQL-protocol client, circuit-breaker wrapper
//! - [`synonyms`]: Synonym cache and query expansion
//! - [`facets`]: Facet counts
//! - [`cache`]: Result cache hooks
//! - [`resilience`]: Circuit breaker, retry, engine health

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod facets;
pub mod metrics;
pub mod query;
pub mod resilience;
pub mod result;
pub mod synonyms;

pub use cache::{CacheHooks, InMemoryResultCache, InvalidationEvent, ResultCache};
pub use config::{FieldWeight, SearchConfig};
pub use engine::{EngineClient, EngineError, GuardedEngine, RowCursor, ScriptedEngine, SqlEngineClient};
pub use error::{SearchError, StoreError};
pub use executor::{
    CustomPositions, Document, OriginStore, SearchExecutor, SearchRequest, SearchState, Selection,
    SqlOriginStore, TaxonomyContext,
};
pub use facets::FacetCounter;
pub use query::{Combinator, FilterSpec, IndexSchema, OrderBy, QueryCompiler, SortKey, StockStatus};
pub use resilience::{CircuitBreaker, CircuitConfig, CircuitError, RetryConfig};
pub use result::{SearchResult, SearchSource};
pub use synonyms::{SqlSynonymSource, StaticSynonyms, SynonymCache, SynonymGroup};
