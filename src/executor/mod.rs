// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Executor
//!
//! Orchestrates one search from raw inputs to an ordered, counted page.
//!
//! # State Machine
//!
//! ```text
//! BuildingSpec ──→ Expanding ──┬─ cache hit ─────────────────────────→ Done
//!      │                       │
//!      │                       ├─ engine healthy ──→ Executing ─┬─ ok ──→ Reconciling ──→ Done
//!      │                       │                                └─ err ─┐
//!      │                       └─ engine unhealthy ──→ Fallback ←───────┘
//!      │                                                   └──────────→ Reconciling
//!      └─ empty include list ──────────────────────────────────────────→ Done
//! ```
//!
//! Engine failures never reach the caller: the request is answered by the
//! origin store (`fallback = true`) or, without one, with an empty page.
//! Only a request that cannot become a [`FilterSpec`] is an error.

pub mod fallback;
pub mod pagination;
pub mod reconcile;
pub mod request;

pub use fallback::{connect_origin, Document, FallbackPage, FallbackQuery, OriginStore, SqlOriginStore};
pub use pagination::{fetch_ranked_page, fetch_stock_priority_page, PageRows};
pub use reconcile::{order_by_ids, CustomPositions};
pub use request::{SearchRequest, Selection, TaxonomyContext};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheHooks, InMemoryResultCache, InvalidationEvent, ResultCache};
use crate::config::SearchConfig;
use crate::engine::{EngineClient, GuardedEngine, SqlEngineClient};
use crate::error::{SearchError, StoreError};
use crate::facets::FacetCounter;
use crate::metrics;
use crate::query::{FilterSpec, IndexSchema, QueryCompiler};
use crate::resilience::EngineHealth;
use crate::result::{SearchResult, SearchSource};
use crate::synonyms::{SqlSynonymSource, SynonymCache, SynonymExpander};

/// Request lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    BuildingSpec,
    Expanding,
    Executing,
    Fallback,
    Reconciling,
    Done,
}

impl std::fmt::Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildingSpec => write!(f, "BuildingSpec"),
            Self::Expanding => write!(f, "Expanding"),
            Self::Executing => write!(f, "Executing"),
            Self::Fallback => write!(f, "Fallback"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// A phase together with the data it works on.
enum Stage {
    BuildingSpec(FilterSpec),
    Expanding(FilterSpec),
    Executing(FilterSpec),
    Fallback(FilterSpec, &'static str),
    Reconciling(FilterSpec, SearchResult),
    Done(SearchResult),
}

impl Stage {
    fn state(&self) -> SearchState {
        match self {
            Self::BuildingSpec(_) => SearchState::BuildingSpec,
            Self::Expanding(_) => SearchState::Expanding,
            Self::Executing(_) => SearchState::Executing,
            Self::Fallback(..) => SearchState::Fallback,
            Self::Reconciling(..) => SearchState::Reconciling,
            Self::Done(_) => SearchState::Done,
        }
    }
}

pub struct SearchExecutor {
    config: SearchConfig,
    engine: Arc<GuardedEngine>,
    compiler: Arc<QueryCompiler>,
    synonyms: Arc<SynonymCache>,
    expander: SynonymExpander,
    facets: FacetCounter,
    origin: Option<Arc<dyn OriginStore>>,
    cache: Option<Arc<dyn ResultCache>>,
    hooks: Option<CacheHooks>,
    positions: Option<Arc<CustomPositions>>,
}

impl SearchExecutor {
    /// Executor over `engine`, which is wrapped in a circuit breaker and a
    /// cached health check from `config`. No synonyms, origin store or
    /// result cache until added.
    pub fn new(config: SearchConfig, engine: Arc<dyn EngineClient>, schema: IndexSchema) -> Result<Self, SearchError> {
        let compiler = Arc::new(QueryCompiler::new(schema, &config)?);
        let engine = Arc::new(GuardedEngine::new(
            engine,
            config.circuit(),
            EngineHealth::new(config.health_check_interval()),
        ));
        let synonyms = Arc::new(SynonymCache::disabled());
        let expander = SynonymExpander::new(synonyms.clone(), config.wildcard_min_len, config.wildcard_max_len);
        let facets =
            FacetCounter::new(engine.clone(), compiler.clone()).with_limit(config.facet_limit);

        Ok(Self {
            config,
            engine,
            compiler,
            synonyms,
            expander,
            facets,
            origin: None,
            cache: None,
            hooks: None,
            positions: None,
        })
    }

    /// Production wiring: engine over its SQL listener, origin store,
    /// synonym table and result cache per `config`.
    ///
    /// The engine connects lazily; the origin store (when configured) is
    /// connected with startup retry and fails the call if unreachable.
    pub async fn connect(config: SearchConfig, schema: IndexSchema) -> Result<Self, SearchError> {
        let engine = Arc::new(SqlEngineClient::connect_lazy(&config)?);
        let result_cache = Arc::new(InMemoryResultCache::new(config.result_cache_max_entries));
        let mut executor = Self::new(config.clone(), engine, schema)?.with_result_cache(result_cache);

        if let Some(url) = config.origin_url.as_deref() {
            let origin = SqlOriginStore::connect(url, &config.table_prefix).await?;
            let source = Arc::new(SqlSynonymSource::new(origin.pool(), &config.table_prefix));
            executor = executor
                .with_synonyms(Arc::new(SynonymCache::new(source, config.synonym_ttl())))
                .with_origin(Arc::new(origin));
            info!(index = %config.index, "Search executor connected with origin fallback");
        } else {
            warn!(index = %config.index, "No origin store configured, engine failures return empty pages");
        }
        Ok(executor)
    }

    pub fn with_synonyms(mut self, synonyms: Arc<SynonymCache>) -> Self {
        self.expander = SynonymExpander::new(synonyms.clone(), self.config.wildcard_min_len, self.config.wildcard_max_len);
        self.synonyms = synonyms;
        if let Some(cache) = &self.cache {
            self.hooks = Some(CacheHooks::new(&self.config.index, cache.clone(), self.synonyms.clone()));
        }
        self
    }

    pub fn with_origin(mut self, origin: Arc<dyn OriginStore>) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_result_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.hooks = Some(CacheHooks::new(&self.config.index, cache.clone(), self.synonyms.clone()));
        self.cache = Some(cache);
        self
    }

    pub fn with_custom_positions(mut self, positions: CustomPositions) -> Self {
        self.positions = Some(Arc::new(positions));
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn engine(&self) -> &GuardedEngine {
        &self.engine
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// Search from raw request inputs.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let spec = request.into_spec(&self.config)?;
        Ok(self.run(Stage::BuildingSpec(spec)).await)
    }

    /// Search from an already built [`FilterSpec`], normalized first.
    pub async fn search_spec(&self, spec: FilterSpec) -> SearchResult {
        self.run(Stage::BuildingSpec(spec)).await
    }

    async fn run(&self, mut stage: Stage) -> SearchResult {
        let started = Instant::now();

        let result = loop {
            let from = stage.state();
            stage = match stage {
                Stage::BuildingSpec(mut spec) => {
                    spec.normalize(self.config.default_page_size, self.config.max_page_size);
                    spec.prioritize_in_stock = spec.prioritize_in_stock && self.config.supports_stock(&spec.post_types);
                    if matches!(spec.include_ids.as_deref(), Some([])) {
                        Stage::Done(SearchResult::empty(spec.page, spec.page_size, SearchSource::ShortCircuit))
                    } else {
                        Stage::Expanding(spec)
                    }
                }
                Stage::Expanding(mut spec) => {
                    if let Some(text) = spec.text.clone() {
                        spec.expanded = Some(self.expander.expand(&text).await);
                    }
                    match self.cached(&spec).await {
                        Some(hit) => Stage::Done(hit),
                        None if self.engine.healthy().await => Stage::Executing(spec),
                        None => Stage::Fallback(spec, "engine_unhealthy"),
                    }
                }
                Stage::Executing(spec) => match self.execute(&spec).await {
                    Ok(result) => Stage::Reconciling(spec, result),
                    Err(e) => {
                        let reason = e.reason();
                        warn!(error = %e, reason, "Engine search failed, falling back");
                        Stage::Fallback(spec, reason)
                    }
                },
                Stage::Fallback(spec, reason) => {
                    let result = self.fallback(&spec, reason).await;
                    Stage::Reconciling(spec, result)
                }
                Stage::Reconciling(spec, mut result) => {
                    self.apply_positions(&spec, &mut result);
                    if result.source == SearchSource::Engine {
                        self.store(&spec, &result).await;
                    }
                    Stage::Done(result)
                }
                Stage::Done(result) => break result,
            };
            debug!(from = %from, to = %stage.state(), "Search state");
        };

        let result = result.with_latency(started.elapsed());
        let source = result.source.as_str();
        debug!(
            source,
            total = result.total,
            returned = result.ids.len(),
            latency_ms = result.latency.as_millis() as u64,
            "Search complete"
        );
        metrics::record_search(source, if result.fallback { "degraded" } else { "success" });
        metrics::record_search_latency(source, result.latency);
        metrics::record_search_results(result.total);
        result
    }

    async fn execute(&self, spec: &FilterSpec) -> Result<SearchResult, SearchError> {
        let rows = if spec.prioritize_in_stock {
            fetch_stock_priority_page(self.engine.as_ref(), &self.compiler, spec).await?
        } else {
            fetch_ranked_page(self.engine.as_ref(), &self.compiler, spec).await?
        };
        Ok(SearchResult::new(rows.total, rows.ids, spec.page, spec.page_size, SearchSource::Engine)
            .with_scores(rows.scores))
    }

    async fn fallback(&self, spec: &FilterSpec, reason: &'static str) -> SearchResult {
        metrics::record_fallback(reason);
        let Some(origin) = &self.origin else {
            warn!(reason, "No origin store for fallback, returning empty page");
            return SearchResult::empty(spec.page, spec.page_size, SearchSource::Fallback);
        };

        match origin.search(&FallbackQuery::from_spec(spec)).await {
            Ok(page) => {
                info!(reason, total = page.total, "Served search from origin store");
                SearchResult::new(page.total, page.ids, spec.page, spec.page_size, SearchSource::Fallback)
            }
            Err(e) => {
                warn!(error = %e, reason, "Origin fallback search failed, returning empty page");
                SearchResult::empty(spec.page, spec.page_size, SearchSource::Fallback)
            }
        }
    }

    fn apply_positions(&self, spec: &FilterSpec, result: &mut SearchResult) {
        if let (Some(positions), Some(category)) = (&self.positions, spec.category_id) {
            positions.apply(category, &mut result.ids);
        }
    }

    fn key(&self, spec: &FilterSpec) -> String {
        cache_key(&self.config.index, &self.compiler.compile(spec), spec.prioritize_in_stock)
    }

    async fn cached(&self, spec: &FilterSpec) -> Option<SearchResult> {
        let cache = self.cache.as_ref()?;
        let hit = cache.get(&self.key(spec)).await;
        metrics::record_result_cache(hit.is_some());
        hit.map(|mut result| {
            result.source = SearchSource::Cache;
            result
        })
    }

    async fn store(&self, spec: &FilterSpec, result: &SearchResult) {
        if let Some(cache) = &self.cache {
            cache.set(&self.key(spec), result, self.config.result_cache_ttl()).await;
        }
    }

    /// Per-term counts for each taxonomy, each computed without its own
    /// filter. Empty maps when the engine is unavailable.
    pub async fn facets<S: AsRef<str>>(
        &self,
        spec: FilterSpec,
        taxonomies: &[S],
    ) -> BTreeMap<String, HashMap<i64, u64>> {
        let mut spec = spec;
        spec.normalize(self.config.default_page_size, self.config.max_page_size);

        if !self.engine.healthy().await {
            warn!("Engine unhealthy, returning empty facet counts");
            return taxonomies
                .iter()
                .map(|t| (t.as_ref().to_string(), HashMap::new()))
                .collect();
        }
        if let Some(text) = spec.text.clone() {
            spec.expanded = Some(self.expander.expand(&text).await);
        }
        self.facets.facet_counts_for(&spec, taxonomies).await
    }

    /// Load the documents of `result`, in result order.
    pub async fn hydrate(&self, result: &SearchResult) -> Result<Vec<Document>, SearchError> {
        let origin = self.origin.as_ref().ok_or(StoreError::NotConfigured)?;
        let documents = origin.fetch_by_ids(&result.ids).await?;
        Ok(order_by_ids(&result.ids, documents, |d| d.id))
    }

    /// Apply a catalog write; returns how many cached results were dropped.
    pub async fn invalidate(&self, event: &InvalidationEvent) -> usize {
        match &self.hooks {
            Some(hooks) => hooks.on_event(event).await,
            None => {
                if *event == InvalidationEvent::SynonymsChanged {
                    self.synonyms.invalidate();
                }
                0
            }
        }
    }
}
