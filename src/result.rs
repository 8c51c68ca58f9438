// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Engine,
    Cache,
    /// Origin store, engine unavailable
    Fallback,
    /// Answered without any query (e.g., empty include list)
    ShortCircuit,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
            Self::ShortCircuit => "short_circuit",
        }
    }
}

/// One page of search results.
///
/// `total` is always the size of the whole match set, never the page length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: u64,
    /// Document ids of the requested page, in final order
    pub ids: Vec<i64>,
    /// Relevance per id, when the engine ranked the page
    pub scores: BTreeMap<i64, f64>,
    pub latency: Duration,
    /// Served by the origin store with degraded relevance
    pub fallback: bool,
    pub source: SearchSource,
    pub page: u32,
    pub page_size: u32,
    pub max_pages: u64,
}

impl SearchResult {
    pub fn new(total: u64, ids: Vec<i64>, page: u32, page_size: u32, source: SearchSource) -> Self {
        Self {
            total,
            ids,
            scores: BTreeMap::new(),
            latency: Duration::ZERO,
            fallback: source == SearchSource::Fallback,
            source,
            page,
            page_size,
            max_pages: max_pages(total, page_size),
        }
    }

    pub fn empty(page: u32, page_size: u32, source: SearchSource) -> Self {
        Self::new(0, Vec::new(), page, page_size, source)
    }

    pub fn with_scores(mut self, scores: BTreeMap<i64, f64>) -> Self {
        self.scores = scores;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn score(&self, id: i64) -> Option<f64> {
        self.scores.get(&id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `ceil(total / page_size)`
pub fn max_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}
