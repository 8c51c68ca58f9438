// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Result Cache
//!
//! Hook points for an external result cache, plus a bounded in-process
//! implementation.
//!
//! # Keys
//!
//! Keys are derived from the *compiled* statements, not from raw request
//! parameters, so irrelevant parameter noise never splits the cache:
//!
//! ```text
//! catalog_search:<index>:<sha256(select \n count \n stock-priority flag)>
//! ```
//!
//! # Invalidation
//!
//! ```text
//! DocumentChanged / StockChanged / SettingsChanged ─→ invalidate("catalog_search:<index>:*")
//! SynonymsChanged ─→ same, and drop the synonym map immediately
//! ```
//!
//! Keys are opaque hashes, so any catalog write flushes the whole index
//! prefix; there is no per-document targeting.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::metrics;
use crate::query::CompiledQuery;
use crate::result::SearchResult;
use crate::synonyms::SynonymCache;

const KEY_NAMESPACE: &str = "catalog_search";

/// External cache collaborator.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<SearchResult>;

    async fn set(&self, key: &str, result: &SearchResult, ttl: Duration);

    /// Remove every key matching `pattern` (`*` suffix = prefix match).
    /// Returns the number of entries removed.
    async fn invalidate(&self, pattern: &str) -> usize;
}

/// `catalog_search:<index>:`
pub fn key_prefix(index: &str) -> String {
    format!("{}:{}:", KEY_NAMESPACE, index)
}

/// Deterministic key for one compiled page request.
pub fn cache_key(index: &str, compiled: &CompiledQuery, prioritize_in_stock: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(compiled.select.as_bytes());
    hasher.update(b"\n");
    hasher.update(compiled.count.as_bytes());
    hasher.update(b"\n");
    hasher.update(if prioritize_in_stock { b"stock:1" } else { b"stock:0" });
    format!("{}{}", key_prefix(index), hex::encode(hasher.finalize()))
}

/// Writes that make cached results stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    DocumentChanged(i64),
    StockChanged(i64),
    SynonymsChanged,
    SettingsChanged,
}

impl InvalidationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentChanged(_) => "document_changed",
            Self::StockChanged(_) => "stock_changed",
            Self::SynonymsChanged => "synonyms_changed",
            Self::SettingsChanged => "settings_changed",
        }
    }

    /// Cache pattern this event invalidates.
    pub fn pattern(&self, index: &str) -> String {
        format!("{}*", key_prefix(index))
    }
}

/// Routes invalidation events to the result cache and the synonym cache.
pub struct CacheHooks {
    index: String,
    cache: Arc<dyn ResultCache>,
    synonyms: Arc<SynonymCache>,
}

impl CacheHooks {
    pub fn new(index: impl Into<String>, cache: Arc<dyn ResultCache>, synonyms: Arc<SynonymCache>) -> Self {
        Self {
            index: index.into(),
            cache,
            synonyms,
        }
    }

    /// Apply `event`; returns how many cached results were dropped.
    pub async fn on_event(&self, event: &InvalidationEvent) -> usize {
        if *event == InvalidationEvent::SynonymsChanged {
            self.synonyms.invalidate();
        }
        let removed = self.cache.invalidate(&event.pattern(&self.index)).await;
        debug!(event = event.as_str(), index = %self.index, removed, "Search cache invalidated");
        metrics::record_cache_invalidation(event.as_str(), removed);
        removed
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    result: SearchResult,
    expires_at: Instant,
    /// Matches the entry's slot in the eviction queue
    seq: u64,
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct ResultCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries found but past their TTL
    pub expired: u64,
    pub entry_count: usize,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

/// Bounded in-process [`ResultCache`] with TTL and oldest-first eviction.
pub struct InMemoryResultCache {
    cache: DashMap<String, CacheEntry>,
    /// Insertion order for eviction (oldest first); a slot whose seq no
    /// longer matches the live entry is stale and skipped
    order: Mutex<VecDeque<(String, u64)>>,
    next_seq: AtomicU64,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl InMemoryResultCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(0),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ResultCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        ResultCacheStats {
            hits,
            misses,
            expired: self.expired.load(Ordering::Relaxed),
            entry_count: self.cache.len(),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.order.lock().clear();
    }

    fn lookup(&self, key: &str) -> Option<SearchResult> {
        let now = Instant::now();
        if let Some(entry) = self.cache.get(key) {
            if entry.expires_at > now {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.result.clone());
            }
        }
        // Read lock released before removing.
        if let Some((_, stale)) = self.cache.remove_if(key, |_, e| e.expires_at <= now) {
            self.expired.fetch_add(1, Ordering::Relaxed);
            self.order
                .lock()
                .retain(|(k, seq)| !(k == key && *seq == stale.seq));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn store(&self, key: &str, result: &SearchResult, ttl: Duration) {
        let mut order = self.order.lock();

        if !self.cache.contains_key(key) {
            while self.cache.len() >= self.max_entries {
                let Some((old_key, seq)) = order.pop_front() else {
                    break;
                };
                self.cache.remove_if(&old_key, |_, e| e.seq == seq);
            }
        }

        let expires_at = Instant::now() + ttl;
        match self.cache.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                // Overwrites keep their place in the queue.
                let seq = occupied.get().seq;
                occupied.insert(CacheEntry {
                    result: result.clone(),
                    expires_at,
                    seq,
                });
            }
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert(CacheEntry {
                    result: result.clone(),
                    expires_at,
                    seq,
                });
                order.push_back((key.to_string(), seq));
            }
        }

        if order.len() > self.max_entries.saturating_mul(2) {
            order.retain(|(k, seq)| self.cache.get(k).is_some_and(|e| e.seq == *seq));
        }
    }

    fn remove_matching(&self, pattern: &str) -> usize {
        let before = self.cache.len();
        match pattern.strip_suffix('*') {
            Some(prefix) => self.cache.retain(|k, _| !k.starts_with(prefix)),
            None => {
                self.cache.remove(pattern);
            }
        }
        self.order
            .lock()
            .retain(|(k, seq)| self.cache.get(k).is_some_and(|e| e.seq == *seq));
        before.saturating_sub(self.cache.len())
    }
}

impl Default for InMemoryResultCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Option<SearchResult> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, result: &SearchResult, ttl: Duration) {
        self.store(key, result, ttl);
        let stats = self.stats();
        metrics::set_result_cache_stats(stats.entry_count, stats.hit_rate);
    }

    async fn invalidate(&self, pattern: &str) -> usize {
        self.remove_matching(pattern)
    }
}
