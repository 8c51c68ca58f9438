// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Synonym map cache.
//!
//! The map is rebuilt from its source at most once per TTL and swapped in
//! whole: readers clone an `Arc` under a short read lock and never observe a
//! half-built map.
//!
//! # Flow
//!
//! ```text
//! get()
//!   │
//!   ├─→ snapshot fresh? ──yes──→ Arc<SynonymMap>
//!   │
//!   └─→ rebuild lock (single flight)
//!          ├─→ re-check freshness
//!          ├─→ source.load()  (outside any map lock)
//!          └─→ generation unchanged? swap in : hand out without caching
//! ```
//!
//! `invalidate()` bumps the generation and drops the snapshot, so a rebuild
//! that raced with a synonym write cannot install pre-write data.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::metrics;

/// One row of the synonym table: a term and its synonyms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymGroup {
    pub term: String,
    pub synonyms: Vec<String>,
}

impl SynonymGroup {
    pub fn new(term: impl Into<String>, synonyms: Vec<String>) -> Self {
        Self {
            term: term.into(),
            synonyms,
        }
    }

    fn members(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.term)
            .chain(self.synonyms.iter())
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

/// Bidirectional term ↔ synonym lookup, keys lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymMap {
    entries: HashMap<String, Vec<String>>,
}

impl SynonymMap {
    pub fn from_groups(groups: &[SynonymGroup]) -> Self {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for group in groups {
            let members: Vec<String> = group.members().collect();
            for member in &members {
                let slot = entries.entry(member.clone()).or_default();
                for other in &members {
                    if other != member && !slot.contains(other) {
                        slot.push(other.clone());
                    }
                }
            }
        }
        entries.retain(|_, v| !v.is_empty());
        Self { entries }
    }

    /// Synonyms of `term` (never including `term` itself).
    pub fn lookup(&self, term: &str) -> &[String] {
        self.entries
            .get(&term.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where synonym groups are loaded from.
#[async_trait]
pub trait SynonymSource: Send + Sync {
    async fn load(&self) -> Result<Vec<SynonymGroup>, StoreError>;
}

/// Fixed in-memory synonym list.
#[derive(Debug, Clone, Default)]
pub struct StaticSynonyms {
    groups: Vec<SynonymGroup>,
}

impl StaticSynonyms {
    pub fn new(groups: Vec<SynonymGroup>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl SynonymSource for StaticSynonyms {
    async fn load(&self) -> Result<Vec<SynonymGroup>, StoreError> {
        Ok(self.groups.clone())
    }
}

/// How long a failed load is remembered before the source is asked again.
const LOAD_RETRY_AFTER: Duration = Duration::from_secs(30);

struct Snapshot {
    map: Arc<SynonymMap>,
    built_at: Instant,
    /// Full TTL after a load, the shorter retry window after a failure
    valid_for: Duration,
}

pub struct SynonymCache {
    source: Arc<dyn SynonymSource>,
    ttl: Duration,
    current: RwLock<Option<Snapshot>>,
    /// Bumped on every invalidation
    generation: AtomicU64,
    /// Serializes rebuilds (prevent thundering herd)
    rebuild: Mutex<()>,
    rebuilds: AtomicU64,
}

impl SynonymCache {
    pub fn new(source: Arc<dyn SynonymSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            rebuild: Mutex::new(()),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// A cache with no synonyms at all.
    pub fn disabled() -> Self {
        Self::new(Arc::new(StaticSynonyms::default()), Duration::MAX)
    }

    /// Current map, rebuilding it first if missing or older than the TTL.
    pub async fn get(&self) -> Arc<SynonymMap> {
        if let Some(map) = self.fresh() {
            return map;
        }

        let _guard = self.rebuild.lock().await;
        if let Some(map) = self.fresh() {
            return map;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let start = Instant::now();
        match self.source.load().await {
            Ok(groups) => {
                let map = Arc::new(SynonymMap::from_groups(&groups));
                self.rebuilds.fetch_add(1, Ordering::Relaxed);
                metrics::record_synonym_rebuild("success", start.elapsed());

                if self.generation.load(Ordering::Acquire) == generation {
                    self.install(Arc::clone(&map), self.ttl);
                    info!(terms = map.len(), "Synonym map rebuilt");
                } else {
                    debug!("Synonym map invalidated during rebuild, not caching");
                }
                map
            }
            Err(e) => {
                // Keep serving the stale map (or none) until the retry window passes.
                let retry_after = self.ttl.min(LOAD_RETRY_AFTER);
                warn!(
                    error = %e,
                    retry_after_secs = retry_after.as_secs(),
                    "Synonym load failed, expanding without fresh synonyms"
                );
                metrics::record_synonym_rebuild("error", start.elapsed());
                let map = self
                    .current
                    .read()
                    .as_ref()
                    .map(|s| Arc::clone(&s.map))
                    .unwrap_or_default();
                if self.generation.load(Ordering::Acquire) == generation {
                    self.install(Arc::clone(&map), retry_after);
                }
                map
            }
        }
    }

    fn install(&self, map: Arc<SynonymMap>, valid_for: Duration) {
        *self.current.write() = Some(Snapshot {
            map,
            built_at: Instant::now(),
            valid_for,
        });
    }

    /// Drop the cached map; the next `get` reloads from the source.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.current.write() = None;
        debug!("Synonym cache invalidated");
    }

    /// Number of successful rebuilds so far.
    #[must_use]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn fresh(&self) -> Option<Arc<SynonymMap>> {
        self.current
            .read()
            .as_ref()
            .filter(|s| s.built_at.elapsed() < s.valid_for)
            .map(|s| Arc::clone(&s.map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        loads: AtomicUsize,
        groups: parking_lot::Mutex<Vec<SynonymGroup>>,
    }

    #[async_trait]
    impl SynonymSource for CountingSource {
        async fn load(&self) -> Result<Vec<SynonymGroup>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.groups.lock().clone())
        }
    }

    #[derive(Default)]
    struct BrokenSource {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl SynonymSource for BrokenSource {
        async fn load(&self) -> Result<Vec<SynonymGroup>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("table missing".into()))
        }
    }

    fn counting(groups: Vec<SynonymGroup>) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            groups: parking_lot::Mutex::new(groups),
        })
    }

    #[test]
    fn test_map_is_bidirectional() {
        let map = SynonymMap::from_groups(&[SynonymGroup::new(
            "Red",
            vec!["crimson".into(), " scarlet ".into()],
        )]);
        assert_eq!(map.lookup("red"), ["crimson", "scarlet"]);
        assert_eq!(map.lookup("SCARLET"), ["red", "crimson"]);
        assert!(map.lookup("blue").is_empty());
    }

    #[test]
    fn test_groups_sharing_a_term_merge() {
        let map = SynonymMap::from_groups(&[
            SynonymGroup::new("sofa", vec!["couch".into()]),
            SynonymGroup::new("sofa", vec!["settee".into()]),
        ]);
        assert_eq!(map.lookup("sofa"), ["couch", "settee"]);
    }

    #[tokio::test]
    async fn test_cached_within_ttl() {
        let source = counting(vec![SynonymGroup::new("red", vec!["crimson".into()])]);
        let cache = SynonymCache::new(source.clone(), Duration::from_secs(60));

        cache.get().await;
        cache.get().await;
        cache.get().await;

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.rebuilds(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_rebuilds() {
        let source = counting(vec![]);
        let cache = SynonymCache::new(source.clone(), Duration::from_millis(20));

        cache.get().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get().await;

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_writes_immediately() {
        let source = counting(vec![SynonymGroup::new("red", vec!["crimson".into()])]);
        let cache = SynonymCache::new(source.clone(), Duration::from_secs(3600));

        assert_eq!(cache.get().await.lookup("red"), ["crimson"]);

        source
            .groups
            .lock()
            .push(SynonymGroup::new("red", vec!["scarlet".into()]));
        cache.invalidate();

        assert_eq!(cache.get().await.lookup("red"), ["crimson", "scarlet"]);
    }

    #[tokio::test]
    async fn test_load_failure_degrades_to_empty() {
        let cache = SynonymCache::new(Arc::new(BrokenSource::default()), Duration::from_secs(60));
        let map = cache.get().await;
        assert!(map.is_empty());
        assert_eq!(cache.rebuilds(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_not_retried_every_get() {
        let source = Arc::new(BrokenSource::default());
        let cache = SynonymCache::new(source.clone(), Duration::from_secs(3600));

        for _ in 0..100 {
            assert!(cache.get().await.is_empty());
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_retried_after_window() {
        let source = Arc::new(BrokenSource::default());
        let cache = SynonymCache::new(source.clone(), Duration::from_millis(20));

        cache.get().await;
        cache.get().await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get().await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_clears_failed_load_window() {
        let source = Arc::new(BrokenSource::default());
        let cache = SynonymCache::new(source.clone(), Duration::from_secs(3600));

        cache.get().await;
        cache.invalidate();
        cache.get().await;
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_readers_single_rebuild() {
        let source = counting(vec![SynonymGroup::new("red", vec!["crimson".into()])]);
        let cache = Arc::new(SynonymCache::new(source.clone(), Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get().await.len() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 2);
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }
}
