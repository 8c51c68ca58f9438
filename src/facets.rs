// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Facet Counter
//!
//! Per-term match counts for a taxonomy in a single aggregate round trip,
//! however many terms the taxonomy has. The engine returns the counts as a
//! second result set after the (one-row) id set:
//!
//! ```text
//! SELECT id FROM products WHERE ... LIMIT 0,1 FACET pa_color_ids ORDER BY COUNT(*) DESC LIMIT 100
//!
//! set 0: id            set 1: pa_color_ids | count(*)
//!        --                   ------------ | --------
//!        812                  5            | 31
//!                             7            | 12
//! ```
//!
//! Facets have no fallback path: any failure yields an empty map.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::{EngineClient, RowCursor, Value};
use crate::metrics;
use crate::query::{FilterSpec, QueryCompiler};

/// Taxonomy holding product categories.
pub const CATEGORY_TAXONOMY: &str = "product_cat";
/// Taxonomy holding product tags.
pub const TAG_TAXONOMY: &str = "product_tag";

/// Distinct values returned per facet.
const DEFAULT_FACET_LIMIT: usize = 1000;

pub struct FacetCounter {
    engine: Arc<dyn EngineClient>,
    compiler: Arc<QueryCompiler>,
    limit: usize,
}

impl FacetCounter {
    pub fn new(engine: Arc<dyn EngineClient>, compiler: Arc<QueryCompiler>) -> Self {
        Self {
            engine,
            compiler,
            limit: DEFAULT_FACET_LIMIT,
        }
    }

    /// Cap on distinct term ids returned per taxonomy.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Term id → matching document count, for `base` (which should already
    /// omit this taxonomy's own filter).
    pub async fn facet_counts(&self, base: &FilterSpec, taxonomy: &str) -> HashMap<i64, u64> {
        let Some(field) = self.field_for(taxonomy) else {
            warn!(taxonomy, "No MVA field for facet taxonomy, returning no counts");
            return HashMap::new();
        };

        let query = self.compiler.compile_facet(base, &field, self.limit);
        match self.engine.execute(&query).await {
            Ok(cursor) => match facet_set_counts(&cursor) {
                Some(counts) => {
                    debug!(taxonomy, terms = counts.len(), "Facet counts");
                    metrics::record_facet_query(taxonomy, "success");
                    counts
                }
                None => {
                    warn!(taxonomy, query = %query, "Facet response had no usable count set");
                    metrics::record_facet_query(taxonomy, "error");
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!(taxonomy, error = %e, query = %query, "Facet query failed");
                metrics::record_facet_query(taxonomy, "error");
                HashMap::new()
            }
        }
    }

    /// Counts for several taxonomies, one round trip each. Each taxonomy is
    /// counted with its own filter removed, so selecting a color still shows
    /// counts for the other colors.
    pub async fn facet_counts_for<S: AsRef<str>>(
        &self,
        spec: &FilterSpec,
        taxonomies: &[S],
    ) -> BTreeMap<String, HashMap<i64, u64>> {
        let mut all = BTreeMap::new();
        for taxonomy in taxonomies {
            let taxonomy = taxonomy.as_ref();
            let base = without_taxonomy(spec, taxonomy);
            let counts = self.facet_counts(&base, taxonomy).await;
            all.insert(taxonomy.to_string(), counts);
        }
        all
    }

    fn field_for(&self, taxonomy: &str) -> Option<String> {
        let schema = self.compiler.schema();
        match taxonomy {
            CATEGORY_TAXONOMY => schema.has_mva("category_ids").then(|| "category_ids".to_string()),
            TAG_TAXONOMY => schema.has_mva("tag_ids").then(|| "tag_ids".to_string()),
            other => schema.attribute_field(other),
        }
    }
}

/// Copy of `spec` without whatever filter `taxonomy` contributes.
fn without_taxonomy(spec: &FilterSpec, taxonomy: &str) -> FilterSpec {
    let mut base = spec.without_attribute(taxonomy);
    match taxonomy {
        CATEGORY_TAXONOMY => base.category_id = None,
        TAG_TAXONOMY => base.tag_id = None,
        _ => {}
    }
    base
}

/// `(value, count(*))` rows of the trailing FACET result set.
///
/// With no matches the engine sends the facet set back without columns.
fn facet_set_counts(cursor: &RowCursor) -> Option<HashMap<i64, u64>> {
    if cursor.sets().len() < 2 {
        return None;
    }
    let facet = cursor.last()?;
    if facet.is_empty() {
        return Some(HashMap::new());
    }
    facet.counts_by(0, Value::as_i64).ok()
}
