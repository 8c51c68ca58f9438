// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Synonym Module
//!
//! Query expansion against an owned, TTL-bounded synonym map.
//!
//! ```text
//! SynonymSource (SQL table / static list)
//!        │ load (at most once per TTL, or after invalidate)
//!        ▼
//! SynonymCache ──Arc<SynonymMap>──→ SynonymExpander ──→ ExpandedQuery
//! ```

pub mod cache;
pub mod expander;
pub mod sql;

pub use cache::{StaticSynonyms, SynonymCache, SynonymGroup, SynonymMap, SynonymSource};
pub use expander::{expand_with, query_tokens, ExpandedQuery, SynonymExpander, TermGroup, Variant};
pub use sql::SqlSynonymSource;
