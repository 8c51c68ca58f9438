// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Module
//!
//! Structured search description and its translation to engine statements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐
//! │ FilterSpec  │   │ IndexSchema │  (known MVA / attribute / text fields)
//! └──────┬──────┘   └──────┬──────┘
//!        │                 │
//!        └────────┬────────┘
//!                 ▼
//!         ┌───────────────┐
//!         │ QueryCompiler │ ──→ page / count / partition-count / facet SQL
//!         └───────────────┘
//! ```

pub mod compiler;
pub mod filter;
pub mod schema;

pub use compiler::{CompiledQuery, QueryCompiler, StockPartition, IN_STOCK};
pub use filter::{AttributeFilter, Combinator, FilterSpec, OrderBy, SortDirection, SortKey, StockStatus};
pub use schema::{mva_field_name, sanitize_taxonomy, IndexSchema};
