// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine Client
//!
//! Thin access layer for the external full-text engine, which speaks a
//! SQL-like dialect over the MySQL wire protocol.
//!
//! # Statement Grammar
//!
//! ```text
//! SELECT id[, WEIGHT() AS relevance] FROM <index>
//!     WHERE [MATCH('<expr>') AND] <predicates>
//!     ORDER BY <col> <dir>, ... LIMIT <offset>,<count>
//!     [OPTION max_matches=N, field_weights=(...), ranker=...]
//!     [FACET <mva_field> ORDER BY COUNT(*) DESC LIMIT N]
//! SELECT COUNT(*) FROM <index> WHERE ...
//! SELECT stock_status, COUNT(*) AS cnt FROM <index> WHERE ... GROUP BY stock_status
//! ```
//!
//! Only [`EngineClient`] is seen by the rest of the crate; [`SqlEngineClient`]
//! talks to a real engine, [`GuardedEngine`] wraps either one in a circuit
//! breaker, and [`ScriptedEngine`] stands in for a real engine in tests.

pub mod escape;
pub mod guarded;
pub mod memory;
pub mod sql;
pub mod traits;

pub use escape::{escape_match, quote_literal};
pub use guarded::GuardedEngine;
pub use memory::ScriptedEngine;
pub use sql::SqlEngineClient;
pub use traits::{EngineClient, EngineError, ResultSet, RowCursor, Value};
