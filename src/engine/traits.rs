// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::escape::escape_match;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Connect failure, pool exhaustion or timeout.
    #[error("search engine unreachable: {0}")]
    Unreachable(String),
    /// The engine rejected the statement (syntax, unknown field, ...).
    #[error("search engine query failed: {message}")]
    Query { message: String },
    #[error("could not decode engine row: {0}")]
    Decode(String),
}

impl EngineError {
    /// Connection-level failures say nothing about the query itself.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// A single cell returned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result set of a statement: column names plus rows in engine order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Case-insensitive column lookup (`COUNT(*)` comes back as `count(*)`).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Integer values of one column, skipping NULLs.
    pub fn i64_column(&self, name: &str) -> Result<Vec<i64>, EngineError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| EngineError::Decode(format!("missing column '{}'", name)))?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(Value::as_i64))
            .collect())
    }

    /// Reads a `(value, count)` pair per row, the shape of GROUP BY and FACET output.
    pub fn counts_by<K, F>(&self, key_column: usize, key: F) -> Result<HashMap<K, u64>, EngineError>
    where
        K: std::hash::Hash + Eq,
        F: Fn(&Value) -> Option<K>,
    {
        let count_idx = self
            .column_index("count(*)")
            .or_else(|| self.column_index("cnt"))
            .ok_or_else(|| EngineError::Decode("missing count column".into()))?;

        let mut counts = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            let (Some(k), Some(n)) = (
                row.get(key_column).and_then(&key),
                row.get(count_idx).and_then(Value::as_i64),
            ) else {
                continue;
            };
            *counts.entry(k).or_insert(0) += n.max(0) as u64;
        }
        Ok(counts)
    }
}

/// Everything a statement returned, one entry per result set.
///
/// Plain selects produce a single set; `FACET` clauses append one set per facet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowCursor {
    sets: Vec<ResultSet>,
}

impl RowCursor {
    pub fn new(sets: Vec<ResultSet>) -> Self {
        Self { sets }
    }

    pub fn single(set: ResultSet) -> Self {
        Self { sets: vec![set] }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The primary result set (empty if the statement returned none).
    pub fn primary(&self) -> ResultSet {
        self.sets.first().cloned().unwrap_or_default()
    }

    pub fn last(&self) -> Option<&ResultSet> {
        self.sets.last()
    }

    pub fn sets(&self) -> &[ResultSet] {
        &self.sets
    }

    /// Document ids of the primary set, in engine order.
    pub fn ids(&self) -> Result<Vec<i64>, EngineError> {
        match self.sets.first() {
            Some(set) if !set.is_empty() => set.i64_column("id"),
            _ => Ok(Vec::new()),
        }
    }

    /// `(id, relevance)` pairs when the statement selected `WEIGHT() AS relevance`.
    pub fn scored_ids(&self) -> Result<Vec<(i64, Option<f64>)>, EngineError> {
        let Some(set) = self.sets.first() else {
            return Ok(Vec::new());
        };
        if set.is_empty() {
            return Ok(Vec::new());
        }
        let id_idx = set
            .column_index("id")
            .ok_or_else(|| EngineError::Decode("missing column 'id'".into()))?;
        let score_idx = set.column_index("relevance");
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                let id = row.get(id_idx).and_then(Value::as_i64)?;
                let score = score_idx.and_then(|i| row.get(i)).and_then(Value::as_f64);
                Some((id, score))
            })
            .collect())
    }

    /// First cell of the primary set, as returned by `SELECT COUNT(*)`.
    pub fn scalar_count(&self) -> Result<u64, EngineError> {
        self.sets
            .first()
            .and_then(|set| set.rows.first())
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| EngineError::Decode("count query returned no rows".into()))
    }
}

/// Client for the external full-text engine.
///
/// Implementations must be safe for concurrent use; a single wire connection
/// must never be shared between in-flight requests.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Execute one statement and return all of its result sets.
    async fn execute(&self, query: &str) -> Result<RowCursor, EngineError>;

    /// Lightweight no-op check bounded by a short timeout.
    async fn healthy(&self) -> bool;

    /// Neutralize full-text operators so `text` matches literally inside `MATCH('...')`.
    fn escape(&self, text: &str) -> String {
        escape_match(text)
    }
}
