// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Origin-store fallback.
//!
//! When the engine is down the same logical search runs against the origin
//! database: post type, post status, text and paging only, recency order,
//! no relevance ranking. Slower and less precise, but never empty-handed.
//!
//! Schema read (WordPress-style posts table):
//! ```sql
//! <prefix>posts (
//!   ID BIGINT PRIMARY KEY,
//!   post_type VARCHAR(20),
//!   post_status VARCHAR(20),
//!   post_title TEXT,
//!   post_excerpt TEXT,
//!   post_content LONGTEXT,
//!   post_date DATETIME
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! The `Any` driver hands MySQL TEXT columns back as BLOBs, so text columns
//! are read as `String` with a `Vec<u8>` fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::sync::Once;
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::query::FilterSpec;
use crate::synonyms::query_tokens;
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

/// Connect to the origin database with startup-mode retry (fails fast if config is wrong).
pub async fn connect_origin(connection_string: &str) -> Result<AnyPool, StoreError> {
    install_drivers();

    retry("origin_connect", &RetryConfig::startup(), || async {
        AnyPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(300))
            .connect(connection_string)
            .await
            .map_err(StoreError::from)
    })
    .await
}

/// `<prefix><table>`, with anything but `[A-Za-z0-9_]` stripped from the prefix.
pub(crate) fn prefixed_table(prefix: &str, table: &str) -> String {
    let prefix: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    format!("{}{}", prefix, table)
}

/// Read a text column, tolerating the Any driver's TEXT-as-BLOB mapping.
pub(crate) fn text_column(row: &AnyRow, column: &str) -> Option<String> {
    row.try_get::<String, _>(column).ok().or_else(|| {
        row.try_get::<Vec<u8>, _>(column)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    })
}

/// The part of a [`FilterSpec`] the origin store can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackQuery {
    pub text: Option<String>,
    pub post_types: Vec<String>,
    pub post_statuses: Vec<String>,
    pub include_ids: Option<Vec<i64>>,
    pub exclude_ids: Vec<i64>,
    pub offset: u64,
    pub limit: u64,
}

impl FallbackQuery {
    pub fn from_spec(spec: &FilterSpec) -> Self {
        Self {
            text: spec.text.clone().filter(|t| !t.trim().is_empty()),
            post_types: spec.post_types.clone(),
            post_statuses: spec.post_statuses.clone(),
            include_ids: spec.include_ids.clone(),
            exclude_ids: spec.exclude_ids.clone(),
            offset: spec.offset(),
            limit: u64::from(spec.page_size.max(1)),
        }
    }

    /// Words of the text query.
    pub fn words(&self) -> Vec<&str> {
        self.text
            .as_deref()
            .map(|t| query_tokens(t).collect())
            .unwrap_or_default()
    }
}

/// One page of fallback results plus the total match count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackPage {
    pub ids: Vec<i64>,
    pub total: u64,
}

/// Caller-facing entity loaded from the origin store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub post_type: String,
    pub title: String,
}

/// Origin data store used when the engine is unavailable, and for hydration.
#[async_trait]
pub trait OriginStore: Send + Sync {
    /// Text search over the origin tables, recency ordered.
    async fn search(&self, query: &FallbackQuery) -> Result<FallbackPage, StoreError>;

    /// Bulk fetch by id. Order of the returned documents is unspecified.
    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Document>, StoreError>;
}

/// [`OriginStore`] over a WordPress-style posts table.
pub struct SqlOriginStore {
    pool: AnyPool,
    posts_table: String,
}

impl SqlOriginStore {
    /// Connect with startup-mode retry.
    pub async fn connect(connection_string: &str, table_prefix: &str) -> Result<Self, StoreError> {
        let pool = connect_origin(connection_string).await?;
        Ok(Self::from_pool(pool, table_prefix))
    }

    /// Share an existing pool (e.g., with [`crate::synonyms::SqlSynonymSource`]).
    pub fn from_pool(pool: AnyPool, table_prefix: &str) -> Self {
        Self {
            pool,
            posts_table: prefixed_table(table_prefix, "posts"),
        }
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// WHERE clause with `?` placeholders, plus the values to bind in order.
    fn where_clause(&self, query: &FallbackQuery) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        for (column, values, default) in [
            ("post_type", &query.post_types, "product"),
            ("post_status", &query.post_statuses, "publish"),
        ] {
            if values.is_empty() {
                clauses.push(format!("{} = ?", column));
                binds.push(default.to_string());
            } else {
                let placeholders = vec!["?"; values.len()].join(",");
                clauses.push(format!("{} IN ({})", column, placeholders));
                binds.extend(values.iter().cloned());
            }
        }

        // Every word must appear somewhere.
        for word in query.words() {
            let pattern = format!("%{}%", escape_like(word));
            clauses.push(
                "(post_title LIKE ? ESCAPE '!' OR post_excerpt LIKE ? ESCAPE '!' OR post_content LIKE ? ESCAPE '!')"
                    .to_string(),
            );
            binds.extend(std::iter::repeat(pattern).take(3));
        }

        match query.include_ids.as_deref() {
            Some([]) => clauses.push("1 = 0".to_string()),
            Some(ids) => clauses.push(format!("ID IN ({})", join_ids(ids))),
            None => {}
        }
        if !query.exclude_ids.is_empty() {
            clauses.push(format!("ID NOT IN ({})", join_ids(&query.exclude_ids)));
        }

        (clauses.join(" AND "), binds)
    }
}

#[async_trait]
impl OriginStore for SqlOriginStore {
    async fn search(&self, query: &FallbackQuery) -> Result<FallbackPage, StoreError> {
        let (where_clause, binds) = self.where_clause(query);

        let count_sql = format!("SELECT COUNT(*) AS cnt FROM {} WHERE {}", self.posts_table, where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for value in &binds {
            count_query = count_query.bind(value.clone());
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get("cnt")?;

        let page_sql = format!(
            "SELECT ID FROM {} WHERE {} ORDER BY post_date DESC, ID DESC LIMIT ? OFFSET ?",
            self.posts_table, where_clause
        );
        let mut page_query = sqlx::query(&page_sql);
        for value in &binds {
            page_query = page_query.bind(value.clone());
        }
        let rows = page_query
            .bind(query.limit.min(i64::MAX as u64) as i64)
            .bind(query.offset.min(i64::MAX as u64) as i64)
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("ID"))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(table = %self.posts_table, total, returned = ids.len(), "Origin fallback search");
        Ok(FallbackPage {
            ids,
            total: total.max(0) as u64,
        })
    }

    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<Vec<Document>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT ID, post_type, post_title FROM {} WHERE ID IN ({})",
            self.posts_table,
            join_ids(ids)
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<Document, StoreError> {
                Ok(Document {
                    id: row.try_get("ID")?,
                    post_type: text_column(row, "post_type").unwrap_or_default(),
                    title: text_column(row, "post_title").unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Escape LIKE wildcards using `!` (portable across MySQL and SQLite).
fn escape_like(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}
