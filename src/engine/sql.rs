// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine client over the MySQL wire protocol.
//!
//! The engine exposes a SQL listener but is not MySQL: it has no prepared
//! statement cache worth using and rejects most session variables. The pool
//! therefore disables sqlx's connect-time `SET` statements and every query
//! goes through the text protocol via [`sqlx::raw_sql`].
//!
//! Connections come from a pool, one per statement, so concurrent requests
//! never share a stateful wire connection.
//!
//! ```text
//! execute(sql)
//!     │
//!     ├─→ timeout(query_timeout)
//!     │        └─→ pool.acquire → COM_QUERY → rows / OK packets
//!     │
//!     └─→ split stream into result sets on each OK packet
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Either, Row};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::traits::{EngineClient, EngineError, ResultSet, RowCursor, Value};
use crate::config::SearchConfig;
use crate::metrics;

/// Health check statement; answered from server memory.
const HEALTH_CHECK_SQL: &str = "SHOW STATUS LIKE 'uptime'";

pub struct SqlEngineClient {
    pool: MySqlPool,
    query_timeout: Duration,
    health_timeout: Duration,
}

impl SqlEngineClient {
    /// Build a lazily-connecting client. No connection is attempted until
    /// the first query, so an unavailable engine never blocks startup.
    ///
    /// Must be called inside a Tokio runtime (the pool spawns its reaper).
    pub fn connect_lazy(config: &SearchConfig) -> Result<Self, EngineError> {
        let options = MySqlConnectOptions::from_str(&config.engine_url)
            .map_err(|e| EngineError::Unreachable(format!("invalid engine url: {}", e)))?
            .pipes_as_concat(false)
            .no_engine_substitution(false)
            .timezone(None::<String>)
            .set_names(false)
            .statement_cache_capacity(0);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.engine_max_connections)
            .min_connections(0)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Duration::from_secs(300))
            .test_before_acquire(false)
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            query_timeout: config.query_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> MySqlPool {
        self.pool.clone()
    }

    async fn run(&self, query: &str) -> Result<RowCursor, EngineError> {
        let mut sets = Vec::new();
        let mut current = ResultSet::default();

        let mut stream = sqlx::raw_sql(query).fetch_many(&self.pool);
        while let Some(step) = stream.try_next().await.map_err(map_sqlx_error)? {
            match step {
                Either::Left(_done) => {
                    sets.push(std::mem::take(&mut current));
                }
                Either::Right(row) => {
                    if current.columns.is_empty() {
                        current.columns = row
                            .columns()
                            .iter()
                            .map(|c| c.name().to_string())
                            .collect();
                    }
                    current.rows.push(decode_row(&row));
                }
            }
        }
        if !current.rows.is_empty() || sets.is_empty() {
            sets.push(current);
        }

        Ok(RowCursor::new(sets))
    }
}

#[async_trait]
impl EngineClient for SqlEngineClient {
    async fn execute(&self, query: &str) -> Result<RowCursor, EngineError> {
        let start = Instant::now();
        debug!(query = %query, "Engine query");

        let result = match tokio::time::timeout(self.query_timeout, self.run(query)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Unreachable(format!(
                "query timed out after {:?}",
                self.query_timeout
            ))),
        };

        match &result {
            Ok(_) => {
                metrics::record_engine_query("success", start.elapsed());
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Engine unreachable");
                metrics::record_engine_query("unreachable", start.elapsed());
            }
            Err(e) => {
                warn!(error = %e, query = %query, "Engine rejected query");
                metrics::record_engine_query("error", start.elapsed());
            }
        }
        result
    }

    async fn healthy(&self) -> bool {
        let check = sqlx::raw_sql(HEALTH_CHECK_SQL).fetch_all(&self.pool);
        let healthy = matches!(
            tokio::time::timeout(self.health_timeout, check).await,
            Ok(Ok(_))
        );
        metrics::set_engine_healthy(healthy);
        healthy
    }
}

fn map_sqlx_error(err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::Database(db) => EngineError::Query {
            message: db.message().to_string(),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Protocol(_) => EngineError::Unreachable(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            EngineError::Decode(err.to_string())
        }
        other => EngineError::Query {
            message: other.to_string(),
        },
    }
}

fn decode_row(row: &MySqlRow) -> Vec<Value> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

/// Engine columns are loosely typed (ids are unsigned, counts signed,
/// weights float), so try the widest decoders in turn.
fn decode_cell(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map_or(Value::Null, Value::Int);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map_or(Value::Null, |n| Value::Int(n as i64));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map_or(Value::Null, Value::Float);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map_or(Value::Null, |f| Value::Float(f64::from(f)));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map_or(Value::Null, Value::Text);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map_or(Value::Null, |b| {
            Value::Text(String::from_utf8_lossy(&b).into_owned())
        });
    }
    Value::Null
}
