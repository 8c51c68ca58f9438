//! Shared fixtures for the integration tests.
//!
//! [`Catalog`] plays the engine: every document matches, the engine order
//! is relevance descending with an id tie-break, and the responder honours
//! the stock partition predicates, `LIMIT o,n`, `COUNT(*)` and
//! `GROUP BY stock_status` the compiler emits.

#![allow(dead_code)]

use std::sync::Arc;

use catalog_search::engine::{ResultSet, Value};
use catalog_search::executor::connect_origin;
use catalog_search::{RowCursor, ScriptedEngine, SqlOriginStore};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Doc {
    pub id: i64,
    pub relevance: i64,
    pub in_stock: bool,
}

impl Doc {
    pub fn new(id: i64, relevance: i64, in_stock: bool) -> Self {
        Self { id, relevance, in_stock }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    docs: Vec<Doc>,
}

impl Catalog {
    pub fn new(mut docs: Vec<Doc>) -> Self {
        docs.sort_by(|a, b| b.relevance.cmp(&a.relevance).then(a.id.cmp(&b.id)));
        Self { docs }
    }

    /// `in_stock` in-stock and `out_of_stock` out-of-stock documents,
    /// relevance falling with id.
    pub fn split(in_stock: usize, out_of_stock: usize) -> Self {
        let total = (in_stock + out_of_stock) as i64;
        let docs = (1..=total)
            .map(|id| Doc::new(id, 1000 - id, id as usize <= in_stock))
            .collect();
        Self::new(docs)
    }

    /// Ids in engine order.
    pub fn ids(&self) -> Vec<i64> {
        self.docs.iter().map(|d| d.id).collect()
    }

    /// In-stock ids then out-of-stock ids, each in engine order.
    pub fn stock_priority_ids(&self) -> Vec<i64> {
        let (inside, outside): (Vec<&Doc>, Vec<&Doc>) = self.docs.iter().partition(|d| d.in_stock);
        inside.into_iter().chain(outside).map(|d| d.id).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn engine(&self) -> Arc<ScriptedEngine> {
        let docs = self.docs.clone();
        Arc::new(ScriptedEngine::new(move |sql| Ok(respond(&docs, sql))))
    }
}

fn respond(docs: &[Doc], sql: &str) -> RowCursor {
    let partition: Vec<&Doc> = if sql.contains("stock_status = 'instock'") {
        docs.iter().filter(|d| d.in_stock).collect()
    } else if sql.contains("stock_status != 'instock'") {
        docs.iter().filter(|d| !d.in_stock).collect()
    } else {
        docs.iter().collect()
    };

    if sql.contains("GROUP BY stock_status") {
        let inside = partition.iter().filter(|d| d.in_stock).count() as i64;
        let outside = partition.len() as i64 - inside;
        let mut rows = Vec::new();
        if inside > 0 {
            rows.push(vec![Value::Text("instock".into()), Value::Int(inside)]);
        }
        if outside > 0 {
            rows.push(vec![Value::Text("outofstock".into()), Value::Int(outside)]);
        }
        return RowCursor::single(ResultSet::new(vec!["stock_status".into(), "cnt".into()], rows));
    }

    if sql.starts_with("SELECT COUNT(*)") {
        return RowCursor::single(ResultSet::new(
            vec!["count(*)".into()],
            vec![vec![Value::Int(partition.len() as i64)]],
        ));
    }

    let (offset, limit) = parse_limit(sql);
    let rows = partition
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|d| vec![Value::Int(d.id), Value::Int(d.relevance)])
        .collect();
    RowCursor::single(ResultSet::new(vec!["id".into(), "relevance".into()], rows))
}

/// `LIMIT offset,count` of a page statement.
fn parse_limit(sql: &str) -> (usize, usize) {
    let clause = sql
        .split(" LIMIT ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("0,20");
    let (offset, limit) = clause.split_once(',').unwrap_or(("0", clause));
    (offset.parse().unwrap_or(0), limit.parse().unwrap_or(20))
}

/// SQLite origin store with a WordPress-style posts table.
pub async fn sqlite_origin(dir: &TempDir, posts: &[(i64, &str, &str)]) -> SqlOriginStore {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("origin.db").display());
    let pool = connect_origin(&url).await.unwrap();

    sqlx::query(
        "CREATE TABLE wp_posts (
            ID INTEGER PRIMARY KEY,
            post_type TEXT NOT NULL,
            post_status TEXT NOT NULL DEFAULT 'publish',
            post_title TEXT NOT NULL,
            post_excerpt TEXT NOT NULL DEFAULT '',
            post_content TEXT NOT NULL DEFAULT '',
            post_date TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, title, date) in posts {
        sqlx::query("INSERT INTO wp_posts (ID, post_type, post_title, post_date) VALUES (?, 'product', ?, ?)")
            .bind(*id)
            .bind(*title)
            .bind(*date)
            .execute(&pool)
            .await
            .unwrap();
    }

    SqlOriginStore::from_pool(pool, "wp_")
}
