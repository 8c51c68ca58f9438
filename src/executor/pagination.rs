// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Page fetching: the plain ranked page and the stock-priority page.
//!
//! # Stock-Priority Pagination
//!
//! The match set is served as if it were one sequence, in-stock documents
//! first, without ever fetching the concatenation:
//!
//! ```text
//!              in-stock (k)                 out-of-stock (m)
//!   ┌──────────────────────────────┬──────────────────────────┐
//!   │ 0 1 2 ...                k-1 │ 0 1 2 ...            m-1 │
//!   └──────────────────────────────┴──────────────────────────┘
//!                    ▲ offset                ▲ offset - k
//!
//! 1. GROUP BY stock_status      → k, m             (round trip 1)
//! 2. offset < k:  in-stock  LIMIT offset,size      (round trip 2)
//!       short page? out-of-stock LIMIT 0,shortfall (round trip 3)
//!    offset >= k: out-of-stock LIMIT offset-k,size (round trip 2)
//! total = k + m
//! ```
//!
//! Both partitions use the same ORDER BY (with its `id ASC` tie-break), so
//! adjacent pages never overlap or skip.

use std::collections::BTreeMap;
use tracing::debug;

use crate::engine::{EngineClient, EngineError, RowCursor};
use crate::metrics;
use crate::query::{FilterSpec, QueryCompiler, StockPartition, IN_STOCK};

/// Rows of one page plus the authoritative total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRows {
    pub ids: Vec<i64>,
    pub scores: BTreeMap<i64, f64>,
    pub total: u64,
    /// Engine statements it took
    pub round_trips: usize,
}

impl PageRows {
    fn extend_from(&mut self, cursor: &RowCursor) -> Result<usize, EngineError> {
        let rows = cursor.scored_ids()?;
        let fetched = rows.len();
        for (id, score) in rows {
            self.ids.push(id);
            if let Some(score) = score {
                self.scores.insert(id, score);
            }
        }
        Ok(fetched)
    }
}

/// Page statement plus COUNT statement: two round trips.
pub async fn fetch_ranked_page(
    engine: &dyn EngineClient,
    compiler: &QueryCompiler,
    spec: &FilterSpec,
) -> Result<PageRows, EngineError> {
    let compiled = compiler.compile(spec);
    let mut page = PageRows::default();

    let cursor = engine.execute(&compiled.select).await?;
    page.extend_from(&cursor)?;
    page.total = engine.execute(&compiled.count).await?.scalar_count()?;
    page.round_trips = 2;
    Ok(page)
}

/// In-stock partition before out-of-stock, at most three round trips.
pub async fn fetch_stock_priority_page(
    engine: &dyn EngineClient,
    compiler: &QueryCompiler,
    spec: &FilterSpec,
) -> Result<PageRows, EngineError> {
    let (in_stock, out_of_stock) = partition_counts(engine, compiler, spec).await?;
    let offset = spec.offset();
    let size = u64::from(spec.page_size.max(1));

    let mut page = PageRows {
        total: in_stock + out_of_stock,
        round_trips: 1,
        ..Default::default()
    };

    if offset < in_stock {
        let query = compiler.compile_page(spec, Some(StockPartition::InStock), offset, size);
        let fetched = page.extend_from(&engine.execute(&query).await?)? as u64;
        page.round_trips += 1;

        if fetched < size && out_of_stock > 0 {
            let shortfall = size - fetched;
            let query = compiler.compile_page(spec, Some(StockPartition::OutOfStock), 0, shortfall);
            page.extend_from(&engine.execute(&query).await?)?;
            page.round_trips += 1;
        }
    } else if offset - in_stock < out_of_stock {
        let query = compiler.compile_page(spec, Some(StockPartition::OutOfStock), offset - in_stock, size);
        page.extend_from(&engine.execute(&query).await?)?;
        page.round_trips += 1;
    }

    debug!(
        in_stock,
        out_of_stock,
        offset,
        returned = page.ids.len(),
        round_trips = page.round_trips,
        "Stock-priority page"
    );
    metrics::record_stock_priority_page(page.round_trips);
    Ok(page)
}

/// `(in-stock, everything else)` from one GROUP BY statement.
async fn partition_counts(
    engine: &dyn EngineClient,
    compiler: &QueryCompiler,
    spec: &FilterSpec,
) -> Result<(u64, u64), EngineError> {
    let cursor = engine.execute(&compiler.compile_partition_counts(spec)).await?;
    let set = cursor.primary();
    if set.is_empty() {
        return Ok((0, 0));
    }
    // A NULL status groups with the empty string: not in stock.
    let counts = set.counts_by(0, |v| Some(v.as_str().unwrap_or_default().to_string()))?;

    let in_stock = counts.get(IN_STOCK).copied().unwrap_or(0);
    let out_of_stock = counts
        .iter()
        .filter(|(status, _)| status.as_str() != IN_STOCK)
        .map(|(_, n)| *n)
        .sum();
    Ok((in_stock, out_of_stock))
}
