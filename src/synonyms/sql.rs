// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Synonym table in the origin database.
//!
//! ```sql
//! <prefix>search_synonyms (
//!   term VARCHAR(191) NOT NULL,
//!   synonyms TEXT NOT NULL        -- comma-separated
//! )
//! ```

use async_trait::async_trait;
use sqlx::AnyPool;
use tracing::debug;

use super::cache::{SynonymGroup, SynonymSource};
use crate::error::StoreError;
use crate::executor::fallback::{prefixed_table, text_column};

pub struct SqlSynonymSource {
    pool: AnyPool,
    table: String,
}

impl SqlSynonymSource {
    pub fn new(pool: AnyPool, table_prefix: &str) -> Self {
        Self {
            pool,
            table: prefixed_table(table_prefix, "search_synonyms"),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl SynonymSource for SqlSynonymSource {
    async fn load(&self) -> Result<Vec<SynonymGroup>, StoreError> {
        let sql = format!("SELECT term, synonyms FROM {} ORDER BY term", self.table);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let groups: Vec<SynonymGroup> = rows
            .iter()
            .filter_map(|row| {
                let term = text_column(row, "term")?;
                let synonyms = text_column(row, "synonyms")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                Some(SynonymGroup::new(term, synonyms))
            })
            .collect();

        debug!(table = %self.table, groups = groups.len(), "Loaded synonym groups");
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fallback::connect_origin;
    use crate::synonyms::SynonymMap;

    #[tokio::test]
    async fn test_load_from_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("synonyms.db").display());
        let pool = connect_origin(&url).await.unwrap();

        sqlx::query("CREATE TABLE wp_search_synonyms (term TEXT NOT NULL, synonyms TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO wp_search_synonyms (term, synonyms) VALUES ('red', 'crimson, scarlet,,')")
            .execute(&pool)
            .await
            .unwrap();

        let source = SqlSynonymSource::new(pool, "wp_");
        assert_eq!(source.table(), "wp_search_synonyms");

        let groups = source.load().await.unwrap();
        assert_eq!(
            groups,
            vec![SynonymGroup::new("red", vec!["crimson".into(), "scarlet".into()])]
        );
        assert_eq!(SynonymMap::from_groups(&groups).lookup("scarlet"), ["red", "crimson"]);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("empty.db").display());
        let pool = connect_origin(&url).await.unwrap();

        let source = SqlSynonymSource::new(pool, "wp_");
        assert!(matches!(source.load().await, Err(StoreError::Backend(_))));
    }
}
