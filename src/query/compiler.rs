// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Compiler
//!
//! Turns a [`FilterSpec`] into engine statements. Compilation is pure: the
//! same spec always yields byte-identical strings, which the result cache
//! relies on for its keys.
//!
//! # Statements Generated
//!
//! ```sql
//! SELECT id, WEIGHT() AS relevance FROM products
//!   WHERE MATCH('(@title (red | crimson) dress) | (@sku (red | crimson) dress)')
//!   AND post_type = 'product' AND post_status = 'publish' AND visibility != 'hidden'
//!   AND pa_color_ids = 5 AND pa_color_ids = 7            -- AND combinator
//!   AND pa_size_ids IN (3,4)                               -- OR combinator
//!   AND price >= 10 AND price <= 50
//!   ORDER BY relevance DESC, id ASC LIMIT 0,12
//!   OPTION max_matches=10000, field_weights=(title=10, sku=8), ranker=proximity_bm25
//!
//! SELECT COUNT(*) FROM products WHERE ...                  -- same predicates
//! SELECT stock_status, COUNT(*) AS cnt FROM products WHERE ... GROUP BY stock_status
//! SELECT id FROM products WHERE ... LIMIT 0,1 OPTION max_matches=10000
//!   FACET pa_color_ids ORDER BY COUNT(*) DESC LIMIT 100
//! ```

use tracing::warn;

use super::filter::{Combinator, FilterSpec, SortKey};
use super::schema::IndexSchema;
use crate::config::{FieldWeight, SearchConfig};
use crate::engine::quote_literal;
use crate::error::SearchError;
use crate::synonyms::ExpandedQuery;

/// The in-stock value of `stock_status`; every other value is "out of stock".
pub const IN_STOCK: &str = "instock";

/// One half of the stock-priority ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockPartition {
    InStock,
    OutOfStock,
}

/// Page statement plus its matching count statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledQuery {
    pub select: String,
    pub count: String,
}

pub struct QueryCompiler {
    schema: IndexSchema,
    field_weights: Vec<FieldWeight>,
    ranker: String,
    max_matches: u64,
}

impl QueryCompiler {
    /// Fails if the index name or ranker is not a plain identifier.
    /// Weighted fields the schema doesn't know are dropped.
    pub fn new(schema: IndexSchema, config: &SearchConfig) -> Result<Self, SearchError> {
        if !is_identifier(&schema.index) {
            return Err(SearchError::Config(format!("invalid index name '{}'", schema.index)));
        }
        if !is_identifier(&config.ranker) {
            return Err(SearchError::Config(format!("invalid ranker '{}'", config.ranker)));
        }

        let field_weights = config
            .field_weights
            .iter()
            .filter(|fw| {
                let usable = fw.weight > 0 && is_identifier(&fw.field) && schema.has_text_field(&fw.field);
                if !usable {
                    warn!(field = %fw.field, "Ignoring unusable full-text field weight");
                }
                usable
            })
            .cloned()
            .collect();

        Ok(Self {
            schema,
            field_weights,
            ranker: config.ranker.clone(),
            max_matches: config.max_matches.max(1),
        })
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Statement for the requested page, plus the count statement.
    pub fn compile(&self, spec: &FilterSpec) -> CompiledQuery {
        CompiledQuery {
            select: self.compile_page(spec, None, spec.offset(), u64::from(spec.page_size)),
            count: self.compile_count(spec, None),
        }
    }

    /// `SELECT id ... LIMIT offset,limit`, optionally restricted to one stock partition.
    pub fn compile_page(
        &self,
        spec: &FilterSpec,
        partition: Option<StockPartition>,
        offset: u64,
        limit: u64,
    ) -> String {
        let limit = limit.max(1);
        let columns = if spec.has_text() { "id, WEIGHT() AS relevance" } else { "id" };
        format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT {},{} OPTION {}",
            columns,
            self.schema.index,
            self.where_clause(spec, partition),
            self.order_clause(spec),
            offset,
            limit,
            self.options(spec, offset.saturating_add(limit)),
        )
    }

    /// `SELECT COUNT(*)` over the same predicates, no ORDER BY or LIMIT.
    pub fn compile_count(&self, spec: &FilterSpec, partition: Option<StockPartition>) -> String {
        format!(
            "SELECT COUNT(*) FROM {}{}",
            self.schema.index,
            self.where_clause(spec, partition)
        )
    }

    /// Both stock partition sizes in one round trip.
    pub fn compile_partition_counts(&self, spec: &FilterSpec) -> String {
        format!(
            "SELECT stock_status, COUNT(*) AS cnt FROM {}{} GROUP BY stock_status",
            self.schema.index,
            self.where_clause(spec, None)
        )
    }

    /// Per-value match counts of one MVA field, as a second result set.
    pub fn compile_facet(&self, spec: &FilterSpec, field: &str, limit: usize) -> String {
        format!(
            "SELECT id FROM {}{} LIMIT 0,1 OPTION max_matches={} FACET {} ORDER BY COUNT(*) DESC LIMIT {}",
            self.schema.index,
            self.where_clause(spec, None),
            self.max_matches,
            field,
            limit.max(1),
        )
    }

    /// Weighted full-text expression, `None` without a text query.
    ///
    /// Each field gets the whole expression, so every word must match within
    /// one field; fields are ORed.
    pub fn match_expression(&self, spec: &FilterSpec) -> Option<String> {
        if !spec.has_text() {
            return None;
        }
        let expr = match &spec.expanded {
            Some(expanded) if !expanded.is_empty() => expanded.to_expression(),
            _ => ExpandedQuery::plain(spec.text.as_deref().unwrap_or_default()).to_expression(),
        };
        if expr.trim().is_empty() {
            return None;
        }

        if self.field_weights.is_empty() {
            return Some(expr);
        }
        let per_field: Vec<String> = self
            .field_weights
            .iter()
            .map(|fw| format!("(@{} {})", fw.field, expr))
            .collect();
        Some(per_field.join(" | "))
    }

    fn where_clause(&self, spec: &FilterSpec, partition: Option<StockPartition>) -> String {
        let mut predicates = Vec::new();

        if let Some(expr) = self.match_expression(spec) {
            predicates.push(format!("MATCH('{}')", expr));
        }

        predicates.push(string_set_predicate("post_type", &spec.post_types, "product"));
        predicates.push(string_set_predicate("post_status", &spec.post_statuses, "publish"));

        if !spec.include_hidden && self.schema.has_attribute("visibility") {
            predicates.push("visibility != 'hidden'".to_string());
        }

        if let Some(category) = spec.category_id {
            self.push_mva(&mut predicates, "category_ids", category);
        }
        if let Some(tag) = spec.tag_id {
            self.push_mva(&mut predicates, "tag_ids", tag);
        }

        for (taxonomy, filter) in &spec.attributes {
            if filter.terms.is_empty() {
                continue;
            }
            let Some(field) = self.schema.attribute_field(taxonomy) else {
                warn!(taxonomy = %taxonomy, index = %self.schema.index, "No MVA field for attribute filter, dropping it");
                continue;
            };
            match filter.combinator {
                Combinator::And => {
                    for term in &filter.terms {
                        predicates.push(format!("{} = {}", field, term));
                    }
                }
                Combinator::Or => predicates.push(id_set_predicate(&field, &filter.terms)),
            }
        }

        if let Some(min) = spec.price_min.filter(|p| p.is_finite()) {
            self.push_scalar(&mut predicates, "price", format!("price >= {}", min));
        }
        if let Some(max) = spec.price_max.filter(|p| p.is_finite()) {
            self.push_scalar(&mut predicates, "price", format!("price <= {}", max));
        }
        if let Some(status) = spec.stock_status {
            self.push_scalar(
                &mut predicates,
                "stock_status",
                format!("stock_status = {}", quote_literal(status.as_str())),
            );
        }
        if let Some(rating) = spec.min_rating.filter(|r| r.is_finite()) {
            self.push_scalar(&mut predicates, "average_rating", format!("average_rating >= {}", rating));
        }

        match spec.include_ids.as_deref() {
            Some([]) => predicates.push("id = 0".to_string()),
            Some(ids) => predicates.push(id_set_predicate("id", ids)),
            None => {}
        }
        if !spec.exclude_ids.is_empty() {
            predicates.push(format!("id NOT IN ({})", join_ids(&spec.exclude_ids)));
        }

        match partition {
            Some(StockPartition::InStock) => predicates.push(format!("stock_status = '{}'", IN_STOCK)),
            Some(StockPartition::OutOfStock) => predicates.push(format!("stock_status != '{}'", IN_STOCK)),
            None => {}
        }

        format!(" WHERE {}", predicates.join(" AND "))
    }

    fn push_mva(&self, predicates: &mut Vec<String>, field: &str, id: i64) {
        if self.schema.has_mva(field) {
            predicates.push(format!("{} = {}", field, id));
        } else {
            warn!(field, index = %self.schema.index, "Index has no such MVA field, dropping filter");
        }
    }

    fn push_scalar(&self, predicates: &mut Vec<String>, attribute: &str, predicate: String) {
        if self.schema.has_attribute(attribute) {
            predicates.push(predicate);
        } else {
            warn!(attribute, index = %self.schema.index, "Index has no such attribute, dropping filter");
        }
    }

    fn order_clause(&self, spec: &FilterSpec) -> String {
        let order = spec.effective_order();
        let column = match order.key {
            SortKey::Relevance => "relevance",
            SortKey::Price => "price",
            SortKey::Popularity => "total_sales",
            SortKey::Rating => "average_rating",
            SortKey::Date => "post_date",
            SortKey::Id => "id",
            SortKey::MenuOrder => "menu_order",
        };
        if order.key == SortKey::Id {
            format!("id {}", order.direction.as_sql())
        } else {
            format!("{} {}, id ASC", column, order.direction.as_sql())
        }
    }

    /// `window` is the last row the statement needs; the scan window must cover it.
    fn options(&self, spec: &FilterSpec, window: u64) -> String {
        let mut options = vec![format!("max_matches={}", self.max_matches.max(window))];
        if spec.has_text() && !self.field_weights.is_empty() {
            let weights: Vec<String> = self
                .field_weights
                .iter()
                .map(|fw| format!("{}={}", fw.field, fw.weight))
                .collect();
            options.push(format!("field_weights=({})", weights.join(", ")));
            options.push(format!("ranker={}", self.ranker));
        }
        options.join(", ")
    }
}

fn string_set_predicate(column: &str, values: &[String], default: &str) -> String {
    match values {
        [] => format!("{} = {}", column, quote_literal(default)),
        [one] => format!("{} = {}", column, quote_literal(one)),
        many => {
            let quoted: Vec<String> = many.iter().map(|v| quote_literal(v)).collect();
            format!("{} IN ({})", column, quoted.join(","))
        }
    }
}

fn id_set_predicate(column: &str, ids: &[i64]) -> String {
    match ids {
        [one] => format!("{} = {}", column, one),
        many => format!("{} IN ({})", column, join_ids(many)),
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::{OrderBy, SortDirection, StockStatus};
    use crate::synonyms::{expand_with, SynonymGroup, SynonymMap};

    fn compiler() -> QueryCompiler {
        let config = SearchConfig {
            field_weights: vec![FieldWeight::new("title", 10), FieldWeight::new("sku", 8)],
            ..Default::default()
        };
        QueryCompiler::new(IndexSchema::products("products", &["pa_color", "pa_size"]), &config).unwrap()
    }

    #[test]
    fn test_browse_statement() {
        let compiled = compiler().compile(&FilterSpec::products());
        assert_eq!(
            compiled.select,
            "SELECT id FROM products WHERE post_type = 'product' AND post_status = 'publish' \
             AND visibility != 'hidden' ORDER BY post_date DESC, id ASC LIMIT 0,12 OPTION max_matches=10000"
        );
        assert_eq!(
            compiled.count,
            "SELECT COUNT(*) FROM products WHERE post_type = 'product' AND post_status = 'publish' \
             AND visibility != 'hidden'"
        );
    }

    #[test]
    fn test_attribute_and_uses_separate_equalities() {
        let spec = FilterSpec::products().attribute("pa_color", vec![5, 7], Combinator::And);
        let sql = compiler().compile(&spec).select;
        assert!(sql.contains("pa_color_ids = 5 AND pa_color_ids = 7"));
        assert!(!sql.contains("pa_color_ids IN"));
    }

    #[test]
    fn test_attribute_or_uses_single_in() {
        let spec = FilterSpec::products().attribute("pa_color", vec![5, 7], Combinator::Or);
        let sql = compiler().compile(&spec).select;
        assert!(sql.contains("pa_color_ids IN (5,7)"));
        assert!(!sql.contains("pa_color_ids = "));

        let spec = FilterSpec::products().attribute("pa_color", vec![5], Combinator::Or);
        assert!(compiler().compile(&spec).select.contains("pa_color_ids = 5"));
    }

    #[test]
    fn test_unknown_taxonomy_is_dropped() {
        let spec = FilterSpec::products().attribute("pa_material", vec![1], Combinator::Or);
        let sql = compiler().compile(&spec).select;
        assert!(!sql.contains("pa_material"));
    }

    #[test]
    fn test_scalar_filters() {
        let spec = FilterSpec::products()
            .category(15)
            .tag(4)
            .price_range(Some(10.0), Some(49.5))
            .stock(StockStatus::InStock)
            .min_rating(4.0)
            .include(vec![1, 2, 3])
            .exclude(vec![9]);
        let sql = compiler().compile_count(&spec, None);
        for expected in [
            "category_ids = 15",
            "tag_ids = 4",
            "price >= 10",
            "price <= 49.5",
            "stock_status = 'instock'",
            "average_rating >= 4",
            "id IN (1,2,3)",
            "id NOT IN (9)",
        ] {
            assert!(sql.contains(expected), "missing {expected} in {sql}");
        }
    }

    #[test]
    fn test_include_hidden_drops_visibility() {
        let spec = FilterSpec::products().include_hidden(true);
        assert!(!compiler().compile(&spec).select.contains("visibility"));
    }

    #[test]
    fn test_match_is_per_field_and_weighted() {
        let spec = FilterSpec::products().text("blue dress");
        let compiled = compiler().compile(&spec);
        assert!(compiled.select.starts_with("SELECT id, WEIGHT() AS relevance FROM products WHERE MATCH("));
        assert!(compiled
            .select
            .contains("MATCH('(@title blue dress) | (@sku blue dress)')"));
        assert!(compiled.select.contains("ORDER BY relevance DESC, id ASC"));
        assert!(compiled
            .select
            .ends_with("OPTION max_matches=10000, field_weights=(title=10, sku=8), ranker=proximity_bm25"));
        assert!(compiled.count.contains("MATCH('(@title blue dress) | (@sku blue dress)')"));
    }

    #[test]
    fn test_expanded_query_used_in_match() {
        let map = SynonymMap::from_groups(&[SynonymGroup::new(
            "red",
            vec!["crimson".into(), "scarlet".into()],
        )]);
        let mut spec = FilterSpec::products().text("red");
        spec.expanded = Some(expand_with(&map, "red", 0, 0));
        let sql = compiler().compile(&spec).select;
        assert!(sql.contains("(@title (red | crimson | scarlet))"));
    }

    #[test]
    fn test_text_is_escaped() {
        let spec = FilterSpec::products().text("it's -50%");
        let sql = compiler().compile(&spec).select;
        assert!(sql.contains("it\\'s"));
        assert!(sql.contains("\\\\-50%"));
    }

    #[test]
    fn test_order_mapping_and_tie_break() {
        let cases = [
            (OrderBy::new(SortKey::Price), "ORDER BY price ASC, id ASC"),
            (
                OrderBy::with_direction(SortKey::Price, SortDirection::Desc),
                "ORDER BY price DESC, id ASC",
            ),
            (OrderBy::new(SortKey::Popularity), "ORDER BY total_sales DESC, id ASC"),
            (OrderBy::new(SortKey::Rating), "ORDER BY average_rating DESC, id ASC"),
            (OrderBy::new(SortKey::MenuOrder), "ORDER BY menu_order ASC, id ASC"),
            (OrderBy::new(SortKey::Id), "ORDER BY id ASC LIMIT"),
        ];
        for (order, expected) in cases {
            let sql = compiler().compile(&FilterSpec::products().order_by(order)).select;
            assert!(sql.contains(expected), "{expected} not in {sql}");
        }
    }

    #[test]
    fn test_max_matches_covers_deep_pages() {
        let spec = FilterSpec::products().paginate(500, 100);
        let sql = compiler().compile(&spec).select;
        assert!(sql.contains("LIMIT 49900,100"));
        assert!(sql.contains("max_matches=50000"));
    }

    #[test]
    fn test_partition_statements() {
        let spec = FilterSpec::products();
        let c = compiler();
        assert!(c
            .compile_page(&spec, Some(StockPartition::InStock), 0, 2)
            .contains("AND stock_status = 'instock' ORDER BY"));
        assert!(c
            .compile_page(&spec, Some(StockPartition::OutOfStock), 3, 2)
            .contains("stock_status != 'instock' ORDER BY post_date DESC, id ASC LIMIT 3,2"));
        assert!(c
            .compile_partition_counts(&spec)
            .ends_with("GROUP BY stock_status"));
    }

    #[test]
    fn test_facet_statement() {
        let spec = FilterSpec::products().category(3);
        let sql = compiler().compile_facet(&spec, "pa_color_ids", 50);
        assert_eq!(
            sql,
            "SELECT id FROM products WHERE post_type = 'product' AND post_status = 'publish' \
             AND visibility != 'hidden' AND category_ids = 3 LIMIT 0,1 OPTION max_matches=10000 \
             FACET pa_color_ids ORDER BY COUNT(*) DESC LIMIT 50"
        );
    }

    #[test]
    fn test_control_only_text_is_no_text() {
        let c = compiler();
        let spec = FilterSpec::products().text("\n\t\u{7}\u{1b}");

        assert!(!spec.has_text());
        assert_eq!(c.match_expression(&spec), None);
        let compiled = c.compile(&spec);
        assert!(!compiled.select.contains("MATCH"));
        assert!(compiled.select.starts_with("SELECT id FROM"));
        assert!(!compiled.select.contains("field_weights"));
    }

    #[test]
    fn test_control_characters_dropped_from_match() {
        let spec = FilterSpec::products().text("red\u{7}\u{7} shoe");
        assert_eq!(
            compiler().match_expression(&spec).as_deref(),
            Some("(@title red shoe) | (@sku red shoe)")
        );
    }

    #[test]
    fn test_multiple_post_types() {
        let spec = FilterSpec::products().post_types(vec!["product".into(), "product_variation".into()]);
        let sql = compiler().compile(&spec).select;
        assert!(sql.contains("post_type IN ('product','product_variation')"));
    }

    #[test]
    fn test_empty_include_matches_nothing() {
        let spec = FilterSpec::products().include(vec![]);
        assert!(compiler().compile(&spec).count.ends_with("AND id = 0"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let spec = FilterSpec::products()
            .text("red dress")
            .attribute("pa_size", vec![3, 4], Combinator::Or)
            .attribute("pa_color", vec![5, 7], Combinator::And)
            .price_range(Some(5.0), None);
        let c = compiler();
        assert_eq!(c.compile(&spec), c.compile(&spec.clone()));
    }

    #[test]
    fn test_invalid_index_rejected() {
        let result = QueryCompiler::new(IndexSchema::new("products; DROP"), &SearchConfig::default());
        assert!(matches!(result, Err(SearchError::Config(_))));
    }
}
