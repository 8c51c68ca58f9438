// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter Spec - the engine-agnostic description of one catalog search.
//!
//! Built once at the boundary from request parameters, page context and
//! explicit caller selections, then handed to the compiler. Raw request maps
//! never travel further than [`crate::executor::SearchRequest`].
//!
//! # Example
//!
//! ```rust
//! use catalog_search::query::{Combinator, FilterSpec, OrderBy, SortKey};
//!
//! let spec = FilterSpec::products()
//!     .text("red dress")
//!     .category(15)
//!     .attribute("pa_color", vec![5, 7], Combinator::And)
//!     .price_range(Some(10.0), Some(50.0))
//!     .order_by(OrderBy::new(SortKey::Price))
//!     .paginate(2, 24);
//!
//! assert_eq!(spec.offset(), 24);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::synonyms::{query_tokens, ExpandedQuery};

/// How the term ids of one attribute filter combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Document must carry every term
    And,
    /// Document must carry at least one term
    #[default]
    Or,
}

impl Combinator {
    /// Parse `and`/`or`; anything else falls back to the default (OR).
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("and") {
            Self::And
        } else {
            Self::Or
        }
    }
}

/// Term filter on one attribute taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub terms: Vec<i64>,
    pub combinator: Combinator,
}

impl AttributeFilter {
    pub fn new(terms: Vec<i64>, combinator: Combinator) -> Self {
        Self { terms, combinator }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    OnBackorder,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "instock",
            Self::OutOfStock => "outofstock",
            Self::OnBackorder => "onbackorder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "instock" | "in_stock" | "in-stock" => Some(Self::InStock),
            "outofstock" | "out_of_stock" | "out-of-stock" => Some(Self::OutOfStock),
            "onbackorder" | "on_backorder" | "backorder" => Some(Self::OnBackorder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Relevance,
    Price,
    Popularity,
    Rating,
    Date,
    Id,
    MenuOrder,
}

impl SortKey {
    fn default_direction(self) -> SortDirection {
        match self {
            Self::Price | Self::Id | Self::MenuOrder => SortDirection::Asc,
            Self::Relevance | Self::Popularity | Self::Rating | Self::Date => SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl OrderBy {
    /// Sort by `key` in its natural direction (price ascending, date newest first, ...).
    pub fn new(key: SortKey) -> Self {
        Self {
            key,
            direction: key.default_direction(),
        }
    }

    pub fn with_direction(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Parse a storefront `orderby` value plus optional `order`.
    ///
    /// `price-desc` carries its own direction; an explicit `order` wins otherwise.
    pub fn parse(orderby: &str, order: Option<&str>) -> Option<Self> {
        let (key, implied) = match orderby.trim().to_ascii_lowercase().as_str() {
            "relevance" => (SortKey::Relevance, None),
            "price" => (SortKey::Price, None),
            "price-desc" => (SortKey::Price, Some(SortDirection::Desc)),
            "popularity" => (SortKey::Popularity, None),
            "rating" => (SortKey::Rating, None),
            "date" => (SortKey::Date, None),
            "id" => (SortKey::Id, None),
            "menu_order" | "menu_order title" => (SortKey::MenuOrder, None),
            _ => return None,
        };
        let direction = implied
            .or_else(|| order.and_then(SortDirection::parse))
            .unwrap_or_else(|| key.default_direction());
        Some(Self { key, direction })
    }
}

/// Structured search description.
///
/// Field order is irrelevant to the compiled output; attribute filters are
/// kept in a `BTreeMap` and id lists sorted so compilation is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Free-text query as typed by the shopper
    pub text: Option<String>,
    /// Synonym/wildcard expansion of `text`, filled by the executor
    pub expanded: Option<ExpandedQuery>,
    pub post_types: Vec<String>,
    pub post_statuses: Vec<String>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    /// Taxonomy name → term filter
    pub attributes: BTreeMap<String, AttributeFilter>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub stock_status: Option<StockStatus>,
    pub min_rating: Option<f64>,
    /// `Some(vec![])` means "nothing may match"
    pub include_ids: Option<Vec<i64>>,
    pub exclude_ids: Vec<i64>,
    /// Also return documents whose visibility is "hidden"
    pub include_hidden: bool,
    pub order: Option<OrderBy>,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
    /// Rank in-stock documents ahead of all out-of-stock ones
    pub prioritize_in_stock: bool,
}

impl FilterSpec {
    pub fn new(post_type: impl Into<String>) -> Self {
        Self {
            post_types: vec![post_type.into()],
            post_statuses: vec!["publish".to_string()],
            page: 1,
            page_size: 12,
            ..Default::default()
        }
    }

    /// Published products.
    pub fn products() -> Self {
        Self::new("product")
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn post_types(mut self, post_types: Vec<String>) -> Self {
        self.post_types = post_types;
        self
    }

    pub fn post_statuses(mut self, statuses: Vec<String>) -> Self {
        self.post_statuses = statuses;
        self
    }

    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn tag(mut self, tag_id: i64) -> Self {
        self.tag_id = Some(tag_id);
        self
    }

    pub fn attribute(mut self, taxonomy: impl Into<String>, terms: Vec<i64>, combinator: Combinator) -> Self {
        self.attributes
            .insert(taxonomy.into(), AttributeFilter::new(terms, combinator));
        self
    }

    pub fn price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    pub fn stock(mut self, status: StockStatus) -> Self {
        self.stock_status = Some(status);
        self
    }

    pub fn min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn include(mut self, ids: Vec<i64>) -> Self {
        self.include_ids = Some(ids);
        self
    }

    pub fn exclude(mut self, ids: Vec<i64>) -> Self {
        self.exclude_ids = ids;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn paginate(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn prioritize_in_stock(mut self, enabled: bool) -> Self {
        self.prioritize_in_stock = enabled;
        self
    }

    /// Row offset of the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// True when the text query holds at least one searchable word.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| query_tokens(t).next().is_some())
    }

    /// The order actually applied: explicit order, else relevance for text
    /// searches, else newest first. Relevance without text degrades to date.
    pub fn effective_order(&self) -> OrderBy {
        match self.order {
            Some(OrderBy { key: SortKey::Relevance, .. }) | None if self.has_text() => {
                OrderBy::new(SortKey::Relevance)
            }
            Some(OrderBy { key: SortKey::Relevance, .. }) | None => OrderBy::new(SortKey::Date),
            Some(order) => order,
        }
    }

    /// Repair contradictory or out-of-range values in place. Nothing here is
    /// ever rejected; a bad value is fixed up or dropped.
    pub fn normalize(&mut self, default_page_size: u32, max_page_size: u32) {
        self.text = self
            .text
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if self.text.is_none() {
            self.expanded = None;
        }

        normalize_names(&mut self.post_types);
        if self.post_types.is_empty() {
            self.post_types.push("product".to_string());
        }
        normalize_names(&mut self.post_statuses);
        if self.post_statuses.is_empty() {
            self.post_statuses.push("publish".to_string());
        }

        self.price_min = self.price_min.filter(|p| p.is_finite()).map(|p| p.max(0.0));
        self.price_max = self.price_max.filter(|p| p.is_finite()).map(|p| p.max(0.0));
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                self.price_min = Some(max);
                self.price_max = Some(min);
            }
        }

        self.min_rating = self
            .min_rating
            .filter(|r| r.is_finite() && *r > 0.0)
            .map(|r| r.min(5.0));

        let attributes = std::mem::take(&mut self.attributes);
        for (taxonomy, mut filter) in attributes {
            let taxonomy = taxonomy.trim().to_string();
            filter.terms.retain(|t| *t > 0);
            filter.terms.sort_unstable();
            filter.terms.dedup();
            if taxonomy.is_empty() || filter.terms.is_empty() {
                continue;
            }
            self.attributes.insert(taxonomy, filter);
        }

        if let Some(ids) = self.include_ids.as_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        self.exclude_ids.sort_unstable();
        self.exclude_ids.dedup();

        self.category_id = self.category_id.filter(|id| *id > 0);
        self.tag_id = self.tag_id.filter(|id| *id > 0);

        self.page = self.page.max(1);
        if self.page_size == 0 {
            self.page_size = default_page_size;
        }
        self.page_size = self.page_size.clamp(1, max_page_size.max(1));
    }

    /// Copy of this spec without the filter for one taxonomy (for its facet counts).
    pub fn without_attribute(&self, taxonomy: &str) -> Self {
        let mut spec = self.clone();
        spec.attributes.remove(taxonomy);
        spec
    }
}

fn normalize_names(names: &mut Vec<String>) {
    for name in names.iter_mut() {
        *name = name.trim().to_string();
    }
    names.retain(|n| !n.is_empty());
    names.sort();
    names.dedup();
}
