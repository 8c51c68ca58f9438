// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Request - the boundary where raw inputs become a [`FilterSpec`].
//!
//! Three sources feed one request, merged in fixed precedence (highest first):
//!
//! ```text
//! Selection        explicit ids, post types, category/tag overrides, order
//!     ▼
//! URL parameters   filter_<attr>, query_type_<attr>, min/max_price,
//!                  rating_filter, stock_status, orderby/order, paged, per_page
//!     ▼
//! TaxonomyContext  the category / tag / attribute archive being browsed
//!     ▼
//! Text             s
//! ```
//!
//! Parsing is lenient: unparseable values are dropped with a debug log, the
//! resulting spec is normalized, and only a request that cannot describe a
//! search at all is rejected.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::query::{AttributeFilter, Combinator, FilterSpec, OrderBy, StockStatus};

const ATTRIBUTE_PARAM_PREFIX: &str = "filter_";
const COMBINATOR_PARAM_PREFIX: &str = "query_type_";
/// Attribute taxonomies are `pa_<name>`; URL parameters carry only `<name>`.
const ATTRIBUTE_TAXONOMY_PREFIX: &str = "pa_";

/// The archive page a request was made from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyContext {
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    /// Attribute archive: taxonomy and term id
    pub attribute: Option<(String, i64)>,
}

impl TaxonomyContext {
    pub fn category(category_id: i64) -> Self {
        Self {
            category_id: Some(category_id),
            ..Default::default()
        }
    }

    pub fn tag(tag_id: i64) -> Self {
        Self {
            tag_id: Some(tag_id),
            ..Default::default()
        }
    }

    pub fn attribute(taxonomy: impl Into<String>, term_id: i64) -> Self {
        Self {
            attribute: Some((taxonomy.into(), term_id)),
            ..Default::default()
        }
    }
}

/// Values the calling code chose explicitly; they beat everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub include_ids: Option<Vec<i64>>,
    pub exclude_ids: Vec<i64>,
    pub post_types: Option<Vec<String>>,
    pub post_statuses: Option<Vec<String>>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub order: Option<OrderBy>,
    pub include_hidden: bool,
}

/// One raw search request.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    params: BTreeMap<String, String>,
    context: TaxonomyContext,
    selection: Selection,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from URL query parameters.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Default::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn context(mut self, context: TaxonomyContext) -> Self {
        self.context = context;
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Merge every source into a normalized [`FilterSpec`].
    pub fn into_spec(&self, config: &SearchConfig) -> Result<FilterSpec, SearchError> {
        let post_types = self
            .selection
            .post_types
            .clone()
            .unwrap_or_else(|| vec!["product".to_string()]);
        if let Some(bad) = post_types.iter().find(|pt| !is_post_type_name(pt)) {
            return Err(SearchError::InvalidFilterSpec(format!("invalid post type '{}'", bad)));
        }

        // Lowest precedence first; each later source overwrites.
        let mut spec = FilterSpec::new("product").post_types(post_types);

        if let Some(text) = self.get("s") {
            spec = spec.text(text);
        }

        if let Some(category) = self.context.category_id {
            spec = spec.category(category);
        }
        if let Some(tag) = self.context.tag_id {
            spec = spec.tag(tag);
        }
        if let Some((taxonomy, term)) = &self.context.attribute {
            spec = spec.attribute(taxonomy.clone(), vec![*term], Combinator::Or);
        }

        self.apply_params(&mut spec);
        self.apply_selection(&mut spec);

        let requested = self
            .get("in_stock_first")
            .map(parse_flag)
            .unwrap_or(config.prioritize_in_stock);
        spec.prioritize_in_stock = requested && config.supports_stock(&spec.post_types);

        spec.normalize(config.default_page_size, config.max_page_size);
        Ok(spec)
    }

    fn apply_params(&self, spec: &mut FilterSpec) {
        for (key, value) in &self.params {
            let Some(name) = key.strip_prefix(ATTRIBUTE_PARAM_PREFIX) else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let terms = parse_ids(value);
            if terms.is_empty() {
                debug!(param = %key, value = %value, "Attribute filter has no numeric terms, ignoring");
                continue;
            }
            let combinator = self
                .get(&format!("{}{}", COMBINATOR_PARAM_PREFIX, name))
                .map(Combinator::parse)
                .unwrap_or_default();
            spec.attributes
                .insert(attribute_taxonomy(name), AttributeFilter::new(terms, combinator));
        }

        let min_price = self.get("min_price").and_then(|v| parse_number(v, "min_price"));
        let max_price = self.get("max_price").and_then(|v| parse_number(v, "max_price"));
        if min_price.is_some() || max_price.is_some() {
            spec.price_min = min_price;
            spec.price_max = max_price;
        }

        // rating_filter=4,5 means "rated 4 or better".
        if let Some(ratings) = self.get("rating_filter") {
            let lowest = ratings
                .split(',')
                .filter_map(|r| r.trim().parse::<f64>().ok())
                .filter(|r| r.is_finite())
                .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))));
            if let Some(rating) = lowest {
                spec.min_rating = Some(rating);
            }
        }

        if let Some(status) = self.get("stock_status") {
            match StockStatus::parse(status) {
                Some(status) => spec.stock_status = Some(status),
                None => debug!(value = %status, "Unknown stock_status, ignoring"),
            }
        }

        if let Some(orderby) = self.get("orderby") {
            match OrderBy::parse(orderby, self.get("order")) {
                Some(order) => spec.order = Some(order),
                None => debug!(value = %orderby, "Unknown orderby, using default order"),
            }
        }

        if let Some(page) = self.get("paged").and_then(|v| v.parse::<u32>().ok()) {
            spec.page = page;
        }
        spec.page_size = self
            .get("per_page")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
    }

    fn apply_selection(&self, spec: &mut FilterSpec) {
        let selection = &self.selection;
        if let Some(ids) = &selection.include_ids {
            spec.include_ids = Some(ids.clone());
        }
        if !selection.exclude_ids.is_empty() {
            spec.exclude_ids = selection.exclude_ids.clone();
        }
        if let Some(statuses) = &selection.post_statuses {
            spec.post_statuses = statuses.clone();
        }
        if let Some(category) = selection.category_id {
            spec.category_id = Some(category);
        }
        if let Some(tag) = selection.tag_id {
            spec.tag_id = Some(tag);
        }
        if let Some(order) = selection.order {
            spec.order = Some(order);
        }
        spec.include_hidden = selection.include_hidden;
    }
}

/// `color` → `pa_color`; already-prefixed names pass through.
fn attribute_taxonomy(name: &str) -> String {
    if name.starts_with(ATTRIBUTE_TAXONOMY_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", ATTRIBUTE_TAXONOMY_PREFIX, name)
    }
}

fn parse_ids(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .collect()
}

fn parse_number(value: &str, param: &str) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            debug!(param, value, "Unparseable number, ignoring");
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn is_post_type_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 20
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
