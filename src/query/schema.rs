// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index schema descriptor.
//!
//! The set of multi-valued attribute (MVA) fields depends on which attribute
//! taxonomies existed when the index was built, so it is declared up front
//! and injected into the compiler instead of being guessed from strings.
//!
//! ```text
//! taxonomy        MVA field
//! --------        ---------
//! pa_color        pa_color_ids
//! pa_Größe        pa_gr__e_ids
//! product_cat     category_ids   (fixed)
//! product_tag     tag_ids        (fixed)
//! ```

use std::collections::BTreeSet;

/// Fields every product index carries.
const PRODUCT_ATTRIBUTES: &[&str] = &[
    "post_type",
    "post_status",
    "post_date",
    "menu_order",
    "price",
    "stock_status",
    "stock_quantity",
    "average_rating",
    "total_sales",
    "visibility",
];

const PRODUCT_TEXT_FIELDS: &[&str] = &["title", "sku", "categories", "tags", "content"];

/// Known fields of one engine index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    /// Engine index name
    pub index: String,
    /// Scalar attributes (filterable/sortable)
    pub attributes: BTreeSet<String>,
    /// Multi-valued integer attributes
    pub mva_fields: BTreeSet<String>,
    /// Full-text fields usable in MATCH
    pub text_fields: BTreeSet<String>,
}

impl IndexSchema {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            attributes: BTreeSet::new(),
            mva_fields: BTreeSet::new(),
            text_fields: BTreeSet::new(),
        }
    }

    /// Standard product index with one MVA per attribute taxonomy.
    pub fn products<S: AsRef<str>>(index: impl Into<String>, attribute_taxonomies: &[S]) -> Self {
        let mut schema = Self::new(index).mva("category_ids").mva("tag_ids").mva("attribute_ids");
        for attr in PRODUCT_ATTRIBUTES {
            schema = schema.attribute(*attr);
        }
        for field in PRODUCT_TEXT_FIELDS {
            schema = schema.text(*field);
        }
        for taxonomy in attribute_taxonomies {
            schema = schema.taxonomy(taxonomy.as_ref());
        }
        schema
    }

    /// Add a scalar attribute
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into());
        self
    }

    /// Add an MVA field by its exact name
    pub fn mva(mut self, name: impl Into<String>) -> Self {
        self.mva_fields.insert(name.into());
        self
    }

    /// Add the MVA field for an attribute taxonomy
    pub fn taxonomy(mut self, taxonomy: &str) -> Self {
        self.mva_fields.insert(mva_field_name(taxonomy));
        self
    }

    /// Add a full-text field
    pub fn text(mut self, name: impl Into<String>) -> Self {
        self.text_fields.insert(name.into());
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn has_mva(&self, name: &str) -> bool {
        self.mva_fields.contains(name)
    }

    pub fn has_text_field(&self, name: &str) -> bool {
        self.text_fields.is_empty() || self.text_fields.contains(name)
    }

    /// MVA field for `taxonomy`, if the index was built with it.
    pub fn attribute_field(&self, taxonomy: &str) -> Option<String> {
        let field = mva_field_name(taxonomy);
        self.mva_fields.contains(&field).then_some(field)
    }
}

/// Lowercase ASCII, everything outside `[a-z0-9_]` becomes `_`.
pub fn sanitize_taxonomy(taxonomy: &str) -> String {
    taxonomy
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<sanitized taxonomy>_ids`
pub fn mva_field_name(taxonomy: &str) -> String {
    format!("{}_ids", sanitize_taxonomy(taxonomy))
}
