// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Synonym Expander
//!
//! Turns a shopper's query into an engine expression: whitespace-separated
//! tokens are ANDed, and each token's variants (itself, its synonyms, and a
//! prefix wildcard for short tokens) are ORed.
//!
//! ```text
//! "red dress"  with red ↔ {crimson, scarlet}
//!     └─→ (red | crimson | scarlet | red*) dress
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cache::{SynonymCache, SynonymMap};
use crate::engine::escape_match;

/// One alternative spelling of a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Word or phrase matched as-is
    Exact(String),
    /// Word matched as a prefix: `word*`
    Prefix(String),
}

impl Variant {
    fn to_expression(&self) -> String {
        match self {
            Variant::Exact(term) if term.split_whitespace().nth(1).is_some() => {
                format!("\"{}\"", escape_match(term))
            }
            Variant::Exact(term) => escape_match(term),
            Variant::Prefix(term) => format!("{}*", escape_match(term)),
        }
    }
}

/// Variants of one query token; the first entry is the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermGroup {
    pub variants: Vec<Variant>,
}

impl TermGroup {
    fn to_expression(&self) -> String {
        let parts: Vec<String> = self.variants.iter().map(Variant::to_expression).collect();
        if parts.len() == 1 {
            parts[0].clone()
        } else {
            format!("({})", parts.join(" | "))
        }
    }
}

/// Words of a text query. Control characters separate words like spaces do.
pub fn query_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|token| !token.is_empty())
}

/// A text query after expansion: AND across groups, OR within a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpandedQuery {
    pub groups: Vec<TermGroup>,
}

impl ExpandedQuery {
    /// Tokens without any variants (used when no expansion ran).
    pub fn plain(text: &str) -> Self {
        Self {
            groups: query_tokens(text)
                .map(|token| TermGroup {
                    variants: vec![Variant::Exact(token.to_string())],
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Engine-native expression, already escaped for a `MATCH('...')` literal.
    pub fn to_expression(&self) -> String {
        self.groups
            .iter()
            .map(TermGroup::to_expression)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Expand `raw` against `map`.
///
/// Tokens shorter than the engine's minimum word length are still emitted;
/// the engine decides whether they contribute.
pub fn expand_with(map: &SynonymMap, raw: &str, wildcard_min: usize, wildcard_max: usize) -> ExpandedQuery {
    let groups = query_tokens(raw)
        .map(|token| {
            let mut variants = vec![Variant::Exact(token.to_string())];
            for synonym in map.lookup(token) {
                let duplicate = variants.iter().any(|v| match v {
                    Variant::Exact(existing) => existing.eq_ignore_ascii_case(synonym),
                    Variant::Prefix(_) => false,
                });
                if !duplicate {
                    variants.push(Variant::Exact(synonym.clone()));
                }
            }
            let len = token.chars().count();
            if (wildcard_min..=wildcard_max).contains(&len) {
                variants.push(Variant::Prefix(token.to_string()));
            }
            TermGroup { variants }
        })
        .collect();
    ExpandedQuery { groups }
}

/// Expands queries against the shared synonym cache.
pub struct SynonymExpander {
    cache: Arc<SynonymCache>,
    wildcard_min: usize,
    wildcard_max: usize,
}

impl SynonymExpander {
    pub fn new(cache: Arc<SynonymCache>, wildcard_min: usize, wildcard_max: usize) -> Self {
        Self {
            cache,
            wildcard_min,
            wildcard_max,
        }
    }

    pub fn cache(&self) -> &Arc<SynonymCache> {
        &self.cache
    }

    pub async fn expand(&self, raw: &str) -> ExpandedQuery {
        let map = self.cache.get().await;
        expand_with(&map, raw, self.wildcard_min, self.wildcard_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synonyms::SynonymGroup;

    fn map() -> SynonymMap {
        SynonymMap::from_groups(&[
            SynonymGroup::new("red", vec!["crimson".into(), "scarlet".into()]),
            SynonymGroup::new("tee", vec!["t-shirt".into()]),
            SynonymGroup::new("sofa", vec!["couch".into(), "settee".into()]),
        ])
    }

    #[test]
    fn test_synonyms_form_or_group() {
        let expanded = expand_with(&map(), "red", 0, 0);
        assert_eq!(expanded.to_expression(), "(red | crimson | scarlet)");
    }

    #[test]
    fn test_reverse_lookup() {
        let expanded = expand_with(&map(), "crimson", 0, 0);
        let expr = expanded.to_expression();
        assert!(expr.contains("red"));
        assert!(expr.contains("scarlet"));
    }

    #[test]
    fn test_control_characters_split_tokens() {
        let expanded = expand_with(&SynonymMap::default(), "blue\u{7}dress\u{0}", 0, 0);
        assert_eq!(expanded.to_expression(), "blue dress");
        assert!(ExpandedQuery::plain("\u{7}\u{1b}").is_empty());
    }

    #[test]
    fn test_two_words_without_synonyms_are_anded() {
        let expanded = expand_with(&SynonymMap::default(), "blue dress", 0, 0);
        assert_eq!(expanded.to_expression(), "blue dress");
        assert_eq!(expanded.groups.len(), 2);
    }

    #[test]
    fn test_short_token_gets_prefix_variant() {
        let expanded = expand_with(&SynonymMap::default(), "sock", 3, 4);
        assert_eq!(expanded.to_expression(), "(sock | sock*)");

        let expanded = expand_with(&SynonymMap::default(), "socks", 3, 4);
        assert_eq!(expanded.to_expression(), "socks");
    }

    #[test]
    fn test_tiny_tokens_still_emitted() {
        let expanded = expand_with(&SynonymMap::default(), "a xl shirt", 3, 4);
        assert_eq!(expanded.to_expression(), "a xl shirt");
    }

    #[test]
    fn test_synonym_and_wildcard_together() {
        let expanded = expand_with(&map(), "tee", 3, 4);
        assert_eq!(expanded.to_expression(), "(tee | t\\\\-shirt | tee*)");
    }

    #[test]
    fn test_phrase_synonym_quoted() {
        let map = SynonymMap::from_groups(&[SynonymGroup::new("navy", vec!["dark blue".into()])]);
        let expanded = expand_with(&map, "navy", 0, 0);
        assert_eq!(expanded.to_expression(), "(navy | \"dark blue\")");
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let expanded = expand_with(&map(), "Sofa", 0, 0);
        assert_eq!(expanded.to_expression(), "(Sofa | couch | settee)");
    }

    #[test]
    fn test_plain_matches_expand_without_map() {
        assert_eq!(
            ExpandedQuery::plain("red  dress"),
            expand_with(&SynonymMap::default(), "red dress", 0, 0)
        );
    }
}
