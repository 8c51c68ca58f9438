// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reconciling: engine ids back to caller-facing order.

use std::collections::HashMap;

/// Re-sort `items` to the id sequence the engine returned.
///
/// Bulk fetch-by-id gives no ordering guarantee, so the engine order is
/// restored client-side. Items whose id is not in `ids` are dropped; ids
/// with no item are skipped.
pub fn order_by_ids<T, F>(ids: &[i64], items: Vec<T>, id_of: F) -> Vec<T>
where
    F: Fn(&T) -> i64,
{
    let mut by_id: HashMap<i64, T> = items.into_iter().map(|item| (id_of(&item), item)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Manual sort positions per (category, document).
///
/// Merchandisers pin products inside a category; pinned documents lead the
/// page by ascending position and everything else keeps the engine order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomPositions {
    positions: HashMap<(i64, i64), i64>,
}

impl CustomPositions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category_id: i64, document_id: i64, position: i64) {
        self.positions.insert((category_id, document_id), position);
    }

    pub fn with(mut self, category_id: i64, document_id: i64, position: i64) -> Self {
        self.set(category_id, document_id, position);
        self
    }

    pub fn position(&self, category_id: i64, document_id: i64) -> Option<i64> {
        self.positions.get(&(category_id, document_id)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Reorder `ids` for `category_id`. Stable: ties and unpositioned ids
    /// keep their relative order.
    pub fn apply(&self, category_id: i64, ids: &mut [i64]) {
        if self.positions.is_empty() {
            return;
        }
        ids.sort_by_key(|id| match self.position(category_id, *id) {
            Some(position) => (0, position),
            None => (1, 0),
        });
    }
}

impl FromIterator<((i64, i64), i64)> for CustomPositions {
    fn from_iter<I: IntoIterator<Item = ((i64, i64), i64)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_ids_restores_engine_order() {
        let fetched = vec![(3, "c"), (1, "a"), (2, "b"), (99, "stray")];
        let ordered = order_by_ids(&[2, 3, 4, 1], fetched, |(id, _)| *id);
        assert_eq!(ordered, vec![(2, "b"), (3, "c"), (1, "a")]);
    }

    #[test]
    fn test_positions_lead_in_ascending_order() {
        let positions = CustomPositions::new().with(15, 40, 2).with(15, 30, 1).with(99, 10, 0);
        let mut ids = vec![10, 20, 30, 40, 50];
        positions.apply(15, &mut ids);
        assert_eq!(ids, vec![30, 40, 10, 20, 50]);
    }

    #[test]
    fn test_positions_scoped_to_category() {
        let positions: CustomPositions = [((7, 3), 0)].into_iter().collect();
        let mut ids = vec![1, 2, 3];
        positions.apply(8, &mut ids);
        assert_eq!(ids, vec![1, 2, 3]);

        positions.apply(7, &mut ids);
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_equal_positions_keep_engine_order() {
        let positions = CustomPositions::new().with(1, 9, 5).with(1, 4, 5);
        let mut ids = vec![4, 7, 9];
        positions.apply(1, &mut ids);
        assert_eq!(ids, vec![4, 9, 7]);
    }
}
