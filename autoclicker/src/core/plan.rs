//! Greedy purchase ordering.
//!
//! The plan ranks the available entries of one catalog snapshot by price,
//! highest first. Price is the only signal the surface exposes, so the ranking
//! ignores what an item produces: a cheaper item with a better payback is still
//! ranked below a pricier one. That is the intended heuristic.

use crate::core::types::{Budget, CatalogItem};

/// Available catalog entries, highest price first, consumed strictly in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    items: Vec<CatalogItem>,
}

impl AllocationPlan {
    /// Build the plan for a snapshot. Unavailable entries are dropped; equal
    /// prices keep their configured order.
    pub fn from_snapshot(snapshot: Vec<CatalogItem>) -> Self {
        let mut items: Vec<CatalogItem> = snapshot
            .into_iter()
            .filter(|item| item.availability)
            .collect();
        items.sort_by(|a, b| b.price.cmp(&a.price));
        Self { items }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the first entry at or after `from` that `budget` covers and
    /// `skip` does not exclude.
    pub fn first_affordable(
        &self,
        budget: Budget,
        from: usize,
        skip: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .skip(from)
            .find(|(idx, item)| item.price <= budget && !skip(*idx))
            .map(|(idx, _)| idx)
    }
}
