//! Greedy allocation pass.
//!
//! One pass reads the budget, snapshots the catalog once, ranks it by price
//! and then repeatedly scans the ranking from the top, buying the first entry
//! the budget covers. After each purchase it waits for the page to settle,
//! re-reads the budget and restarts the scan on the same snapshot. The pass
//! ends at a fixed point: a full scan that buys nothing.
//!
//! Every snapshot entry is bought at most once per pass, so a pass performs at
//! most `snapshot.len()` purchases even if the budget keeps growing.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::error::SurfaceError;
use crate::core::plan::AllocationPlan;
use crate::core::types::{Budget, Purchase};
use crate::io::surface::Surface;
use crate::reader::StateReader;

/// Outcome of one allocation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Budget read at the start of the pass.
    pub budget_before: Option<Budget>,
    /// Budget after the last completed scan.
    pub budget_after: Option<Budget>,
    pub purchases: Vec<Purchase>,
    /// Scans over the snapshot, including the final empty one.
    pub scans: usize,
    /// Set when a read failed and the pass stopped early.
    pub aborted: Option<SurfaceError>,
}

impl PassReport {
    fn abort(mut self, err: SurfaceError) -> Self {
        warn!(err = %err, purchases = self.purchases.len(), "allocation pass aborted");
        self.aborted = Some(err);
        self
    }
}

pub struct Allocator<S> {
    reader: StateReader<S>,
    settle_delay: Duration,
}

impl<S: Surface> Allocator<S> {
    pub fn new(reader: StateReader<S>, settle_delay: Duration) -> Self {
        Self {
            reader,
            settle_delay,
        }
    }

    /// Run one pass to its fixed point. Read failures end the pass early and
    /// are reported, never raised.
    #[instrument(skip_all)]
    pub fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let mut budget = match self.reader.read_budget() {
            Ok(budget) => budget,
            Err(err) => return report.abort(err),
        };
        report.budget_before = Some(budget);
        report.budget_after = Some(budget);

        let snapshot = match self.reader.read_catalog() {
            Ok(snapshot) => snapshot,
            Err(err) => return report.abort(err),
        };
        let plan = AllocationPlan::from_snapshot(snapshot);
        debug!(budget, candidates = plan.len(), "allocation pass started");

        let mut consumed = vec![false; plan.len()];
        loop {
            report.scans += 1;
            let mut from = 0;
            let mut bought = false;

            while let Some(idx) = plan.first_affordable(budget, from, |i| consumed[i]) {
                from = idx + 1;
                let item = &plan.items()[idx];

                match self.reader.is_available(&item.handle) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(item = %item.description, "no longer available, skipping");
                        continue;
                    }
                    Err(err) => return report.abort(err),
                }

                match self.reader.surface().click(item.handle.as_str()) {
                    Ok(()) => {}
                    Err(SurfaceError::StaleReference(id)) => {
                        warn!(id, "control went stale, abandoning purchase");
                        consumed[idx] = true;
                        continue;
                    }
                    Err(err) => return report.abort(err),
                }
                consumed[idx] = true;
                thread::sleep(self.settle_delay);

                let budget_after = self.reader.read_budget();
                report.purchases.push(Purchase {
                    description: item.description.clone(),
                    price: item.price,
                    budget_after: budget_after.as_ref().ok().copied(),
                });
                match budget_after {
                    Ok(after) => {
                        info!(item = %item.description, price = item.price, budget_left = after, "bought");
                        budget = after;
                        report.budget_after = Some(after);
                    }
                    Err(err) => return report.abort(err),
                }
                bought = true;
                break;
            }

            if !bought {
                break;
            }
        }

        debug!(
            purchases = report.purchases.len(),
            scans = report.scans,
            "allocation pass reached fixed point"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::io::config::ElementIds;
    use crate::test_support::{ScriptedItem, ScriptedSurface};

    fn allocator(surface: &Arc<ScriptedSurface>, ids: &[&str]) -> Allocator<ScriptedSurface> {
        let reader = StateReader::new(
            Arc::clone(surface),
            ElementIds::default(),
            ids.iter().map(|id| id.to_string()).collect(),
        );
        Allocator::new(reader, Duration::ZERO)
    }

    #[test]
    fn scenario_a_buys_most_expensive_then_stops_when_nothing_fits() {
        let surface = Arc::new(
            ScriptedSurface::new(120)
                .with_item(ScriptedItem::new("big", "Big", 100))
                .with_item(ScriptedItem::new("small", "Small", 50)),
        );
        let report = allocator(&surface, &["small", "big"]).run_pass();

        assert_eq!(surface.purchases(), vec!["big"]);
        assert_eq!(report.purchases.len(), 1);
        assert_eq!(report.purchases[0].price, 100);
        assert_eq!(report.purchases[0].budget_after, Some(20));
        assert_eq!(report.budget_before, Some(120));
        assert_eq!(report.budget_after, Some(20));
        assert_eq!(surface.budget(), Some(20));
        assert_eq!(report.scans, 2);
        assert!(report.aborted.is_none());
    }

    #[test]
    fn scenario_b_displayed_but_unavailable_item_is_never_bought() {
        let surface = Arc::new(
            ScriptedSurface::new(1_000_000)
                .with_item(ScriptedItem::new("locked", "Locked", 10).disabled()),
        );
        let report = allocator(&surface, &["locked"]).run_pass();

        assert!(surface.purchases().is_empty());
        assert!(report.purchases.is_empty());
        assert_eq!(surface.budget(), Some(1_000_000));
        assert!(!surface.calls().contains(&"click:locked".to_string()));
    }

    #[test]
    fn scenario_d_unreadable_budget_ends_pass_without_purchases() {
        let surface = Arc::new(
            ScriptedSurface::new(0)
                .with_unreadable_budget()
                .with_item(ScriptedItem::new("cheap", "Cheap", 1)),
        );
        let report = allocator(&surface, &["cheap"]).run_pass();

        assert!(report.purchases.is_empty());
        assert!(matches!(
            report.aborted,
            Some(SurfaceError::ReadFailure { .. })
        ));
        assert_eq!(report.scans, 0);
        assert!(surface.calls().iter().all(|call| !call.starts_with("click:")));
    }

    #[test]
    fn restarts_scan_from_top_after_each_purchase() {
        let surface = Arc::new(
            ScriptedSurface::new(180)
                .with_item(ScriptedItem::new("c", "C", 30))
                .with_item(ScriptedItem::new("a", "A", 100))
                .with_item(ScriptedItem::new("b", "B", 50)),
        );
        let report = allocator(&surface, &["c", "a", "b"]).run_pass();

        assert_eq!(surface.purchases(), vec!["a", "b", "c"]);
        let prices: Vec<u64> = report.purchases.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![100, 50, 30]);
        assert_eq!(report.budget_after, Some(0));
    }

    #[test]
    fn skips_unaffordable_top_entries_within_a_scan() {
        let surface = Arc::new(
            ScriptedSurface::new(150)
                .with_item(ScriptedItem::new("a", "A", 100))
                .with_item(ScriptedItem::new("b", "B", 60))
                .with_item(ScriptedItem::new("c", "C", 50)),
        );
        allocator(&surface, &["a", "b", "c"]).run_pass();

        assert_eq!(surface.purchases(), vec!["a", "c"]);
        assert_eq!(surface.budget(), Some(0));
    }

    #[test]
    fn purchases_per_pass_are_bounded_by_snapshot_size() {
        let surface = Arc::new(
            ScriptedSurface::new(u64::MAX / 2)
                .with_item(ScriptedItem::new("a", "A", 3))
                .with_item(ScriptedItem::new("b", "B", 2))
                .with_item(ScriptedItem::new("c", "C", 1)),
        );
        let report = allocator(&surface, &["a", "b", "c"]).run_pass();

        assert_eq!(report.purchases.len(), 3);
        assert_eq!(report.scans, 4);
    }

    #[test]
    fn availability_is_rechecked_right_before_each_click() {
        let surface = Arc::new(
            ScriptedSurface::new(500)
                .with_item(ScriptedItem::new("pledge", "Pledge", 200).one_off())
                .with_item(ScriptedItem::new("cursor", "Cursor", 15)),
        );
        allocator(&surface, &["pledge", "cursor"]).run_pass();

        let calls = surface.calls();
        for (idx, call) in calls.iter().enumerate() {
            if let Some(id) = call.strip_prefix("click:") {
                assert_eq!(calls[idx - 1], format!("state:{id}"));
            }
        }
        assert_eq!(surface.purchases(), vec!["pledge", "cursor"]);
    }

    #[test]
    fn stale_control_is_abandoned_and_scan_continues() {
        let surface = Arc::new(
            ScriptedSurface::new(1_000)
                .with_item(ScriptedItem::new("ghost", "Ghost", 900).stale())
                .with_item(ScriptedItem::new("cursor", "Cursor", 15)),
        );
        let report = allocator(&surface, &["ghost", "cursor"]).run_pass();

        assert_eq!(surface.purchases(), vec!["cursor"]);
        assert_eq!(report.purchases.len(), 1);
        assert!(report.aborted.is_none());
        let ghost_clicks = surface
            .calls()
            .iter()
            .filter(|call| *call == "click:ghost")
            .count();
        assert_eq!(ghost_clicks, 1);
    }

    #[test]
    fn empty_catalog_is_a_single_empty_scan() {
        let surface = Arc::new(ScriptedSurface::new(42));
        let report = allocator(&surface, &["missing"]).run_pass();

        assert!(report.purchases.is_empty());
        assert_eq!(report.scans, 1);
        assert_eq!(report.budget_before, report.budget_after);
    }
}
