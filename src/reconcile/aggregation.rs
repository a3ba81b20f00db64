//! Summation across the advisor → store → market hierarchy

use crate::models::{CanonicalMetricSet, Snapshot};
use crate::reconcile::normalizer::{FieldNormalizer, NormalizationReport};
use crate::reconcile::selector::{ScopeSelection, Selected, StorePlan, StoreSelection};

/// Summed metrics plus what went into them
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub metrics: CanonicalMetricSet,
    pub source_snapshot_count: usize,
    pub report: NormalizationReport,
}

impl Aggregate {
    fn empty() -> Self {
        Self {
            metrics: CanonicalMetricSet::zero(),
            source_snapshot_count: 0,
            report: NormalizationReport::default(),
        }
    }

    fn absorb(&mut self, other: Aggregate) {
        self.metrics += &other.metrics;
        self.source_snapshot_count += other.source_snapshot_count;
        self.report.merge(other.report);
    }
}

/// Sums already-deduplicated selections. Never picks between snapshots.
pub struct Aggregator;

impl Aggregator {
    /// Field-wise sum of canonical sets
    pub fn sum<'a>(sets: impl IntoIterator<Item = &'a CanonicalMetricSet>) -> CanonicalMetricSet {
        sets.into_iter().sum()
    }

    pub fn aggregate(selection: &ScopeSelection<'_>, normalizer: &FieldNormalizer) -> Aggregate {
        match selection {
            // Advisor: one independently-selected row per store, summed
            ScopeSelection::Advisor(stores) => {
                let mut total = Aggregate::empty();
                for plan in stores {
                    total.absorb(Self::normalize_one(&plan.selected, normalizer));
                }
                total
            }
            ScopeSelection::Store(plan) => match plan {
                Some(plan) => Self::aggregate_store(plan, normalizer),
                None => Aggregate::empty(),
            },
            // Market: sum of store rollups
            ScopeSelection::Market(plans) => {
                let mut total = Aggregate::empty();
                for plan in plans {
                    total.absorb(Self::aggregate_store(plan, normalizer));
                }
                total
            }
        }
    }

    /// The store-level row alone, or the sum of advisor rows when the store
    /// has no store-level row in the period
    pub fn aggregate_store(plan: &StorePlan<'_>, normalizer: &FieldNormalizer) -> Aggregate {
        match &plan.selection {
            StoreSelection::StoreLevel(selected) => Self::normalize_one(selected, normalizer),
            StoreSelection::AdvisorLevel(rows) => {
                let mut total = Aggregate::empty();
                for selected in rows {
                    total.absorb(Self::normalize_one(selected, normalizer));
                }
                total
            }
        }
    }

    fn normalize_one(selected: &Selected<'_>, normalizer: &FieldNormalizer) -> Aggregate {
        let snapshot: &Snapshot = &selected.snapshot.snapshot;
        let (metrics, report) = normalizer.normalize_with_report(&snapshot.raw_metrics);
        Aggregate {
            metrics,
            source_snapshot_count: 1,
            report,
        }
    }
}
