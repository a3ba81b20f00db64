//! Authoritative snapshot selection ("latest wins" per grouping key)
//!
//! Snapshots hold month-to-date cumulative totals, so within a period exactly
//! one snapshot per grouping key counts. Everything in this module decides
//! *which* snapshots count; nothing here sums. The aggregator only ever sees
//! the selections built here.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::models::{CanonicalId, DataQualityWarning, GroupingKey, Period, ResolvedSnapshot, Snapshot};

/// The snapshot chosen for one grouping key
#[derive(Debug, Clone)]
pub struct Selected<'a> {
    pub snapshot: &'a ResolvedSnapshot,
    /// Number of candidates that shared the key and period
    pub candidates: usize,
    pub warning: Option<DataQualityWarning>,
}

/// How a store's total is sourced. The two variants are exclusive, so
/// store-level and advisor-level rows can never land in one sum.
#[derive(Debug, Clone)]
pub enum StoreSelection<'a> {
    StoreLevel(Selected<'a>),
    AdvisorLevel(Vec<Selected<'a>>),
}

impl<'a> StoreSelection<'a> {
    pub fn selected(&self) -> Vec<&Selected<'a>> {
        match self {
            StoreSelection::StoreLevel(one) => vec![one],
            StoreSelection::AdvisorLevel(many) => many.iter().collect(),
        }
    }

    pub fn is_store_level(&self) -> bool {
        matches!(self, StoreSelection::StoreLevel(_))
    }
}

#[derive(Debug, Clone)]
pub struct StorePlan<'a> {
    pub store: CanonicalId,
    pub market: CanonicalId,
    pub selection: StoreSelection<'a>,
}

/// One store an advisor appeared in, with its own independent selection
#[derive(Debug, Clone)]
pub struct AdvisorStorePlan<'a> {
    pub store: CanonicalId,
    pub market: CanonicalId,
    pub selected: Selected<'a>,
}

/// Deduplicated input for one scope's rollup
#[derive(Debug, Clone)]
pub enum ScopeSelection<'a> {
    Advisor(Vec<AdvisorStorePlan<'a>>),
    Store(Option<StorePlan<'a>>),
    Market(Vec<StorePlan<'a>>),
}

impl<'a> ScopeSelection<'a> {
    /// Every selected snapshot, once each
    pub fn selected(&self) -> Vec<&Selected<'a>> {
        match self {
            ScopeSelection::Advisor(stores) => stores.iter().map(|s| &s.selected).collect(),
            ScopeSelection::Store(plan) => plan
                .iter()
                .flat_map(|p| p.selection.selected())
                .collect(),
            ScopeSelection::Market(plans) => plans
                .iter()
                .flat_map(|p| p.selection.selected())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ScopeSelection::Advisor(stores) => stores.is_empty(),
            ScopeSelection::Store(plan) => plan.is_none(),
            ScopeSelection::Market(plans) => plans.is_empty(),
        }
    }

    /// Distinct stores contributing to the rollup
    pub fn stores(&self) -> Vec<&CanonicalId> {
        let stores: BTreeSet<&CanonicalId> = match self {
            ScopeSelection::Advisor(stores) => stores.iter().map(|s| &s.store).collect(),
            ScopeSelection::Store(plan) => plan.iter().map(|p| &p.store).collect(),
            ScopeSelection::Market(plans) => plans.iter().map(|p| &p.store).collect(),
        };
        stores.into_iter().collect()
    }

    /// Stores whose total comes from a store-level row
    pub fn store_level_stores(&self) -> Vec<&CanonicalId> {
        match self {
            ScopeSelection::Advisor(_) => Vec::new(),
            ScopeSelection::Store(plan) => plan
                .iter()
                .filter(|p| p.selection.is_store_level())
                .map(|p| &p.store)
                .collect(),
            ScopeSelection::Market(plans) => plans
                .iter()
                .filter(|p| p.selection.is_store_level())
                .map(|p| &p.store)
                .collect(),
        }
    }

    pub fn warnings(&self) -> Vec<DataQualityWarning> {
        self.selected()
            .into_iter()
            .filter_map(|s| s.warning.clone())
            .collect()
    }
}

pub struct SnapshotSelector;

impl SnapshotSelector {
    /// Pick the authoritative snapshot for a grouping key within a period.
    ///
    /// Max upload timestamp wins. On a timestamp tie the candidates populating
    /// the most core figures (per `core_score`) beat null/placeholder rows; if
    /// that still leaves more than one, the one ingested last wins and, unless
    /// the tied documents are identical, an ambiguity warning is attached.
    /// `None` means no data, which callers must not read as zero.
    pub fn select<'a, F>(
        snapshots: &'a [ResolvedSnapshot],
        period: &Period,
        key: &GroupingKey,
        core_score: F,
    ) -> Option<Selected<'a>>
    where
        F: Fn(&Snapshot) -> usize,
    {
        let candidates: Vec<&ResolvedSnapshot> = snapshots
            .iter()
            .filter(|s| s.in_period(period) && &s.grouping_key() == key)
            .collect();

        let latest = candidates.iter().map(|s| s.upload_timestamp()).max()?;
        let tied: Vec<&ResolvedSnapshot> = candidates
            .iter()
            .copied()
            .filter(|s| s.upload_timestamp() == latest)
            .collect();

        if tied.len() == 1 {
            return Some(Selected {
                snapshot: tied[0],
                candidates: candidates.len(),
                warning: None,
            });
        }

        let scores: Vec<usize> = tied.iter().map(|s| core_score(&s.snapshot)).collect();
        let best = scores.iter().copied().max().unwrap_or(0);
        let populated: Vec<&ResolvedSnapshot> = tied
            .iter()
            .zip(&scores)
            .filter(|(_, score)| best > 0 && **score == best)
            .map(|(s, _)| *s)
            .collect();

        if populated.len() == 1 {
            debug!(
                key = %key,
                discarded = tied.len() - 1,
                "Duplicate upload resolved in favour of populated core metrics"
            );
            return Some(Selected {
                snapshot: populated[0],
                candidates: candidates.len(),
                warning: None,
            });
        }

        let pool = if populated.is_empty() { tied } else { populated };
        let chosen = *pool.last()?;
        let conflicting = pool
            .iter()
            .any(|s| s.snapshot.raw_metrics != chosen.snapshot.raw_metrics);

        let warning = if conflicting {
            warn!(
                key = %key,
                upload_timestamp = %latest,
                candidates = pool.len(),
                "Ambiguous duplicate snapshots, using the most recently ingested"
            );
            Some(DataQualityWarning::AmbiguousDuplicate {
                grouping_key: key.to_string(),
                upload_timestamp: latest,
                candidates: pool.len(),
            })
        } else {
            None
        };

        Some(Selected {
            snapshot: chosen,
            candidates: candidates.len(),
            warning,
        })
    }

    /// One independent selection per store the advisor appeared in
    pub fn select_advisor<'a, F>(
        snapshots: &'a [ResolvedSnapshot],
        period: &Period,
        advisor: &CanonicalId,
        core_score: F,
    ) -> ScopeSelection<'a>
    where
        F: Fn(&Snapshot) -> usize,
    {
        let stores: BTreeSet<&CanonicalId> = snapshots
            .iter()
            .filter(|s| s.in_period(period) && s.advisor.as_ref() == Some(advisor))
            .map(|s| &s.store)
            .collect();

        let plans = stores
            .into_iter()
            .filter_map(|store| {
                let key = GroupingKey::AdvisorAtStore {
                    advisor: advisor.clone(),
                    store: store.clone(),
                };
                Self::select(snapshots, period, &key, &core_score).map(|selected| {
                    AdvisorStorePlan {
                        store: store.clone(),
                        market: selected.snapshot.market.clone(),
                        selected,
                    }
                })
            })
            .collect();

        ScopeSelection::Advisor(plans)
    }

    /// Store-level row if one exists in the period, else one row per advisor
    pub fn select_store<'a, F>(
        snapshots: &'a [ResolvedSnapshot],
        period: &Period,
        store: &CanonicalId,
        core_score: F,
    ) -> Option<StorePlan<'a>>
    where
        F: Fn(&Snapshot) -> usize,
    {
        let store_key = GroupingKey::Store {
            store: store.clone(),
        };
        if let Some(selected) = Self::select(snapshots, period, &store_key, &core_score) {
            let shadowed = snapshots
                .iter()
                .filter(|s| s.in_period(period) && &s.store == store && s.advisor.is_some())
                .count();
            if shadowed > 0 {
                debug!(
                    store = %store,
                    advisor_rows = shadowed,
                    "Store-level snapshot is authoritative, advisor rows not summed"
                );
            }
            return Some(StorePlan {
                store: store.clone(),
                market: selected.snapshot.market.clone(),
                selection: StoreSelection::StoreLevel(selected),
            });
        }

        let advisors: BTreeSet<&CanonicalId> = snapshots
            .iter()
            .filter(|s| s.in_period(period) && &s.store == store)
            .filter_map(|s| s.advisor.as_ref())
            .collect();

        let selected: Vec<Selected<'a>> = advisors
            .into_iter()
            .filter_map(|advisor| {
                let key = GroupingKey::AdvisorAtStore {
                    advisor: advisor.clone(),
                    store: store.clone(),
                };
                Self::select(snapshots, period, &key, &core_score)
            })
            .collect();

        let market = selected.first()?.snapshot.market.clone();
        Some(StorePlan {
            store: store.clone(),
            market,
            selection: StoreSelection::AdvisorLevel(selected),
        })
    }

    /// One store plan per store reporting under the market
    pub fn select_market<'a, F>(
        snapshots: &'a [ResolvedSnapshot],
        period: &Period,
        market: &CanonicalId,
        core_score: F,
    ) -> Vec<StorePlan<'a>>
    where
        F: Fn(&Snapshot) -> usize,
    {
        let stores: BTreeSet<&CanonicalId> = snapshots
            .iter()
            .filter(|s| s.in_period(period) && &s.market == market)
            .map(|s| &s.store)
            .collect();

        stores
            .into_iter()
            .filter_map(|store| {
                Self::select_store(snapshots, period, store, &core_score)
                    .filter(|plan| &plan.market == market)
            })
            .collect()
    }
}
