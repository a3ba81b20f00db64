//! Scorecard orchestration: resolve → select → normalize → aggregate →
//! derive → label.
//!
//! The engine holds no mutable state. Each call takes one immutable view of
//! the mapping tables, then fetches snapshots once, and computes the whole
//! result from those. Calls may run concurrently with ingestion and mapping
//! edits; an edit landing mid-call shows up in the next call only.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FieldMapConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    CanonicalId, DataCompleteness, DataQualityWarning, DataStatus, EntityType, MultiStoreBreakdown, Period,
    ResolvedSnapshot, Scope, Scorecard, Snapshot, StoreRollup, UnmappedEntry, UnmappedReport,
};
use crate::reconcile::aggregation::Aggregator;
use crate::reconcile::derived::DerivedCalculator;
use crate::reconcile::display::{DisplayMapper, VendorCatalog, VendorContext};
use crate::reconcile::normalizer::FieldNormalizer;
use crate::reconcile::resolver::{EntityResolver, MappingTable, PartialResolution, UnresolvedEntity};
use crate::reconcile::selector::{ScopeSelection, SnapshotSelector};
use crate::services::sources::{EntityMappingSource, SnapshotSource, VendorMappingSource};

/// Snapshots split by whether every name resolved
struct ResolvedBatch {
    resolved: Vec<ResolvedSnapshot>,
    excluded: Vec<PartialResolution>,
}

impl ResolvedBatch {
    /// Excluded rows that would have counted toward this scope's total
    fn excluded_in_scope<'b>(
        &'b self,
        scope: Scope,
        scope_id: &CanonicalId,
        selection: &ScopeSelection<'_>,
    ) -> Vec<&'b PartialResolution> {
        let store_level = selection.store_level_stores();
        // Advisor rows at stores with an authoritative store-level row never
        // count, mapped or not.
        let shadowed = |p: &PartialResolution| {
            !p.store_level
                && p.store
                    .as_ref()
                    .map(|store| store_level.contains(&store))
                    .unwrap_or(false)
        };

        self.excluded
            .iter()
            .filter(|p| match scope {
                Scope::Advisor => p.advisor.as_ref() == Some(scope_id),
                Scope::Store => p.store.as_ref() == Some(scope_id) && !shadowed(p),
                Scope::Market => p.market.as_ref() == Some(scope_id) && !shadowed(p),
            })
            .collect()
    }
}

pub struct ScorecardEngine {
    snapshots: Arc<dyn SnapshotSource + Send + Sync>,
    entities: Arc<dyn EntityMappingSource + Send + Sync>,
    vendors: Arc<dyn VendorMappingSource + Send + Sync>,
    normalizer: FieldNormalizer,
    calculator: DerivedCalculator,
}

impl ScorecardEngine {
    pub fn new(
        snapshots: Arc<dyn SnapshotSource + Send + Sync>,
        entities: Arc<dyn EntityMappingSource + Send + Sync>,
        vendors: Arc<dyn VendorMappingSource + Send + Sync>,
        field_map: &FieldMapConfig,
    ) -> Self {
        Self {
            snapshots,
            entities,
            vendors,
            normalizer: FieldNormalizer::new(field_map),
            calculator: DerivedCalculator::default(),
        }
    }

    /// Canonical scorecard for one advisor, store or market over a period
    pub fn get_scorecard(
        &self,
        scope: Scope,
        scope_id: &CanonicalId,
        period: &Period,
    ) -> EngineResult<Scorecard> {
        validate_id(scope_id)?;
        let (entities, vendors) = self.mapping_views();
        let raw = self.snapshots.fetch_snapshots(scope, scope_id, period)?;
        let batch = self.resolve_batch(&raw, period, &entities);
        let core_score = |s: &Snapshot| self.normalizer.core_metric_count(&s.raw_metrics);

        let selection = match scope {
            Scope::Advisor => {
                SnapshotSelector::select_advisor(&batch.resolved, period, scope_id, core_score)
            }
            Scope::Store => ScopeSelection::Store(SnapshotSelector::select_store(
                &batch.resolved,
                period,
                scope_id,
                core_score,
            )),
            Scope::Market => ScopeSelection::Market(SnapshotSelector::select_market(
                &batch.resolved,
                period,
                scope_id,
                core_score,
            )),
        };

        let context = match (&scope, &selection) {
            (Scope::Market, _) => Some(VendorContext::market(scope_id.clone())),
            (_, selection) => shared_market(selection),
        };
        let excluded = batch.excluded_in_scope(scope, scope_id, &selection);

        Ok(self.build_scorecard(
            scope,
            scope_id,
            period,
            &selection,
            &excluded,
            context.as_ref(),
            &vendors,
        ))
    }

    /// Per-store rollups for an advisor plus their combined rollup
    pub fn get_multi_store_breakdown(
        &self,
        advisor_id: &CanonicalId,
        period: &Period,
    ) -> EngineResult<MultiStoreBreakdown> {
        validate_id(advisor_id)?;
        let (entities, vendors) = self.mapping_views();
        let raw = self
            .snapshots
            .fetch_snapshots(Scope::Advisor, advisor_id, period)?;
        let batch = self.resolve_batch(&raw, period, &entities);
        let core_score = |s: &Snapshot| self.normalizer.core_metric_count(&s.raw_metrics);

        let selection =
            SnapshotSelector::select_advisor(&batch.resolved, period, advisor_id, core_score);
        let excluded = batch.excluded_in_scope(Scope::Advisor, advisor_id, &selection);

        let per_store_rollups = match &selection {
            ScopeSelection::Advisor(plans) => plans
                .iter()
                .map(|plan| {
                    let single = ScopeSelection::Advisor(vec![plan.clone()]);
                    let at_store: Vec<&PartialResolution> = excluded
                        .iter()
                        .copied()
                        .filter(|p| p.store.as_ref() == Some(&plan.store))
                        .collect();
                    let context = VendorContext::market(plan.market.clone());
                    StoreRollup {
                        store_id: plan.store.clone(),
                        market_id: plan.market.clone(),
                        scorecard: self.build_scorecard(
                            Scope::Advisor,
                            advisor_id,
                            period,
                            &single,
                            &at_store,
                            Some(&context),
                            &vendors,
                        ),
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let context = shared_market(&selection);
        let combined_rollup = self.build_scorecard(
            Scope::Advisor,
            advisor_id,
            period,
            &selection,
            &excluded,
            context.as_ref(),
            &vendors,
        );

        Ok(MultiStoreBreakdown {
            advisor_id: advisor_id.clone(),
            period: *period,
            per_store_rollups,
            combined_rollup,
        })
    }

    /// Names with no active mapping and how many snapshots each one excluded
    pub fn unmapped_report(&self, period: &Period) -> EngineResult<UnmappedReport> {
        let entities = self.entities.entity_view();
        let raw = self.snapshots.fetch_period(period)?;
        let batch = self.resolve_batch(&raw, period, &entities);

        let mut counts: BTreeMap<(EntityType, String), usize> = BTreeMap::new();
        for partial in &batch.excluded {
            for failure in &partial.failures {
                *counts
                    .entry((failure.entity_type, failure.spreadsheet_name.clone()))
                    .or_insert(0) += 1;
            }
        }

        let entries = counts
            .into_iter()
            .map(|((entity_type, spreadsheet_name), snapshot_count)| UnmappedEntry {
                spreadsheet_name,
                entity_type,
                snapshot_count,
            })
            .collect();

        Ok(UnmappedReport {
            period: *period,
            entries,
        })
    }

    /// Mapping state one rollup resolves and labels against
    fn mapping_views(&self) -> (Arc<MappingTable>, Arc<VendorCatalog>) {
        (self.entities.entity_view(), self.vendors.vendor_view())
    }

    fn resolve_batch(
        &self,
        raw: &[Snapshot],
        period: &Period,
        entities: &MappingTable,
    ) -> ResolvedBatch {
        let resolver = EntityResolver::new(entities);
        let mut batch = ResolvedBatch {
            resolved: Vec::new(),
            excluded: Vec::new(),
        };

        for snapshot in raw.iter().filter(|s| period.contains(s.reporting_date)) {
            match resolver.resolve_snapshot(snapshot) {
                Ok(resolved) => batch.resolved.push(resolved),
                Err(partial) => batch.excluded.push(partial),
            }
        }

        debug!(
            period = %period,
            resolved = batch.resolved.len(),
            excluded = batch.excluded.len(),
            "Resolved snapshot batch"
        );
        batch
    }

    #[allow(clippy::too_many_arguments)]
    fn build_scorecard(
        &self,
        scope: Scope,
        scope_id: &CanonicalId,
        period: &Period,
        selection: &ScopeSelection<'_>,
        excluded: &[&PartialResolution],
        context: Option<&VendorContext>,
        vendors: &VendorCatalog,
    ) -> Scorecard {
        let mut warnings = selection.warnings();
        warnings.extend(unresolved_warnings(excluded));

        if selection.is_empty() {
            debug!(
                scope = %scope,
                scope_id = %scope_id,
                period = %period,
                "No snapshot found for scope"
            );
            return Scorecard {
                scope,
                scope_id: scope_id.clone(),
                period: *period,
                metrics: None,
                services: None,
                derived_percentages: None,
                source_snapshot_count: 0,
                data_completeness: DataCompleteness::no_data(excluded.len()),
                warnings,
            };
        }

        let aggregate = Aggregator::aggregate(selection, &self.normalizer);
        if !aggregate.report.is_clean() {
            warn!(
                scope = %scope,
                scope_id = %scope_id,
                misses = aggregate.report.total_misses(),
                "Raw keys matched no known shape and were read as 0"
            );
        }
        warnings.extend(aggregate.report.into_warnings());

        let derived = self.calculator.derive(&aggregate.metrics);
        let services =
            DisplayMapper::new(vendors).service_lines(&aggregate.metrics, context);

        let status = if excluded.is_empty() {
            DataStatus::Present
        } else {
            DataStatus::Partial
        };

        debug!(
            scope = %scope,
            scope_id = %scope_id,
            period = %period,
            snapshots = aggregate.source_snapshot_count,
            "Rollup computed"
        );

        Scorecard {
            scope,
            scope_id: scope_id.clone(),
            period: *period,
            metrics: Some(aggregate.metrics),
            services: Some(services),
            derived_percentages: Some(derived),
            source_snapshot_count: aggregate.source_snapshot_count,
            data_completeness: DataCompleteness {
                status,
                stores_covered: selection.stores().len(),
                excluded_unresolved: excluded.len(),
            },
            warnings,
        }
    }
}

fn validate_id(id: &CanonicalId) -> EngineResult<()> {
    if id.as_str().trim().is_empty() {
        return Err(EngineError::InvalidInput("scope id must not be empty".to_string()));
    }
    Ok(())
}

/// Vendor context when every selected row reports under one market
fn shared_market(selection: &ScopeSelection<'_>) -> Option<VendorContext> {
    let mut markets = selection
        .selected()
        .into_iter()
        .map(|s| &s.snapshot.market);
    let first = markets.next()?;
    if markets.all(|m| m == first) {
        Some(VendorContext::market(first.clone()))
    } else {
        None
    }
}

fn unresolved_warnings(excluded: &[&PartialResolution]) -> Vec<DataQualityWarning> {
    let mut counts: BTreeMap<&UnresolvedEntity, usize> = BTreeMap::new();
    for partial in excluded {
        for failure in &partial.failures {
            *counts.entry(failure).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(failure, snapshots)| {
            warn!(
                name = %failure.spreadsheet_name,
                entity_type = %failure.entity_type,
                snapshots,
                "Snapshots excluded: no active mapping"
            );
            DataQualityWarning::UnresolvedEntity {
                spreadsheet_name: failure.spreadsheet_name.clone(),
                entity_type: failure.entity_type,
                snapshots,
            }
        })
        .collect()
}
