//! Collaborator interfaces the engine reads from.
//!
//! Implementations must return data as visible at call time. A rollup reads
//! each source once: one snapshot fetch plus one immutable view per mapping
//! source, and every name and label in that rollup resolves against those
//! views.

use std::sync::Arc;

use crate::error::EngineResult;
use crate::models::{CanonicalId, EntityType, Period, Scope, Snapshot};
use crate::reconcile::display::VendorCatalog;
use crate::reconcile::resolver::MappingTable;

pub trait SnapshotSource {
    /// Candidate snapshots for a scope and period.
    ///
    /// Snapshots carry spreadsheet-native names, so sources may return a
    /// superset of the scope; the engine filters after resolution. Results
    /// must be in ingestion order (oldest first).
    fn fetch_snapshots(
        &self,
        scope: Scope,
        scope_id: &CanonicalId,
        period: &Period,
    ) -> EngineResult<Vec<Snapshot>>;

    /// Every snapshot reported in a period, in ingestion order
    fn fetch_period(&self, period: &Period) -> EngineResult<Vec<Snapshot>>;
}

pub trait EntityMappingSource {
    /// Canonical identity for an already case-normalized spreadsheet name.
    /// Only active mappings are visible.
    fn lookup(&self, normalized_name: &str, entity_type: EntityType) -> Option<CanonicalId>;

    /// Active mappings as of this call. Later edits must not show through
    /// the returned table.
    fn entity_view(&self) -> Arc<MappingTable>;
}

pub trait VendorMappingSource {
    /// Branded product name for a service spelling in a market, if an active
    /// mapping exists
    fn branded_name(&self, market_id: &CanonicalId, service_key: &str) -> Option<String>;

    /// Active vendor mappings as of this call
    fn vendor_view(&self) -> Arc<VendorCatalog>;
}
