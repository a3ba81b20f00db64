//! In-memory dataset store backing the binaries and tests
//!
//! Snapshot list and mapping tables sit behind copy-on-write `Arc`s. Readers
//! clone the `Arc` under a short read lock and work on that immutable view;
//! appends and mapping edits build a new view and swap it in, so a fetch never
//! observes a half-applied write.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    CanonicalId, EntityMapping, EntityType, Period, Scope, Snapshot, VendorProductMapping,
};
use crate::reconcile::display::VendorCatalog;
use crate::reconcile::resolver::{normalize_name, MappingTable};
use crate::services::sources::{EntityMappingSource, SnapshotSource, VendorMappingSource};

/// Serialized form of a dataset file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub entity_mappings: Vec<EntityMapping>,
    #[serde(default)]
    pub vendor_mappings: Vec<VendorProductMapping>,
}

impl Dataset {
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EngineError::Dataset(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::Dataset(format!("invalid dataset: {}", e)))
    }
}

struct Mappings {
    entity_rows: Vec<EntityMapping>,
    vendor_rows: Vec<VendorProductMapping>,
    entities: Arc<MappingTable>,
    vendors: Arc<VendorCatalog>,
}

impl Mappings {
    fn build(entity_rows: Vec<EntityMapping>, vendor_rows: Vec<VendorProductMapping>) -> Self {
        Self {
            entities: Arc::new(MappingTable::new(&entity_rows)),
            vendors: Arc::new(VendorCatalog::new(&vendor_rows)),
            entity_rows,
            vendor_rows,
        }
    }
}

pub struct InMemoryStore {
    snapshots: RwLock<Arc<Vec<Snapshot>>>,
    mappings: RwLock<Arc<Mappings>>,
}

impl InMemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        let mappings = Mappings::build(dataset.entity_mappings, dataset.vendor_mappings);
        info!(
            snapshots = dataset.snapshots.len(),
            entity_mappings = mappings.entities.len(),
            vendor_mappings = mappings.vendors.len(),
            "Dataset loaded"
        );
        Self {
            snapshots: RwLock::new(Arc::new(dataset.snapshots)),
            mappings: RwLock::new(Arc::new(mappings)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Dataset::default())
    }

    pub fn from_path(path: &Path) -> EngineResult<Self> {
        Ok(Self::new(Dataset::from_path(path)?))
    }

    /// Immutable view of all snapshots in ingestion order
    pub fn snapshot_view(&self) -> Arc<Vec<Snapshot>> {
        self.snapshots.read().clone()
    }

    /// Ingestion append
    pub fn append_snapshot(&self, snapshot: Snapshot) {
        let mut guard = self.snapshots.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(snapshot);
        *guard = Arc::new(next);
    }

    /// Administrative mapping edit: add a row, or replace the row for the
    /// same spelling and entity type
    pub fn upsert_entity_mapping(&self, mapping: EntityMapping) {
        let spelling = normalize_name(&mapping.spreadsheet_name);
        let mut guard = self.mappings.write();
        let mut rows = guard.entity_rows.clone();
        rows.retain(|row| {
            !(row.entity_type == mapping.entity_type
                && normalize_name(&row.spreadsheet_name) == spelling)
        });
        rows.push(mapping);
        let vendor_rows = guard.vendor_rows.clone();
        *guard = Arc::new(Mappings::build(rows, vendor_rows));
    }

    fn mappings(&self) -> Arc<Mappings> {
        self.mappings.read().clone()
    }
}

impl SnapshotSource for InMemoryStore {
    fn fetch_snapshots(
        &self,
        _scope: Scope,
        _scope_id: &CanonicalId,
        period: &Period,
    ) -> EngineResult<Vec<Snapshot>> {
        // Names are unresolved here, so the period is the narrowest filter
        self.fetch_period(period)
    }

    fn fetch_period(&self, period: &Period) -> EngineResult<Vec<Snapshot>> {
        Ok(self
            .snapshot_view()
            .iter()
            .filter(|s| period.contains(s.reporting_date))
            .cloned()
            .collect())
    }
}

impl EntityMappingSource for InMemoryStore {
    fn lookup(&self, normalized_name: &str, entity_type: EntityType) -> Option<CanonicalId> {
        self.mappings().entities.lookup(normalized_name, entity_type)
    }

    fn entity_view(&self) -> Arc<MappingTable> {
        self.mappings().entities.clone()
    }
}

impl VendorMappingSource for InMemoryStore {
    fn branded_name(&self, market_id: &CanonicalId, service_key: &str) -> Option<String> {
        self.mappings().vendors.branded_name(market_id, service_key)
    }

    fn vendor_view(&self) -> Arc<VendorCatalog> {
        self.mappings().vendors.clone()
    }
}
