//! Rollup results handed to the UI and the assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::models::mapping::{CanonicalId, EntityType};
use crate::models::metrics::{CanonicalKey, CanonicalMetricSet};
use crate::models::snapshot::Period;
use crate::reconcile::derived::DerivedValues;

/// Level of the hierarchy a rollup is computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Advisor,
    Store,
    Market,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Advisor => "advisor",
            Scope::Store => "store",
            Scope::Market => "market",
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Scope::Advisor => EntityType::Advisor,
            Scope::Store => EntityType::Store,
            Scope::Market => EntityType::Market,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisor" => Ok(Scope::Advisor),
            "store" => Ok(Scope::Store),
            "market" => Ok(Scope::Market),
            other => Err(EngineError::InvalidInput(format!("unknown scope '{}'", other))),
        }
    }
}

/// Whether a rollup is backed by data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataStatus {
    /// At least one snapshot selected and nothing in scope was excluded
    Present,
    /// Snapshots selected, but some in-scope rows were excluded as unmapped
    Partial,
    /// No snapshot found; metrics are absent, not zero
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCompleteness {
    pub status: DataStatus,
    pub stores_covered: usize,
    pub excluded_unresolved: usize,
}

impl DataCompleteness {
    pub fn no_data(excluded_unresolved: usize) -> Self {
        Self {
            status: DataStatus::NoData,
            stores_covered: 0,
            excluded_unresolved,
        }
    }

    pub fn has_data(&self) -> bool {
        self.status != DataStatus::NoData
    }
}

/// Recovered data-quality condition attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataQualityWarning {
    #[serde(rename_all = "camelCase")]
    AmbiguousDuplicate {
        grouping_key: String,
        upload_timestamp: DateTime<Utc>,
        candidates: usize,
    },
    #[serde(rename_all = "camelCase")]
    UnresolvedEntity {
        spreadsheet_name: String,
        entity_type: EntityType,
        snapshots: usize,
    },
    #[serde(rename_all = "camelCase")]
    NormalizationMiss { key: String, occurrences: usize },
}

/// One service counter with its presentation label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub key: CanonicalKey,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub scope: Scope,
    pub scope_id: CanonicalId,
    pub period: Period,
    pub metrics: Option<CanonicalMetricSet>,
    pub services: Option<Vec<ServiceLine>>,
    pub derived_percentages: Option<DerivedValues>,
    pub source_snapshot_count: usize,
    pub data_completeness: DataCompleteness,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DataQualityWarning>,
}

impl Scorecard {
    pub fn has_data(&self) -> bool {
        self.data_completeness.has_data()
    }

    /// Metric value, or `None` when the scope has no data
    pub fn metric(&self, key: CanonicalKey) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.get(key))
    }

    pub fn count_warnings(&self, pred: impl Fn(&DataQualityWarning) -> bool) -> usize {
        self.warnings.iter().filter(|w| pred(w)).count()
    }
}

/// One store's slice of a multi-store advisor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRollup {
    pub store_id: CanonicalId,
    pub market_id: CanonicalId,
    #[serde(flatten)]
    pub scorecard: Scorecard,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiStoreBreakdown {
    pub advisor_id: CanonicalId,
    pub period: Period,
    pub per_store_rollups: Vec<StoreRollup>,
    pub combined_rollup: Scorecard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedEntry {
    pub spreadsheet_name: String,
    pub entity_type: EntityType,
    pub snapshot_count: usize,
}

/// Names with no active mapping, for operator follow-up
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedReport {
    pub period: Period,
    pub entries: Vec<UnmappedEntry>,
}
