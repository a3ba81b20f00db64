//! Shared data models spanning the engine layers.

pub mod mapping;
pub mod metrics;
pub mod scorecard;
pub mod snapshot;

pub use mapping::{CanonicalId, EntityMapping, EntityType, VendorProductMapping};
pub use metrics::{CanonicalKey, CanonicalMetricSet, MetricCategory};
pub use scorecard::{
    DataCompleteness, DataQualityWarning, DataStatus, MultiStoreBreakdown, Scope, Scorecard,
    ServiceLine, StoreRollup, UnmappedEntry, UnmappedReport,
};
pub use snapshot::{GroupingKey, Period, ResolvedSnapshot, Snapshot};
