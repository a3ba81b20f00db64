//! Performance data reconciliation stages.

pub mod aggregation;
pub mod derived;
pub mod display;
pub mod engine;
pub mod normalizer;
pub mod resolver;
pub mod selector;

pub use aggregation::{Aggregate, Aggregator};
pub use derived::{DerivedCalculator, DerivedMetric, DerivedValues, Rounding};
pub use display::{DisplayMapper, VendorCatalog, VendorContext};
pub use engine::ScorecardEngine;
pub use normalizer::{FieldNormalizer, NormalizationReport};
pub use resolver::{EntityResolver, MappingTable, UnresolvedEntity};
pub use selector::{ScopeSelection, SnapshotSelector, StoreSelection};
