//! Collaborator interfaces and the in-memory dataset store.

pub mod dataset;
pub mod sources;

pub use dataset::{Dataset, InMemoryStore};
pub use sources::{EntityMappingSource, SnapshotSource, VendorMappingSource};
