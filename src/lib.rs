//! Performance data reconciliation and scorecard aggregation
//!
//! Uploaded month-to-date snapshots are resolved to canonical entities,
//! deduplicated by "latest wins", normalized into a fixed metric key space and
//! rolled up per advisor, store or market.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod services;

pub use error::{EngineError, EngineResult};
