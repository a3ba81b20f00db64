//! Environment-driven settings and the field-mapping tables
//!
//! The mapping tables are plain data. They are built once at startup (from the
//! built-in defaults or a JSON override file) and passed explicitly into the
//! normalizer; nothing reads them from global state.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::models::metrics::{CanonicalKey, CATALOGUE};

/// Deployment environment name (`APP_ENV`), defaults to `sandbox`
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

/// Process settings for the binaries
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub dataset_path: Option<PathBuf>,
    pub field_map_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            dataset_path: None,
            field_map_path: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Self {
            port,
            dataset_path: env::var("SCORECARD_DATASET_PATH").ok().map(PathBuf::from),
            field_map_path: env::var("SCORECARD_FIELD_MAP_PATH").ok().map(PathBuf::from),
        }
    }

    /// Field tables from the override file if configured, else the defaults
    pub fn load_field_map(&self) -> EngineResult<FieldMapConfig> {
        match &self.field_map_path {
            Some(path) => FieldMapConfig::from_path(path),
            None => Ok(FieldMapConfig::default()),
        }
    }
}

/// One source spelling that maps onto a canonical key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAlias {
    pub source: String,
    pub key: CanonicalKey,
}

impl FieldAlias {
    pub fn new(source: impl Into<String>, key: CanonicalKey) -> Self {
        Self {
            source: source.into(),
            key,
        }
    }
}

/// Alias tables for the three raw document shapes
///
/// Table order matters: when several aliases of one canonical key are present
/// in a document, the earliest alias in the table wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapConfig {
    /// Key of the nested "other services" sub-document
    pub nested_document_key: String,
    /// Human-readable labels used inside the nested sub-document
    pub label_aliases: Vec<FieldAlias>,
    /// Flattened template keys (lowercase, no separators)
    pub template_aliases: Vec<FieldAlias>,
    /// Non-metric keys that are expected and never count as misses
    #[serde(default)]
    pub ignored_keys: Vec<String>,
}

impl FieldMapConfig {
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EngineError::Dataset(format!(
                "failed to read field map {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::Dataset(format!("invalid field map: {}", e)))
    }
}

impl Default for FieldMapConfig {
    fn default() -> Self {
        use CanonicalKey as K;

        let mut label_aliases: Vec<FieldAlias> = CATALOGUE
            .iter()
            .map(|info| FieldAlias::new(info.label, info.key))
            .collect();
        label_aliases.extend([
            FieldAlias::new("Road Hazard", K::TireProtection),
            FieldAlias::new("Tire Protection Plan", K::TireProtection),
            FieldAlias::new("Pot. Alignments", K::PotentialAlignments),
            FieldAlias::new("Potential Alignment", K::PotentialAlignments),
            FieldAlias::new("Potential Alignments Converted", K::PotentialAlignmentsSold),
            FieldAlias::new("Brake Fluid Exchange", K::BrakeFlush),
            FieldAlias::new("Brakes", K::BrakeService),
            FieldAlias::new("Battery", K::Batteries),
            FieldAlias::new("Wipers", K::WiperBlades),
            FieldAlias::new("Cabin Filter", K::CabinAirFilter),
            FieldAlias::new("Air Filter", K::EngineAirFilter),
            FieldAlias::new("AC Recharge", K::AcService),
            FieldAlias::new("Fuel Injection Service", K::FuelSystemService),
            FieldAlias::new("Trans Flush", K::TransmissionFlush),
            FieldAlias::new("Shocks/Struts", K::ShocksStruts),
            FieldAlias::new("Nitrogen", K::Nitrogen),
        ]);

        let mut template_aliases: Vec<FieldAlias> = CATALOGUE
            .iter()
            .map(|info| FieldAlias::new(info.field.to_ascii_lowercase(), info.key))
            .collect();
        template_aliases.extend([
            FieldAlias::new("invoicecount", K::Invoices),
            FieldAlias::new("totalsales", K::Sales),
            FieldAlias::new("grossprofit", K::GpSales),
            FieldAlias::new("gp", K::GpSales),
            FieldAlias::new("tires", K::RetailTires),
            FieldAlias::new("roadhazard", K::TireProtection),
            FieldAlias::new("potentialalignment", K::PotentialAlignments),
            FieldAlias::new("brakefluidexchange", K::BrakeFlush),
            FieldAlias::new("battery", K::Batteries),
            FieldAlias::new("wipers", K::WiperBlades),
        ]);

        Self {
            nested_document_key: "otherServices".to_string(),
            label_aliases,
            template_aliases,
            ignored_keys: [
                "advisorName",
                "storeName",
                "marketName",
                "employeeId",
                "storeNumber",
                "rank",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}
