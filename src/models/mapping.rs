//! Identity and vendor mapping rows maintained by operators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Canonical identity of an advisor, store or market
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(pub String);

impl CanonicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of entity a spreadsheet name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Advisor,
    Store,
    Market,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Advisor => "advisor",
            EntityType::Store => "store",
            EntityType::Market => "market",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisor" => Ok(EntityType::Advisor),
            "store" => Ok(EntityType::Store),
            "market" => Ok(EntityType::Market),
            other => Err(EngineError::InvalidInput(format!(
                "unknown entity type '{}'",
                other
            ))),
        }
    }
}

/// One spreadsheet spelling linked to a canonical identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMapping {
    pub spreadsheet_name: String,
    pub canonical_identity: CanonicalId,
    pub entity_type: EntityType,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl EntityMapping {
    pub fn new(
        spreadsheet_name: impl Into<String>,
        canonical_identity: impl Into<String>,
        entity_type: EntityType,
    ) -> Self {
        Self {
            spreadsheet_name: spreadsheet_name.into(),
            canonical_identity: CanonicalId::new(canonical_identity),
            entity_type,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Market-specific branded product name for a service
///
/// `service_key` is whatever spelling the mapping was entered under: the
/// snake_case canonical key, the human label, or the camelCase field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorProductMapping {
    pub market_id: CanonicalId,
    pub service_key: String,
    pub branded_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl VendorProductMapping {
    pub fn new(
        market_id: impl Into<String>,
        service_key: impl Into<String>,
        branded_name: impl Into<String>,
    ) -> Self {
        Self {
            market_id: CanonicalId::new(market_id),
            service_key: service_key.into(),
            branded_name: branded_name.into(),
            active: true,
        }
    }
}

fn default_active() -> bool {
    true
}
