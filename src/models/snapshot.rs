//! Uploaded snapshot records and reporting periods

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::models::mapping::CanonicalId;

/// One appearance of an advisor, or of a pre-aggregated store total, in one
/// uploaded file. Names are spreadsheet-native and unresolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reporting_date: NaiveDate,
    pub upload_timestamp: DateTime<Utc>,
    /// `None` marks a store-level total row
    #[serde(default)]
    pub advisor_name: Option<String>,
    pub store_name: String,
    pub market_name: String,
    #[serde(default)]
    pub raw_metrics: Value,
}

impl Snapshot {
    pub fn is_store_level(&self) -> bool {
        self.advisor_name.is_none()
    }
}

/// A (year, month) reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub const MIN_YEAR: i32 = 1900;
    pub const MAX_YEAR: i32 = 9999;

    pub fn new(year: i32, month: u32) -> EngineResult<Self> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(EngineError::InvalidInput(format!(
                "year {} out of range",
                year
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidInput(format!(
                "month {} out of range",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// Build a period from untyped request parts, e.g. query-string values
    pub fn from_parts(year: &str, month: &str) -> EngineResult<Self> {
        let year: i32 = year.trim().parse().map_err(|_| {
            EngineError::InvalidInput(format!("year '{}' is not numeric", year))
        })?;
        let month: u32 = month.trim().parse().map_err(|_| {
            EngineError::InvalidInput(format!("month '{}' is not numeric", month))
        })?;
        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = EngineError;

    /// Parses `YYYY-MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.split_once('-').ok_or_else(|| {
            EngineError::InvalidInput(format!("period '{}' is not YYYY-MM", s))
        })?;
        Self::from_parts(year, month)
    }
}

/// Key under which "latest wins" selection happens
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupingKey {
    AdvisorAtStore {
        advisor: CanonicalId,
        store: CanonicalId,
    },
    Store {
        store: CanonicalId,
    },
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingKey::AdvisorAtStore { advisor, store } => write!(f, "{}@{}", advisor, store),
            GroupingKey::Store { store } => write!(f, "store:{}", store),
        }
    }
}

/// A snapshot whose names all resolved to canonical identities
#[derive(Debug, Clone)]
pub struct ResolvedSnapshot {
    pub advisor: Option<CanonicalId>,
    pub store: CanonicalId,
    pub market: CanonicalId,
    pub snapshot: Snapshot,
}

impl ResolvedSnapshot {
    pub fn grouping_key(&self) -> GroupingKey {
        match &self.advisor {
            Some(advisor) => GroupingKey::AdvisorAtStore {
                advisor: advisor.clone(),
                store: self.store.clone(),
            },
            None => GroupingKey::Store {
                store: self.store.clone(),
            },
        }
    }

    pub fn upload_timestamp(&self) -> DateTime<Utc> {
        self.snapshot.upload_timestamp
    }

    pub fn in_period(&self, period: &Period) -> bool {
        period.contains(self.snapshot.reporting_date)
    }
}
