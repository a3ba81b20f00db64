//! Spreadsheet name to canonical identity resolution

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{CanonicalId, EntityMapping, EntityType, ResolvedSnapshot, Snapshot};
use crate::services::sources::EntityMappingSource;

/// A name with no active mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnresolvedEntity {
    pub spreadsheet_name: String,
    pub entity_type: EntityType,
}

/// Case normalization applied on both sides of a lookup.
///
/// Only surrounding whitespace and letter case are folded. Punctuation and
/// inner spacing are significant so near-duplicate spellings stay unresolved.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Immutable index of active entity mappings
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    index: HashMap<(EntityType, String), CanonicalId>,
}

impl MappingTable {
    pub fn new(mappings: &[EntityMapping]) -> Self {
        let mut index: HashMap<(EntityType, String), CanonicalId> = HashMap::new();

        for mapping in mappings.iter().filter(|m| m.active) {
            let name = normalize_name(&mapping.spreadsheet_name);
            if name.is_empty() {
                continue;
            }
            match index.get(&(mapping.entity_type, name.clone())) {
                Some(existing) if existing != &mapping.canonical_identity => {
                    warn!(
                        name = %mapping.spreadsheet_name,
                        entity_type = %mapping.entity_type,
                        kept = %existing,
                        ignored = %mapping.canonical_identity,
                        "Conflicting active mappings for one spelling, keeping the first"
                    );
                }
                Some(_) => {}
                None => {
                    index.insert(
                        (mapping.entity_type, name),
                        mapping.canonical_identity.clone(),
                    );
                }
            }
        }

        Self { index }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl EntityMappingSource for MappingTable {
    fn lookup(&self, normalized_name: &str, entity_type: EntityType) -> Option<CanonicalId> {
        self.index
            .get(&(entity_type, normalized_name.to_string()))
            .cloned()
    }

    fn entity_view(&self) -> Arc<MappingTable> {
        Arc::new(self.clone())
    }
}

/// Per-name outcome for a snapshot that failed to resolve fully
#[derive(Debug, Clone)]
pub struct PartialResolution {
    pub advisor: Option<CanonicalId>,
    pub store: Option<CanonicalId>,
    pub market: Option<CanonicalId>,
    pub store_level: bool,
    pub failures: Vec<UnresolvedEntity>,
}

/// Pure lookup over an entity mapping source
pub struct EntityResolver<'a> {
    source: &'a dyn EntityMappingSource,
}

impl<'a> EntityResolver<'a> {
    pub fn new(source: &'a dyn EntityMappingSource) -> Self {
        Self { source }
    }

    pub fn resolve(
        &self,
        spreadsheet_name: &str,
        entity_type: EntityType,
    ) -> Result<CanonicalId, UnresolvedEntity> {
        let normalized = normalize_name(spreadsheet_name);
        let unresolved = || UnresolvedEntity {
            spreadsheet_name: spreadsheet_name.trim().to_string(),
            entity_type,
        };
        if normalized.is_empty() {
            return Err(unresolved());
        }
        self.source
            .lookup(&normalized, entity_type)
            .ok_or_else(unresolved)
    }

    /// Resolve every name on a snapshot.
    ///
    /// Fails if any name is unmapped; the error keeps whatever did resolve so
    /// callers can tell which scope the excluded row would have counted in.
    pub fn resolve_snapshot(&self, snapshot: &Snapshot) -> Result<ResolvedSnapshot, PartialResolution> {
        let mut failures = Vec::new();

        let advisor = match &snapshot.advisor_name {
            Some(name) => match self.resolve(name, EntityType::Advisor) {
                Ok(id) => Some(id),
                Err(e) => {
                    failures.push(e);
                    None
                }
            },
            None => None,
        };
        let store = self
            .resolve(&snapshot.store_name, EntityType::Store)
            .map_err(|e| failures.push(e))
            .ok();
        let market = self
            .resolve(&snapshot.market_name, EntityType::Market)
            .map_err(|e| failures.push(e))
            .ok();

        match (store, market) {
            (Some(store), Some(market)) if failures.is_empty() => Ok(ResolvedSnapshot {
                advisor,
                store,
                market,
                snapshot: snapshot.clone(),
            }),
            (store, market) => {
                debug!(
                    snapshot = ?snapshot.id,
                    failures = failures.len(),
                    "Snapshot excluded: unresolved names"
                );
                Err(PartialResolution {
                    advisor,
                    store,
                    market,
                    store_level: snapshot.is_store_level(),
                    failures,
                })
            }
        }
    }
}
