//! Presentation labels with market-specific vendor branding

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{CanonicalId, CanonicalKey, CanonicalMetricSet, ServiceLine, VendorProductMapping};
use crate::services::sources::VendorMappingSource;

/// Market a label is rendered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorContext {
    pub market_id: CanonicalId,
}

impl VendorContext {
    pub fn market(market_id: CanonicalId) -> Self {
        Self { market_id }
    }
}

/// Immutable index of active vendor-product mappings
#[derive(Debug, Clone, Default)]
pub struct VendorCatalog {
    index: HashMap<(CanonicalId, String), String>,
}

impl VendorCatalog {
    pub fn new(mappings: &[VendorProductMapping]) -> Self {
        let mut index = HashMap::new();
        for mapping in mappings.iter().filter(|m| m.active) {
            index
                .entry((mapping.market_id.clone(), mapping.service_key.trim().to_string()))
                .or_insert_with(|| mapping.branded_name.clone());
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

impl VendorMappingSource for VendorCatalog {
    fn branded_name(&self, market_id: &CanonicalId, service_key: &str) -> Option<String> {
        self.index
            .get(&(market_id.clone(), service_key.to_string()))
            .cloned()
    }

    fn vendor_view(&self) -> Arc<VendorCatalog> {
        Arc::new(self.clone())
    }
}

pub struct DisplayMapper<'a> {
    vendors: &'a dyn VendorMappingSource,
}

impl<'a> DisplayMapper<'a> {
    pub fn new(vendors: &'a dyn VendorMappingSource) -> Self {
        Self { vendors }
    }

    /// Branded name if the market has one, else the canonical label.
    ///
    /// Mappings were entered under several historical spellings, so lookup
    /// tries the canonical key, then the human label, then the camelCase
    /// field name; first hit wins.
    pub fn label(&self, key: CanonicalKey, context: Option<&VendorContext>) -> String {
        let Some(context) = context else {
            return key.label().to_string();
        };

        [key.id(), key.label(), key.field_name()]
            .into_iter()
            .find_map(|spelling| self.vendors.branded_name(&context.market_id, spelling))
            .unwrap_or_else(|| key.label().to_string())
    }

    /// Service counters in catalogue order with presentation labels
    pub fn service_lines(
        &self,
        metrics: &CanonicalMetricSet,
        context: Option<&VendorContext>,
    ) -> Vec<ServiceLine> {
        metrics
            .iter()
            .filter(|(key, _)| key.is_service())
            .map(|(key, value)| ServiceLine {
                key,
                label: self.label(key, context),
                value,
            })
            .collect()
    }
}
