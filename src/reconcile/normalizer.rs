//! Raw metric document to canonical key space
//!
//! Each canonical key is resolved through a fixed alias order:
//!
//! 1. the direct camelCase field (`tireProtection`) at the top level
//! 2. a human label inside the nested "other services" document
//!    (`otherServices["Tire Protection"]`), in label-table order
//! 3. a flattened template key at the top level (`tireprotection`), in
//!    template-table order
//! 4. zero
//!
//! The first alias holding a non-zero number wins. Iteration follows the
//! tables, never the document, so source key order cannot change a result.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::config::FieldMapConfig;
use crate::models::{CanonicalKey, CanonicalMetricSet, DataQualityWarning};

/// Raw keys that matched none of the known shapes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    misses: BTreeMap<String, usize>,
}

impl NormalizationReport {
    pub fn record_miss(&mut self, key: &str) {
        *self.misses.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: NormalizationReport) {
        for (key, count) in other.misses {
            *self.misses.entry(key).or_insert(0) += count;
        }
    }

    pub fn total_misses(&self) -> usize {
        self.misses.values().sum()
    }

    pub fn misses(&self) -> impl Iterator<Item = (&str, usize)> {
        self.misses.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_clean(&self) -> bool {
        self.misses.is_empty()
    }

    pub fn into_warnings(self) -> Vec<DataQualityWarning> {
        self.misses
            .into_iter()
            .map(|(key, occurrences)| DataQualityWarning::NormalizationMiss { key, occurrences })
            .collect()
    }
}

/// Marker used when the whole document is not an object
pub const NON_OBJECT_DOCUMENT: &str = "$document";

/// Converts heterogeneous raw documents into `CanonicalMetricSet`s
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    nested_document_key: String,
    labels_by_key: Vec<Vec<String>>,
    templates_by_key: Vec<Vec<String>>,
    known_labels: HashSet<String>,
    known_templates: HashSet<String>,
    ignored: HashSet<String>,
}

impl FieldNormalizer {
    pub fn new(config: &FieldMapConfig) -> Self {
        let mut labels_by_key = vec![Vec::new(); CanonicalKey::COUNT];
        for alias in &config.label_aliases {
            labels_by_key[alias.key as usize].push(alias.source.clone());
        }
        let mut templates_by_key = vec![Vec::new(); CanonicalKey::COUNT];
        for alias in &config.template_aliases {
            templates_by_key[alias.key as usize].push(alias.source.clone());
        }

        Self {
            nested_document_key: config.nested_document_key.clone(),
            known_labels: config.label_aliases.iter().map(|a| a.source.clone()).collect(),
            known_templates: config
                .template_aliases
                .iter()
                .map(|a| a.source.clone())
                .collect(),
            ignored: config.ignored_keys.iter().cloned().collect(),
            labels_by_key,
            templates_by_key,
        }
    }

    pub fn normalize(&self, raw: &Value) -> CanonicalMetricSet {
        self.normalize_with_report(raw).0
    }

    pub fn normalize_with_report(&self, raw: &Value) -> (CanonicalMetricSet, NormalizationReport) {
        let mut report = NormalizationReport::default();
        let mut metrics = CanonicalMetricSet::zero();

        let top = match raw {
            Value::Object(map) => map,
            Value::Null => return (metrics, report),
            _ => {
                report.record_miss(NON_OBJECT_DOCUMENT);
                return (metrics, report);
            }
        };
        let nested = top.get(&self.nested_document_key).and_then(Value::as_object);

        for key in CanonicalKey::all() {
            metrics.set(key, self.resolve(key, top, nested));
        }

        self.collect_misses(top, nested, &mut report);
        (metrics, report)
    }

    /// Core figures used to tell populated rows from placeholder rows left
    /// behind by duplicate uploads
    pub const CORE_KEYS: [CanonicalKey; 3] =
        [CanonicalKey::Invoices, CanonicalKey::Sales, CanonicalKey::GpSales];

    /// Number of core figures the document populates with a non-zero value
    pub fn core_metric_count(&self, raw: &Value) -> usize {
        let Some(top) = raw.as_object() else {
            return 0;
        };
        let nested = top.get(&self.nested_document_key).and_then(Value::as_object);
        Self::CORE_KEYS
            .into_iter()
            .filter(|key| self.resolve(*key, top, nested) > 0.0)
            .count()
    }

    pub fn has_core_metrics(&self, raw: &Value) -> bool {
        self.core_metric_count(raw) > 0
    }

    fn resolve(
        &self,
        key: CanonicalKey,
        top: &Map<String, Value>,
        nested: Option<&Map<String, Value>>,
    ) -> f64 {
        let direct = top.get(key.field_name()).map(coerce_number);
        let labelled = nested.into_iter().flat_map(|doc| {
            self.labels_by_key[key as usize]
                .iter()
                .filter_map(move |label| doc.get(label).map(coerce_number))
        });
        let templated = self.templates_by_key[key as usize]
            .iter()
            .filter_map(|template| top.get(template).map(coerce_number));

        direct
            .into_iter()
            .chain(labelled)
            .chain(templated)
            .find(|value| *value > 0.0)
            .unwrap_or(0.0)
    }

    fn collect_misses(
        &self,
        top: &Map<String, Value>,
        nested: Option<&Map<String, Value>>,
        report: &mut NormalizationReport,
    ) {
        for (raw_key, value) in top {
            // A nested document that is not an object has nothing readable in it
            let readable_nested = nested.is_some() || value.is_null();
            let known = (raw_key == &self.nested_document_key && readable_nested)
                || CanonicalKey::from_field_name(raw_key).is_some()
                || self.known_templates.contains(raw_key)
                || self.ignored.contains(raw_key);
            if !known {
                debug!(key = %raw_key, "Raw key matches no known shape, defaulting to 0");
                report.record_miss(raw_key);
            }
        }

        if let Some(nested) = nested {
            for label in nested.keys() {
                if !self.known_labels.contains(label) {
                    let qualified = format!("{}.{}", self.nested_document_key, label);
                    debug!(key = %qualified, "Nested label matches no known service, defaulting to 0");
                    report.record_miss(&qualified);
                }
            }
        }
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new(&FieldMapConfig::default())
    }
}

/// Defensive numeric coercion.
///
/// Numbers pass through; numeric strings may carry `$`, thousands separators,
/// a trailing `%` and surrounding whitespace. Anything else, including
/// negative and non-finite values, becomes 0.
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
