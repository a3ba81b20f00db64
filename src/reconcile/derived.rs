//! Ratio metrics computed from aggregated sums

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{CanonicalKey, CanonicalMetricSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DerivedMetric {
    GpPercent,
    TireProtectionPercent,
    PotentialAlignmentsPercent,
    PremiumOilChangePercent,
    EngineAirFilterPercent,
    CabinAirFilterPercent,
    BatteryPercent,
    BrakeFlushPercent,
    AverageTicket,
}

/// How a raw ratio is rounded for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Opportunity capture: round up to a whole percent, never under-report
    CeilWhole,
    OneDecimal,
    TwoDecimals,
}

impl Rounding {
    pub fn apply(&self, value: f64) -> f64 {
        // Snap away float noise first so 28.000000000000004 does not ceil to 29
        let snapped = (value * 1e6).round() / 1e6;
        match self {
            Rounding::CeilWhole => snapped.ceil(),
            Rounding::OneDecimal => (snapped * 10.0).round() / 10.0,
            Rounding::TwoDecimals => (snapped * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DerivedRule {
    pub metric: DerivedMetric,
    pub numerator: CanonicalKey,
    pub denominator: CanonicalKey,
    pub scale: f64,
    pub rounding: Rounding,
}

const fn percent(
    metric: DerivedMetric,
    numerator: CanonicalKey,
    denominator: CanonicalKey,
    rounding: Rounding,
) -> DerivedRule {
    DerivedRule {
        metric,
        numerator,
        denominator,
        scale: 100.0,
        rounding,
    }
}

pub const DERIVED_RULES: [DerivedRule; 9] = [
    percent(DerivedMetric::GpPercent, CanonicalKey::GpSales, CanonicalKey::Sales, Rounding::OneDecimal),
    percent(
        DerivedMetric::TireProtectionPercent,
        CanonicalKey::TireProtection,
        CanonicalKey::RetailTires,
        Rounding::OneDecimal,
    ),
    percent(
        DerivedMetric::PotentialAlignmentsPercent,
        CanonicalKey::PotentialAlignmentsSold,
        CanonicalKey::PotentialAlignments,
        Rounding::CeilWhole,
    ),
    percent(
        DerivedMetric::PremiumOilChangePercent,
        CanonicalKey::PremiumOilChanges,
        CanonicalKey::OilChanges,
        Rounding::OneDecimal,
    ),
    percent(
        DerivedMetric::EngineAirFilterPercent,
        CanonicalKey::EngineAirFilter,
        CanonicalKey::Invoices,
        Rounding::OneDecimal,
    ),
    percent(
        DerivedMetric::CabinAirFilterPercent,
        CanonicalKey::CabinAirFilter,
        CanonicalKey::Invoices,
        Rounding::OneDecimal,
    ),
    percent(
        DerivedMetric::BatteryPercent,
        CanonicalKey::Batteries,
        CanonicalKey::Invoices,
        Rounding::OneDecimal,
    ),
    percent(
        DerivedMetric::BrakeFlushPercent,
        CanonicalKey::BrakeFlush,
        CanonicalKey::Invoices,
        Rounding::OneDecimal,
    ),
    DerivedRule {
        metric: DerivedMetric::AverageTicket,
        numerator: CanonicalKey::Sales,
        denominator: CanonicalKey::Invoices,
        scale: 1.0,
        rounding: Rounding::TwoDecimals,
    },
];

/// Safe ratio: a zero (or non-finite) denominator yields 0
pub fn ratio(numerator: f64, denominator: f64, scale: f64, rounding: Rounding) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return 0.0;
    }
    let value = numerator / denominator * scale;
    if value.is_finite() {
        rounding.apply(value)
    } else {
        0.0
    }
}

/// Every declared derived metric, always present
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DerivedValues(BTreeMap<DerivedMetric, f64>);

impl DerivedValues {
    pub fn get(&self, metric: DerivedMetric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DerivedMetric, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

#[derive(Debug, Clone)]
pub struct DerivedCalculator {
    rules: Vec<DerivedRule>,
}

impl DerivedCalculator {
    pub fn new(rules: Vec<DerivedRule>) -> Self {
        Self { rules }
    }

    pub fn derive(&self, metrics: &CanonicalMetricSet) -> DerivedValues {
        DerivedValues(
            self.rules
                .iter()
                .map(|rule| {
                    let value = ratio(
                        metrics.get(rule.numerator),
                        metrics.get(rule.denominator),
                        rule.scale,
                        rule.rounding,
                    );
                    (rule.metric, value)
                })
                .collect(),
        )
    }
}

impl Default for DerivedCalculator {
    fn default() -> Self {
        Self::new(DERIVED_RULES.to_vec())
    }
}
