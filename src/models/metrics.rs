//! Canonical metric key space shared by every stage of the engine

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Whether a counter is a headline figure or a sold service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Core,
    Service,
}

/// A normalized, uniquely-named performance counter
///
/// Variant order is the catalogue order; `CATALOGUE[key as usize]` describes
/// the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    Invoices,
    Sales,
    GpSales,
    LaborSales,
    PartsSales,
    OilChanges,
    PremiumOilChanges,
    Alignments,
    PotentialAlignments,
    PotentialAlignmentsSold,
    BrakeService,
    BrakeFlush,
    CoolantFlush,
    TransmissionFlush,
    PowerSteeringFlush,
    FuelSystemService,
    DifferentialService,
    EngineAirFilter,
    CabinAirFilter,
    WiperBlades,
    Batteries,
    TireRotation,
    RetailTires,
    TireProtection,
    TireBalance,
    ShocksStruts,
    AcService,
    TuneUp,
    HeadlightRestoration,
    Nitrogen,
}

/// Catalogue entry for a canonical key
#[derive(Debug)]
pub struct KeyInfo {
    pub key: CanonicalKey,
    pub id: &'static str,
    pub label: &'static str,
    pub field: &'static str,
    pub category: MetricCategory,
}

const fn core_key(
    key: CanonicalKey,
    id: &'static str,
    label: &'static str,
    field: &'static str,
) -> KeyInfo {
    KeyInfo {
        key,
        id,
        label,
        field,
        category: MetricCategory::Core,
    }
}

const fn service_key(
    key: CanonicalKey,
    id: &'static str,
    label: &'static str,
    field: &'static str,
) -> KeyInfo {
    KeyInfo {
        key,
        id,
        label,
        field,
        category: MetricCategory::Service,
    }
}

use self::CanonicalKey as K;

pub static CATALOGUE: [KeyInfo; CanonicalKey::COUNT] = [
    core_key(K::Invoices, "invoices", "Invoices", "invoices"),
    core_key(K::Sales, "sales", "Sales", "sales"),
    core_key(K::GpSales, "gp_sales", "Gross Profit", "gpSales"),
    core_key(K::LaborSales, "labor_sales", "Labor Sales", "laborSales"),
    core_key(K::PartsSales, "parts_sales", "Parts Sales", "partsSales"),
    service_key(K::OilChanges, "oil_changes", "Oil Changes", "oilChanges"),
    service_key(K::PremiumOilChanges, "premium_oil_changes", "Premium Oil Changes", "premiumOilChanges"),
    service_key(K::Alignments, "alignments", "Alignments", "alignments"),
    service_key(K::PotentialAlignments, "potential_alignments", "Potential Alignments", "potentialAlignments"),
    service_key(
        K::PotentialAlignmentsSold,
        "potential_alignments_sold",
        "Potential Alignments Sold",
        "potentialAlignmentsSold",
    ),
    service_key(K::BrakeService, "brake_service", "Brake Service", "brakeService"),
    service_key(K::BrakeFlush, "brake_flush", "Brake Flush", "brakeFlush"),
    service_key(K::CoolantFlush, "coolant_flush", "Coolant Flush", "coolantFlush"),
    service_key(K::TransmissionFlush, "transmission_flush", "Transmission Flush", "transmissionFlush"),
    service_key(K::PowerSteeringFlush, "power_steering_flush", "Power Steering Flush", "powerSteeringFlush"),
    service_key(K::FuelSystemService, "fuel_system_service", "Fuel System Service", "fuelSystemService"),
    service_key(K::DifferentialService, "differential_service", "Differential Service", "differentialService"),
    service_key(K::EngineAirFilter, "engine_air_filter", "Engine Air Filter", "engineAirFilter"),
    service_key(K::CabinAirFilter, "cabin_air_filter", "Cabin Air Filter", "cabinAirFilter"),
    service_key(K::WiperBlades, "wiper_blades", "Wiper Blades", "wiperBlades"),
    service_key(K::Batteries, "batteries", "Batteries", "batteries"),
    service_key(K::TireRotation, "tire_rotation", "Tire Rotation", "tireRotation"),
    service_key(K::RetailTires, "retail_tires", "Retail Tires", "retailTires"),
    service_key(K::TireProtection, "tire_protection", "Tire Protection", "tireProtection"),
    service_key(K::TireBalance, "tire_balance", "Tire Balance", "tireBalance"),
    service_key(K::ShocksStruts, "shocks_struts", "Shocks & Struts", "shocksStruts"),
    service_key(K::AcService, "ac_service", "A/C Service", "acService"),
    service_key(K::TuneUp, "tune_up", "Tune Up", "tuneUp"),
    service_key(K::HeadlightRestoration, "headlight_restoration", "Headlight Restoration", "headlightRestoration"),
    service_key(K::Nitrogen, "nitrogen", "Nitrogen Fill", "nitrogen"),
];

impl CanonicalKey {
    pub const COUNT: usize = 30;

    /// Every key in catalogue order
    pub fn all() -> impl Iterator<Item = CanonicalKey> {
        CATALOGUE.iter().map(|info| info.key)
    }

    pub fn info(&self) -> &'static KeyInfo {
        &CATALOGUE[*self as usize]
    }

    /// Stable snake_case identifier
    pub fn id(&self) -> &'static str {
        self.info().id
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        self.info().label
    }

    /// camelCase field name, also the direct raw-document spelling
    pub fn field_name(&self) -> &'static str {
        self.info().field
    }

    pub fn category(&self) -> MetricCategory {
        self.info().category
    }

    pub fn is_service(&self) -> bool {
        self.category() == MetricCategory::Service
    }

    /// Look up a key by its camelCase field name
    pub fn from_field_name(field: &str) -> Option<CanonicalKey> {
        CATALOGUE.iter().find(|info| info.field == field).map(|info| info.key)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Normalized counters for one snapshot or one rollup
///
/// Every canonical key is always present. Values are finite and non-negative;
/// `set` and `add` enforce this so sums are always well-defined.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMetricSet {
    values: [f64; CanonicalKey::COUNT],
}

impl CanonicalMetricSet {
    pub fn zero() -> Self {
        Self {
            values: [0.0; CanonicalKey::COUNT],
        }
    }

    pub fn get(&self, key: CanonicalKey) -> f64 {
        self.values[key as usize]
    }

    pub fn set(&mut self, key: CanonicalKey, value: f64) {
        self.values[key as usize] = sanitize(value);
    }

    pub fn with(mut self, key: CanonicalKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalKey, f64)> + '_ {
        CanonicalKey::all().map(move |key| (key, self.get(key)))
    }

    /// True when every counter is zero
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

impl Default for CanonicalMetricSet {
    fn default() -> Self {
        Self::zero()
    }
}

impl AddAssign<&CanonicalMetricSet> for CanonicalMetricSet {
    fn add_assign(&mut self, other: &CanonicalMetricSet) {
        for (slot, value) in self.values.iter_mut().zip(other.values.iter()) {
            *slot = sanitize(*slot + *value);
        }
    }
}

impl Add<&CanonicalMetricSet> for CanonicalMetricSet {
    type Output = CanonicalMetricSet;

    fn add(mut self, other: &CanonicalMetricSet) -> CanonicalMetricSet {
        self += other;
        self
    }
}

impl<'a> std::iter::Sum<&'a CanonicalMetricSet> for CanonicalMetricSet {
    fn sum<I: Iterator<Item = &'a CanonicalMetricSet>>(iter: I) -> Self {
        iter.fold(CanonicalMetricSet::zero(), |acc, set| acc + set)
    }
}

impl Serialize for CanonicalMetricSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CanonicalKey::COUNT))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key.field_name(), &value)?;
        }
        map.end()
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
