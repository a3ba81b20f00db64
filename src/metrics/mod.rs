//! Prometheus metrics for the HTTP surface and rollup data quality

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::models::{DataQualityWarning, Scorecard};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub rollups_total: IntCounterVec,
    pub no_data_total: IntCounterVec,
    pub normalization_misses_total: IntCounter,
    pub unresolved_snapshots_total: IntCounter,
    pub ambiguous_duplicates_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total HTTP requests served")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently in flight")?;
        let rollups_total = IntCounterVec::new(
            Opts::new("scorecard_rollups_total", "Scorecard rollups computed"),
            &["scope"],
        )?;
        let no_data_total = IntCounterVec::new(
            Opts::new("scorecard_no_data_total", "Rollups that found no snapshot"),
            &["scope"],
        )?;
        let normalization_misses_total = IntCounter::new(
            "scorecard_normalization_misses_total",
            "Raw metric keys that matched no known shape",
        )?;
        let unresolved_snapshots_total = IntCounter::new(
            "scorecard_unresolved_snapshots_total",
            "Snapshots excluded from rollups for unmapped names",
        )?;
        let ambiguous_duplicates_total = IntCounter::new(
            "scorecard_ambiguous_duplicates_total",
            "Duplicate snapshots the tie-break could not separate",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(rollups_total.clone()))?;
        registry.register(Box::new(no_data_total.clone()))?;
        registry.register(Box::new(normalization_misses_total.clone()))?;
        registry.register(Box::new(unresolved_snapshots_total.clone()))?;
        registry.register(Box::new(ambiguous_duplicates_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            rollups_total,
            no_data_total,
            normalization_misses_total,
            unresolved_snapshots_total,
            ambiguous_duplicates_total,
        })
    }

    /// Count a computed scorecard and the data-quality warnings it carries
    pub fn record_scorecard(&self, scorecard: &Scorecard) {
        let scope = scorecard.scope.as_str();
        self.rollups_total.with_label_values(&[scope]).inc();
        if !scorecard.has_data() {
            self.no_data_total.with_label_values(&[scope]).inc();
        }

        for warning in &scorecard.warnings {
            match warning {
                DataQualityWarning::NormalizationMiss { occurrences, .. } => {
                    self.normalization_misses_total.inc_by(*occurrences as u64)
                }
                DataQualityWarning::UnresolvedEntity { snapshots, .. } => {
                    self.unresolved_snapshots_total.inc_by(*snapshots as u64)
                }
                DataQualityWarning::AmbiguousDuplicate { .. } => {
                    self.ambiguous_duplicates_total.inc()
                }
            }
        }
    }

    /// Text exposition format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
