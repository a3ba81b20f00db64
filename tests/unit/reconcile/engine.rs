//! Unit tests for scorecard orchestration

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use scorecard::error::EngineError;
use scorecard::models::{
    CanonicalId, CanonicalKey, DataQualityWarning, DataStatus, EntityMapping, EntityType, Scope,
    VendorProductMapping,
};
use scorecard::reconcile::{DerivedMetric, MappingTable, ScorecardEngine};
use scorecard::services::EntityMappingSource;
use serde_json::json;

use crate::common_fixtures::{
    advisor_row, engine_over, engine_with, id, march, standard_mappings, store_row, store_with,
    uploaded,
};

fn service_label(card: &scorecard::models::Scorecard, key: CanonicalKey) -> String {
    card.services
        .as_ref()
        .and_then(|lines| lines.iter().find(|l| l.key == key))
        .map(|l| l.label.clone())
        .unwrap_or_default()
}

#[test]
fn no_snapshot_is_no_data_not_zero() {
    let (_store, engine) = engine_with(Vec::new());
    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();

    assert!(!card.has_data());
    assert_eq!(card.data_completeness.status, DataStatus::NoData);
    assert!(card.metrics.is_none());
    assert!(card.services.is_none());
    assert!(card.derived_percentages.is_none());
    assert_eq!(card.metric(CanonicalKey::Invoices), None);
    assert_eq!(card.source_snapshot_count, 0);

    let json = serde_json::to_value(&card).unwrap();
    assert!(json["metrics"].is_null());
    assert_eq!(json["dataCompleteness"]["status"], "noData");
}

#[test]
fn zero_performance_is_present_data() {
    let (_store, engine) = engine_with(vec![advisor_row(
        "Jane Doe",
        "Atlanta Highway",
        "Georgia",
        uploaded(3, 8),
        json!({"invoices": 0, "sales": 0}),
    )]);
    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();

    assert!(card.has_data());
    assert_eq!(card.data_completeness.status, DataStatus::Present);
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(0.0));
    assert_eq!(
        card.derived_percentages.unwrap().get(DerivedMetric::GpPercent),
        Some(0.0)
    );
}

#[test]
fn other_periods_are_ignored() {
    let mut april = advisor_row(
        "Jane Doe",
        "Atlanta Highway",
        "Georgia",
        uploaded(30, 8),
        json!({"invoices": 999}),
    );
    april.reporting_date = chrono::NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
    let (_store, engine) = engine_with(vec![
        april,
        advisor_row(
            "Jane Doe",
            "Atlanta Highway",
            "Georgia",
            uploaded(12, 8),
            json!({"invoices": 10}),
        ),
    ]);

    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(10.0));
}

#[test]
fn empty_scope_id_is_invalid_input() {
    let (_store, engine) = engine_with(Vec::new());
    let err = engine
        .get_scorecard(Scope::Store, &CanonicalId::new("  "), &march())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(err.kind(), "invalid_input");
}

#[test]
fn spelling_variants_of_one_advisor_share_a_grouping_key() {
    let (_store, engine) = engine_with(vec![
        advisor_row(
            "Jane Doe",
            "Atlanta Highway",
            "Georgia",
            uploaded(10, 8),
            json!({"invoices": 200}),
        ),
        advisor_row(
            "DOE, JANE",
            "atlanta highway",
            "GEORGIA",
            uploaded(20, 8),
            json!({"invoices": 216}),
        ),
    ]);
    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(216.0));
    assert_eq!(card.source_snapshot_count, 1);
}

#[test]
fn multi_store_advisor_sums_each_store() {
    let (_store, engine) = engine_with(vec![
        advisor_row("Jane Doe", "Atlanta Highway", "Georgia", uploaded(5, 8), json!({"invoices": 50})),
        advisor_row("Jane Doe", "Atlanta Highway", "Georgia", uploaded(25, 8), json!({"invoices": 90})),
        advisor_row("Jane Doe", "Athens Downtown", "Georgia", uploaded(15, 8), json!({"invoices": 30})),
    ]);

    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(120.0));
    assert_eq!(card.source_snapshot_count, 2);
    assert_eq!(card.data_completeness.stores_covered, 2);
}

#[test]
fn breakdown_matches_single_scope_rules() {
    let (_store, engine) = engine_with(vec![
        advisor_row(
            "Jane Doe",
            "Atlanta Highway",
            "Georgia",
            uploaded(25, 8),
            json!({"invoices": 90, "sales": 27000}),
        ),
        advisor_row(
            "Jane Doe",
            "Tallahassee",
            "Florida",
            uploaded(15, 8),
            json!({"invoices": 30, "sales": 6000}),
        ),
    ]);

    let breakdown = engine
        .get_multi_store_breakdown(&id("adv-jane"), &march())
        .unwrap();
    assert_eq!(breakdown.per_store_rollups.len(), 2);

    let atl = breakdown
        .per_store_rollups
        .iter()
        .find(|r| r.store_id == id("store-atl"))
        .unwrap();
    assert_eq!(atl.market_id, id("mkt-ga"));
    assert_eq!(atl.scorecard.metric(CanonicalKey::Invoices), Some(90.0));
    assert_eq!(
        atl.scorecard
            .derived_percentages
            .as_ref()
            .and_then(|d| d.get(DerivedMetric::AverageTicket)),
        Some(300.0)
    );

    let per_store_total: f64 = breakdown
        .per_store_rollups
        .iter()
        .filter_map(|r| r.scorecard.metric(CanonicalKey::Invoices))
        .sum();
    assert_eq!(
        breakdown.combined_rollup.metric(CanonicalKey::Invoices),
        Some(per_store_total)
    );

    let single = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(single.metrics, breakdown.combined_rollup.metrics);
}

#[test]
fn breakdown_for_unknown_advisor_is_no_data() {
    let (_store, engine) = engine_with(Vec::new());
    let breakdown = engine
        .get_multi_store_breakdown(&id("adv-nobody"), &march())
        .unwrap();
    assert!(breakdown.per_store_rollups.is_empty());
    assert!(!breakdown.combined_rollup.has_data());
}

#[test]
fn store_level_row_prevents_double_counting() {
    let at = uploaded(20, 9);
    let (_store, engine) = engine_with(vec![
        advisor_row("Jane Doe", "Tallahassee", "Florida", at, json!({"invoices": 200})),
        advisor_row("Sam Lee", "Tallahassee", "Florida", at, json!({"invoices": 174})),
        store_row("Tallahassee", "Florida", at, json!({"invoices": 374})),
    ]);

    let store = engine
        .get_scorecard(Scope::Store, &id("store-tlh"), &march())
        .unwrap();
    assert_eq!(store.metric(CanonicalKey::Invoices), Some(374.0));

    let market = engine
        .get_scorecard(Scope::Market, &id("mkt-fl"), &march())
        .unwrap();
    assert_eq!(market.metric(CanonicalKey::Invoices), Some(374.0));

    // advisors still see their own rows
    let jane = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(jane.metric(CanonicalKey::Invoices), Some(200.0));
}

#[test]
fn unmapped_rows_are_excluded_and_reported() {
    let (_store, engine) = engine_with(vec![
        advisor_row("Jane Doe", "Atlanta Highway", "Georgia", uploaded(10, 8), json!({"invoices": 40})),
        advisor_row("Jon Smiht", "Atlanta Highway", "Georgia", uploaded(10, 8), json!({"invoices": 60})),
        advisor_row("Jon Smiht", "Atlanta Highway", "Georgia", uploaded(11, 8), json!({"invoices": 65})),
    ]);

    let store = engine
        .get_scorecard(Scope::Store, &id("store-atl"), &march())
        .unwrap();
    assert_eq!(store.metric(CanonicalKey::Invoices), Some(40.0));
    assert_eq!(store.data_completeness.status, DataStatus::Partial);
    assert_eq!(store.data_completeness.excluded_unresolved, 2);
    assert_eq!(
        store.count_warnings(|w| matches!(w, DataQualityWarning::UnresolvedEntity { .. })),
        1
    );

    // the unmapped advisor's rows do not touch Jane's scorecard
    let jane = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(jane.data_completeness.status, DataStatus::Present);

    let report = engine.unmapped_report(&march()).unwrap();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].spreadsheet_name, "Jon Smiht");
    assert_eq!(report.entries[0].entity_type, EntityType::Advisor);
    assert_eq!(report.entries[0].snapshot_count, 2);
}

#[test]
fn creating_a_mapping_brings_rows_back() {
    let (store, engine) = engine_with(vec![advisor_row(
        "Jon Smiht",
        "Atlanta Highway",
        "Georgia",
        uploaded(10, 8),
        json!({"invoices": 60}),
    )]);
    let before = engine
        .get_scorecard(Scope::Store, &id("store-atl"), &march())
        .unwrap();
    assert!(!before.has_data());
    assert_eq!(before.data_completeness.excluded_unresolved, 1);

    store.upsert_entity_mapping(EntityMapping::new("Jon Smiht", "adv-jon", EntityType::Advisor));

    let after = engine
        .get_scorecard(Scope::Store, &id("store-atl"), &march())
        .unwrap();
    assert_eq!(after.metric(CanonicalKey::Invoices), Some(60.0));
    assert!(engine.unmapped_report(&march()).unwrap().entries.is_empty());
}

#[test]
fn ambiguous_duplicates_are_annotated() {
    let at = uploaded(20, 9);
    let (_store, engine) = engine_with(vec![
        store_row("Tallahassee", "Florida", at, json!({"invoices": 370})),
        store_row("Tallahassee", "Florida", at, json!({"invoices": 374})),
    ]);
    let card = engine
        .get_scorecard(Scope::Store, &id("store-tlh"), &march())
        .unwrap();
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(374.0));
    assert_eq!(
        card.count_warnings(|w| matches!(w, DataQualityWarning::AmbiguousDuplicate { .. })),
        1
    );
}

#[test]
fn normalization_misses_surface_as_warnings() {
    let (_store, engine) = engine_with(vec![advisor_row(
        "Jane Doe",
        "Atlanta Highway",
        "Georgia",
        uploaded(10, 8),
        json!({"invoices": 5, "mysteryColumn": 3}),
    )]);
    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert!(card.warnings.contains(&DataQualityWarning::NormalizationMiss {
        key: "mysteryColumn".to_string(),
        occurrences: 1,
    }));
}

#[test]
fn vendor_branding_follows_market_context() {
    let store = store_with(
        vec![
            advisor_row("Jane Doe", "Atlanta Highway", "Georgia", uploaded(10, 8), json!({"tireProtection": 3})),
            advisor_row("Jane Doe", "Tallahassee", "Florida", uploaded(10, 8), json!({"tireProtection": 1})),
        ],
        standard_mappings(),
        vec![VendorProductMapping::new("mkt-ga", "tire_protection", "Road Hazard Plus")],
    );
    let engine = engine_over(&store);

    let market = engine
        .get_scorecard(Scope::Market, &id("mkt-ga"), &march())
        .unwrap();
    assert_eq!(service_label(&market, CanonicalKey::TireProtection), "Road Hazard Plus");

    // advisor spans two markets: generic labels on the combined card
    let advisor = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(service_label(&advisor, CanonicalKey::TireProtection), "Tire Protection");

    // but each store slice is branded for its own market
    let breakdown = engine
        .get_multi_store_breakdown(&id("adv-jane"), &march())
        .unwrap();
    let atl = breakdown
        .per_store_rollups
        .iter()
        .find(|r| r.store_id == id("store-atl"))
        .unwrap();
    assert_eq!(service_label(&atl.scorecard, CanonicalKey::TireProtection), "Road Hazard Plus");
}

#[test]
fn rollups_are_deterministic() {
    let (_store, engine) = engine_with(vec![
        advisor_row("Jane Doe", "Atlanta Highway", "Georgia", uploaded(10, 8), json!({"invoices": 12, "otherServices": {"Battery": 2}})),
        advisor_row("Sam Lee", "Atlanta Highway", "Georgia", uploaded(11, 8), json!({"invoicecount": 8, "battery": 1})),
        store_row("Athens Downtown", "Georgia", uploaded(12, 8), json!({"invoices": 30})),
    ]);

    let first = engine
        .get_scorecard(Scope::Market, &id("mkt-ga"), &march())
        .unwrap();
    let second = engine
        .get_scorecard(Scope::Market, &id("mkt-ga"), &march())
        .unwrap();
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.derived_percentages, second.derived_percentages);
    assert_eq!(first.metric(CanonicalKey::Invoices), Some(50.0));
    assert_eq!(first.metric(CanonicalKey::Batteries), Some(3.0));
}

#[test]
fn rollups_tolerate_concurrent_ingestion() {
    let (store, engine) = engine_with(vec![advisor_row(
        "Jane Doe",
        "Atlanta Highway",
        "Georgia",
        uploaded(1, 0),
        json!({"invoices": 1}),
    )]);
    let engine: Arc<ScorecardEngine> = Arc::new(engine);

    thread::scope(|scope| {
        let writer = store.clone();
        scope.spawn(move || {
            for hour in 1..24u32 {
                writer.append_snapshot(advisor_row(
                    "Jane Doe",
                    "Atlanta Highway",
                    "Georgia",
                    uploaded(1, hour),
                    json!({"invoices": hour + 1}),
                ));
            }
        });

        for _ in 0..4 {
            let engine = engine.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let card = engine
                        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
                        .unwrap();
                    let invoices = card.metric(CanonicalKey::Invoices).unwrap();
                    // always exactly one selected snapshot, never a sum
                    assert_eq!(card.source_snapshot_count, 1);
                    assert!((1.0..=24.0).contains(&invoices));
                }
            });
        }
    });

    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(24.0));
}

/// Mapping source that deactivates "Jane Doe" as soon as it has been read once
struct DeactivatingMappings {
    before: MappingTable,
    after: MappingTable,
    reads: AtomicUsize,
}

impl DeactivatingMappings {
    fn new() -> Self {
        let after: Vec<EntityMapping> = standard_mappings()
            .into_iter()
            .map(|m| if m.spreadsheet_name == "Jane Doe" { m.inactive() } else { m })
            .collect();
        Self {
            before: MappingTable::new(&standard_mappings()),
            after: MappingTable::new(&after),
            reads: AtomicUsize::new(0),
        }
    }

    fn current(&self) -> &MappingTable {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
            &self.before
        } else {
            &self.after
        }
    }
}

impl EntityMappingSource for DeactivatingMappings {
    fn lookup(&self, normalized_name: &str, entity_type: EntityType) -> Option<CanonicalId> {
        self.current().lookup(normalized_name, entity_type)
    }

    fn entity_view(&self) -> Arc<MappingTable> {
        Arc::new(self.current().clone())
    }
}

#[test]
fn mapping_edit_mid_rollup_waits_for_the_next_rollup() {
    let store = store_with(
        vec![
            advisor_row("Jane Doe", "Atlanta Highway", "Georgia", uploaded(3, 8), json!({"invoices": 4})),
            advisor_row("Jane Doe", "Athens Downtown", "Georgia", uploaded(3, 9), json!({"invoices": 6})),
        ],
        standard_mappings(),
        Vec::new(),
    );
    let mappings = Arc::new(DeactivatingMappings::new());
    let engine = ScorecardEngine::new(
        store.clone(),
        mappings.clone(),
        store,
        &scorecard::config::FieldMapConfig::default(),
    );

    let card = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(mappings.reads.load(Ordering::SeqCst), 1);
    assert_eq!(card.metric(CanonicalKey::Invoices), Some(10.0));
    assert_eq!(card.source_snapshot_count, 2);
    assert_eq!(card.data_completeness.stores_covered, 2);
    assert_eq!(card.data_completeness.status, DataStatus::Present);

    let after = engine
        .get_scorecard(Scope::Advisor, &id("adv-jane"), &march())
        .unwrap();
    assert_eq!(mappings.reads.load(Ordering::SeqCst), 2);
    assert!(after.metrics.is_none());

    let breakdown = engine
        .get_multi_store_breakdown(&id("adv-jane"), &march())
        .unwrap();
    assert_eq!(mappings.reads.load(Ordering::SeqCst), 3);
    assert!(breakdown.per_store_rollups.is_empty());
}

struct UnavailableSource;

impl scorecard::services::SnapshotSource for UnavailableSource {
    fn fetch_snapshots(
        &self,
        _scope: Scope,
        _scope_id: &CanonicalId,
        _period: &scorecard::models::Period,
    ) -> scorecard::error::EngineResult<Vec<scorecard::models::Snapshot>> {
        Err(EngineError::Source("snapshot store offline".to_string()))
    }

    fn fetch_period(
        &self,
        _period: &scorecard::models::Period,
    ) -> scorecard::error::EngineResult<Vec<scorecard::models::Snapshot>> {
        Err(EngineError::Source("snapshot store offline".to_string()))
    }
}

#[test]
fn source_failures_propagate() {
    let mappings = store_with(Vec::new(), standard_mappings(), Vec::new());
    let engine = ScorecardEngine::new(
        Arc::new(UnavailableSource),
        mappings.clone(),
        mappings,
        &scorecard::config::FieldMapConfig::default(),
    );

    let err = engine
        .get_scorecard(Scope::Market, &id("mkt-ga"), &march())
        .unwrap_err();
    assert!(matches!(err, EngineError::Source(_)));
    assert!(!err.is_client_error());
    assert!(engine.unmapped_report(&march()).is_err());
}
