//! Integration tests for the API Server
//!
//! Tests HTTP endpoints, health checks, metrics, and scorecard queries.


use serde_json::Value;

use test_utils::TestApiServer;

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "scorecard-engine");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    let _ = app.server.get("/health").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(body.contains("http_requests_total"), "Expected http_requests_total metric");
    assert!(
        body.contains("http_request_duration_seconds"),
        "Expected http_request_duration_seconds metric"
    );
    assert!(
        body.contains("http_requests_in_flight"),
        "Expected http_requests_in_flight metric"
    );
}

#[tokio::test]
async fn scorecard_endpoint_returns_latest_totals() {
    let app = TestApiServer::with_sample_dataset().await;
    let response = app
        .server
        .get("/api/scorecards/advisor/adv-jane")
        .add_query_param("year", "2024")
        .add_query_param("month", "3")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["scope"], "advisor");
    assert_eq!(body["scopeId"], "adv-jane");
    assert_eq!(body["metrics"]["invoices"], 266.0);
    assert_eq!(body["sourceSnapshotCount"], 2);
    assert_eq!(body["dataCompleteness"]["status"], "present");
    assert!(body["derivedPercentages"]["tireProtectionPercent"].is_number());
    assert!(body["services"].as_array().is_some());
}

#[tokio::test]
async fn scorecard_endpoint_accepts_period_parameter() {
    let app = TestApiServer::with_sample_dataset().await;
    let response = app
        .server
        .get("/api/scorecards/store/store-tlh")
        .add_query_param("period", "2024-03")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["metrics"]["invoices"], 374.0);
}

#[tokio::test]
async fn market_scorecard_uses_vendor_branding() {
    let app = TestApiServer::with_sample_dataset().await;
    let response = app
        .server
        .get("/api/scorecards/market/mkt-ga")
        .add_query_param("period", "2024-03")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let services = body["services"].as_array().expect("services list");
    let tire = services
        .iter()
        .find(|line| line["key"] == "tire_protection")
        .expect("tire protection line");
    assert_eq!(tire["label"], "Road Hazard Plus");
}

#[tokio::test]
async fn missing_data_is_reported_as_no_data() {
    let app = TestApiServer::with_sample_dataset().await;
    let response = app
        .server
        .get("/api/scorecards/advisor/adv-jane")
        .add_query_param("year", "2023")
        .add_query_param("month", "12")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert!(body["metrics"].is_null());
    assert!(body["derivedPercentages"].is_null());
    assert_eq!(body["dataCompleteness"]["status"], "noData");
}

#[tokio::test]
async fn non_numeric_period_is_rejected() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .get("/api/scorecards/advisor/adv-jane")
        .add_query_param("year", "twenty")
        .add_query_param("month", "3")
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn missing_period_and_unknown_scope_are_rejected() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/api/scorecards/store/store-atl").await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .server
        .get("/api/scorecards/region/south")
        .add_query_param("period", "2024-03")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn advisor_breakdown_lists_each_store() {
    let app = TestApiServer::with_sample_dataset().await;
    let response = app
        .server
        .get("/api/advisors/adv-jane/stores")
        .add_query_param("period", "2024-03")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let stores = body["perStoreRollups"].as_array().expect("per-store rollups");
    assert_eq!(stores.len(), 2);
    assert!(stores.iter().all(|s| s["storeId"].is_string()));
    assert_eq!(body["combinedRollup"]["metrics"]["invoices"], 266.0);
}

#[tokio::test]
async fn unmapped_endpoint_lists_unknown_names() {
    let app = TestApiServer::with_sample_dataset().await;
    let response = app
        .server
        .get("/api/unmapped")
        .add_query_param("period", "2024-03")
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let entries = body["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["spreadsheetName"], "Jon Smiht");
    assert_eq!(entries[0]["entityType"], "advisor");
    assert_eq!(entries[0]["snapshotCount"], 1);
}

#[tokio::test]
async fn rollup_counters_are_exported() {
    let app = TestApiServer::with_sample_dataset().await;
    let _ = app
        .server
        .get("/api/scorecards/store/store-tlh")
        .add_query_param("period", "2024-03")
        .await;

    let body = app.server.get("/metrics").await.text();
    assert!(body.contains("scorecard_rollups_total"));
}
