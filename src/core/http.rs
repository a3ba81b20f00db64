//! HTTP endpoint server using Axum

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::config::ServerConfig;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::models::{CanonicalId, MultiStoreBreakdown, Period, Scope, Scorecard, UnmappedReport};
use crate::reconcile::ScorecardEngine;
use crate::services::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub engine: Arc<ScorecardEngine>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Engine error rendered as a JSON body with a matching status code
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "Scorecard request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Reporting period from the query string: `?period=YYYY-MM` or
/// `?year=YYYY&month=M`. Values stay strings so non-numeric input is
/// reported as invalid input rather than a generic extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
}

impl PeriodQuery {
    pub fn parse(&self) -> Result<Period, EngineError> {
        match (&self.period, &self.year, &self.month) {
            (Some(period), _, _) => period.parse(),
            (None, Some(year), Some(month)) => Period::from_parts(year, month),
            _ => Err(EngineError::InvalidInput(
                "period is required: use period=YYYY-MM or year and month".to_string(),
            )),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "scorecard-engine"
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Scorecard for an advisor, store or market
async fn get_scorecard(
    State(state): State<AppState>,
    Path((scope, scope_id)): Path<(String, String)>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Scorecard>, ApiError> {
    let scope: Scope = scope.parse()?;
    let period = query.parse()?;
    let scorecard = state
        .engine
        .get_scorecard(scope, &CanonicalId::new(scope_id), &period)?;
    state.metrics.record_scorecard(&scorecard);
    Ok(Json(scorecard))
}

/// Per-store rollups for a multi-store advisor
async fn get_advisor_breakdown(
    State(state): State<AppState>,
    Path(advisor_id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MultiStoreBreakdown>, ApiError> {
    let period = query.parse()?;
    let breakdown = state
        .engine
        .get_multi_store_breakdown(&CanonicalId::new(advisor_id), &period)?;
    for rollup in &breakdown.per_store_rollups {
        state.metrics.record_scorecard(&rollup.scorecard);
    }
    state.metrics.record_scorecard(&breakdown.combined_rollup);
    Ok(Json(breakdown))
}

/// Spreadsheet names waiting on an operator mapping
async fn get_unmapped(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<UnmappedReport>, ApiError> {
    let period = query.parse()?;
    Ok(Json(state.engine.unmapped_report(&period)?))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/scorecards/{scope}/{scope_id}", get(get_scorecard))
        .route("/api/advisors/{advisor_id}/stores", get(get_advisor_breakdown))
        .route("/api/unmapped", get(get_unmapped))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(Metrics::new()?);
    let start_time = Arc::new(Instant::now());
    let field_map = config.load_field_map()?;

    // Without a dataset the API still serves, every scope reporting no data
    let store = match &config.dataset_path {
        Some(path) => Arc::new(InMemoryStore::from_path(path)?),
        None => {
            warn!("SCORECARD_DATASET_PATH not set - serving an empty dataset");
            Arc::new(InMemoryStore::empty())
        }
    };
    let engine = Arc::new(ScorecardEngine::new(
        store.clone(),
        store.clone(),
        store,
        &field_map,
    ));

    let state = AppState {
        health: Arc::new(RwLock::new(HealthStatus::default())),
        metrics,
        start_time,
        engine,
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    info!(port = config.port, "HTTP server listening on port {}", config.port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        config.port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
