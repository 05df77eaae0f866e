//! Read-only HTTP surface using Axum: health, metrics and instrument snapshots

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use super::snapshots::SnapshotBoard;
use crate::metrics::Metrics;
use crate::models::{InstrumentSnapshot, StrategyVerdict};

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub snapshots: Arc<SnapshotBoard>,
    started: Instant,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>, snapshots: Arc<SnapshotBoard>) -> Self {
        Self {
            metrics,
            snapshots,
            started: Instant::now(),
        }
    }
}

/// Liveness plus what the last cycle published. The process is "healthy"
/// while it serves; a lost gateway shows up as `gateway_connected: false`.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let instruments = state.snapshots.list().await.len();
    Json(json!({
        "status": "healthy",
        "service": "quadrant-engine",
        "uptime_seconds": state.started.elapsed().as_secs(),
        "instruments": instruments,
        "gateway_connected": state.metrics.gateway_connected.get() > 0.0,
    }))
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

#[derive(Debug, Deserialize)]
struct InstrumentQuery {
    /// Only instruments with at least one ready verdict
    ready: Option<bool>,
}

/// List the latest snapshot of every instrument
async fn list_instruments(
    State(state): State<AppState>,
    Query(params): Query<InstrumentQuery>,
) -> Json<Vec<InstrumentSnapshot>> {
    let mut snapshots = state.snapshots.list().await;
    if params.ready.unwrap_or(false) {
        snapshots.retain(|s| s.ready_verdicts().next().is_some());
    }
    Json(snapshots)
}

/// Latest snapshot of one instrument
async fn get_instrument(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<InstrumentSnapshot>, StatusCode> {
    state
        .snapshots
        .get(&symbol)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Verdicts with reason trails for one instrument
async fn get_verdicts(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<StrategyVerdict>>, StatusCode> {
    state
        .snapshots
        .get(&symbol)
        .await
        .map(|s| Json(s.verdicts))
        .ok_or(StatusCode::NOT_FOUND)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/instruments", get(list_instruments))
        .route("/api/instruments/{symbol}", get(get_instrument))
        .route("/api/instruments/{symbol}/verdicts", get(get_verdicts))
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

/// Serve the read-only API until the process exits
pub async fn start_server(port: u16, state: AppState) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
