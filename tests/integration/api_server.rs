//! Integration tests for the API Server
//!
//! Tests health, metrics and the read-only snapshot endpoints.


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
    assert_eq!(body["service"], "quadrant-engine");
    assert_eq!(body["instruments"], 0);
    assert_eq!(body["gateway_connected"], false);
}

#[tokio::test]
async fn health_counts_published_instruments() {
    let app = TestApiServer::with_instruments(&["PAIN400", "GAIN400"]).await;
    app.metrics.gateway_connected.set(1.0);

    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["instruments"], 2);
    assert_eq!(body["gateway_connected"], true);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for name in [
        "http_requests_total",
        "http_request_duration_seconds",
        "engine_cycles_total",
        "engine_orders_placed_total",
        "engine_open_positions",
    ] {
        assert!(body.contains(name), "Expected {} metric", name);
    }
}

#[tokio::test]
async fn metrics_endpoint_tracks_request_count() {
    let app = TestApiServer::new().await;

    for _ in 0..3 {
        let _ = app.server.get("/health").await;
    }

    assert!(app.metrics.http_requests_total.get() >= 3);
}

#[tokio::test]
async fn instruments_endpoint_lists_published_snapshots() {
    let app = TestApiServer::with_instruments(&["GAIN400", "PAIN400"]).await;
    let response = app.server.get("/api/instruments").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let list = body.as_array().expect("array of snapshots");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["symbol"], "GAIN400");
    assert_eq!(list[1]["symbol"], "PAIN400");
    assert_eq!(list[0]["bias"]["kind"], "neutral");
}

#[tokio::test]
async fn instruments_endpoint_filters_ready() {
    let app = TestApiServer::with_instruments(&["PAIN400"]).await;
    let response = app.server.get("/api/instruments").add_query_param("ready", true).await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn instrument_endpoint_returns_snapshot() {
    let app = TestApiServer::with_instruments(&["PAIN400"]).await;
    let response = app.server.get("/api/instruments/PAIN400").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["symbol"], "PAIN400");
    assert_eq!(body["price"], 100.0);
    assert_eq!(body["trend"].as_array().map(Vec::len), Some(3));
    assert!(body["summary"].as_str().unwrap().starts_with("bias=neutral"));
}

#[tokio::test]
async fn verdicts_endpoint_returns_reason_trails() {
    let app = TestApiServer::with_instruments(&["PAIN400"]).await;
    let response = app.server.get("/api/instruments/PAIN400/verdicts").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let verdicts = body.as_array().expect("array of verdicts");
    assert_eq!(verdicts.len(), 4);
    for verdict in verdicts {
        assert_eq!(verdict["ready"], false);
        assert!(!verdict["reasons"].as_array().unwrap().is_empty());
    }
    assert_eq!(verdicts[0]["strategy"], "simple_long");
}

#[tokio::test]
async fn unknown_instrument_returns_not_found() {
    let app = TestApiServer::with_instruments(&["PAIN400"]).await;
    let response = app.server.get("/api/instruments/NOPE").await;
    assert_eq!(response.status_code(), 404);

    let response = app.server.get("/api/instruments/NOPE/verdicts").await;
    assert_eq!(response.status_code(), 404);
}
