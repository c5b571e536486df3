// Integration tests: status HTTP endpoints

use axum_test::TestServer;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use waterlevel::models::SensorSample;
use waterlevel::routes::{self, StatusInfo};
use waterlevel::stats::PipelineStats;
use waterlevel::window::{self, SharedWindow};

fn test_app() -> (axum::Router, SharedWindow, Arc<PipelineStats>) {
    let window = window::shared();
    let stats = Arc::new(PipelineStats::default());
    let info = StatusInfo {
        device_id: 1,
        port: "/dev/ttyUSB0".into(),
        topic: "sensor-data".into(),
    };
    let app = routes::app(info, window.clone(), stats.clone());
    (app, window, stats)
}

#[tokio::test]
async fn test_root_endpoint() {
    let (app, _, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("waterlevel pipeline");
}

#[tokio::test]
async fn test_version_endpoint() {
    let (app, _, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("waterlevel")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_status_reports_device_and_idle_counters() {
    let (app, _, _) = test_app();
    let server = TestServer::new(app).unwrap();
    let response = server.get("/api/status").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["device_id"], 1);
    assert_eq!(json["port"], "/dev/ttyUSB0");
    assert_eq!(json["topic"], "sensor-data");
    assert_eq!(json["window_len"], 0);
    assert_eq!(json["samples_ingested_total"], 0);
    assert_eq!(json["publish_failures_total"], 0);
}

#[tokio::test]
async fn test_status_reflects_window_and_counters() {
    let (app, window, stats) = test_app();
    let server = TestServer::new(app).unwrap();
    {
        let mut w = window::lock(&window);
        w.push(SensorSample::new(120, Utc::now()));
        w.push(SensorSample::new(130, Utc::now()));
    }
    stats.samples_ingested_total.store(2, Ordering::Relaxed);
    stats.read_failures_total.store(1, Ordering::Relaxed);
    stats.envelopes_published_total.store(4, Ordering::Relaxed);

    let json: serde_json::Value = server.get("/api/status").await.json();
    assert_eq!(json["window_len"], 2);
    assert_eq!(json["samples_ingested_total"], 2);
    assert_eq!(json["read_failures_total"], 1);
    assert_eq!(json["envelopes_published_total"], 4);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _, _) = test_app();
    let server = TestServer::new(app).unwrap();
    server.get("/api/history").expect_failure().await.assert_status_not_found();
}
