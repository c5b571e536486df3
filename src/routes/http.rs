// GET handlers: version, api/status

use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use super::AppState;
use crate::stats::StatsSnapshot;
use crate::window;

#[derive(Serialize)]
struct StatusBody {
    device_id: i64,
    port: String,
    topic: String,
    window_len: usize,
    #[serde(flatten)]
    counters: StatsSnapshot,
}

/// GET /version: service name and version from Cargo.toml at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/status: opened device, buffered window size and pipeline counters.
pub(super) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let window_len = window::lock(&state.window).len();
    let body = StatusBody {
        device_id: state.info.device_id,
        port: state.info.port.clone(),
        topic: state.info.topic.clone(),
        window_len,
        counters: state.stats.snapshot(),
    };
    axum::Json(body)
}
