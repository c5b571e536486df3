// HTTP status routes for the producer process

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::stats::PipelineStats;
use crate::window::SharedWindow;

/// Fixed facts about the running producer, reported by GET /api/status.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub device_id: i64,
    pub port: String,
    pub topic: String,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) info: Arc<StatusInfo>,
    pub(crate) window: SharedWindow,
    pub(crate) stats: Arc<PipelineStats>,
}

pub fn app(info: StatusInfo, window: SharedWindow, stats: Arc<PipelineStats>) -> Router {
    let state = AppState {
        info: Arc::new(info),
        window,
        stats,
    };
    Router::new()
        .route("/", get(|| async { "waterlevel pipeline" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
