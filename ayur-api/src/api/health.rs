//! Service banner and health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::plantnet::ProviderKind;
use crate::AppState;

/// Display name reported by `GET /`
pub const SERVICE_NAME: &str = "AyurDrishti Backend v2";

/// `GET /` response
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub ok: bool,
    pub service: &'static str,
    /// True when identification runs against the offline mock
    pub mock: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        ok: true,
        service: SERVICE_NAME,
        mock: state.pipeline.provider_kind() == ProviderKind::Mock,
    })
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "ayur-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// Build banner and health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
