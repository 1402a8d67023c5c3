//! ayur-api library interface
//!
//! Plant identification with local herbal annotations, plus a rule-based
//! wellness responder. Exposes the router and state for integration testing.

pub mod api;
pub mod error;
pub mod pipeline;
pub mod plantnet;
pub mod store;
pub mod wellness;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::EnrichmentPipeline;
use crate::plantnet::IdentificationProvider;
use crate::store::KnowledgeStore;

/// Largest accepted request body (phone photos)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Identification + enrichment pipeline
    pub pipeline: Arc<EnrichmentPipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(provider: Arc<dyn IdentificationProvider>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            pipeline: Arc::new(EnrichmentPipeline::new(provider, store)),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::identify_routes())
        .merge(api::chat_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        // Frontend is served from a different origin during development
        .layer(CorsLayer::permissive())
}

/// Bind the listener, resolving `host` as a name or an IP literal
pub async fn bind_listener(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}
