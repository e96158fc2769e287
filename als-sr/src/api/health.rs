//! Health check endpoint

use als_common::api::HealthResponse;
use axum::{routing::get, Json, Router};

use crate::AppState;

/// GET /health and GET /api/health
///
/// Returns status, module name, and version.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "als-sr".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
}
