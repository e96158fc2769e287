//! als-sr library - Strategy Recommender service
//!
//! Serves the short-form questionnaire, scores answers into a learning-strategy
//! recommendation, hands out replacement questions for near ties, and optionally
//! asks an LLM to arbitrate ties.

use axum::Router;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod logging;
pub mod service;

pub use service::RecommendationService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Read-only service built at startup
    pub service: Arc<RecommendationService>,
    /// Random source for replacement questions
    pub rng: Arc<Mutex<StdRng>>,
}

impl AppState {
    /// Create new application state
    pub fn new(service: RecommendationService, rng: StdRng) -> Self {
        Self {
            service: Arc::new(service),
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/questions", get(api::get_questions))
        .route("/api/recommend", post(api::recommend))
        .route("/api/recommend/llm-fallback", post(api::recommend_llm_fallback))
        .route("/api/requestion", post(api::requestion))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
