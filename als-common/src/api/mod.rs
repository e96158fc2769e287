//! Shared HTTP API types
//!
//! Framework-free request/response types; the service crate wraps them with axum
//! handlers.

pub mod types;

pub use types::{
    ErrorResponse, HealthResponse, LlmFallbackRequest, QuestionsResponse, RecommendRequest,
    RequestionRequest, RequestionResponse, SurveyQuestion,
};
