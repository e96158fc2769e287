//! HTTP API handlers for als-sr

pub mod health;
pub mod questions;
pub mod recommend;
pub mod requestion;

pub use health::health_routes;
pub use questions::get_questions;
pub use recommend::{recommend, recommend_llm_fallback};
pub use requestion::requestion;
