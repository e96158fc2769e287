//! # ALS Common Library
//!
//! Shared code for the adaptive learning strategy services:
//! - Item bank, subscale membership and historical score matrices
//! - Short-form item selection (quotas, text diversity, reliability repair)
//! - Correlation model and per-respondent recommendation
//! - Replacement questions and tie arbitration
//! - API request/response types
//! - Configuration loading

pub mod api;
pub mod arbitration;
pub mod config;
pub mod correlation;
pub mod error;
pub mod history;
pub mod items;
pub mod recommend;
pub mod reliability;
pub mod requestion;
pub mod selection;
pub mod similarity;

pub use error::{Error, Result};
pub use items::{Item, ItemBank, Scale};
