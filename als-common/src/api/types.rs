//! Shared API request/response types
//!
//! Wire types of the strategy recommender HTTP API. Recommendation and arbitration
//! results are serialized directly from
//! [`RecommendationResult`](crate::recommend::RecommendationResult) and
//! [`ArbitrationOutcome`](crate::arbitration::ArbitrationOutcome).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::arbitration::UserProfile;
use crate::items::{Item, LikertRange, Scale};

// ========================================
// Questions
// ========================================

/// One question as shown to a respondent
///
/// # Examples
///
/// ```
/// use als_common::api::types::SurveyQuestion;
/// use als_common::items::{Item, LikertRange, Scale};
///
/// let item = Item {
///     scale: Scale::Fla,
///     item_number: 3,
///     subscale: "fear".to_string(),
///     text: "I tremble when called on".to_string(),
///     reverse_coded: false,
/// };
/// let question = SurveyQuestion::from_item(&item, LikertRange::default());
/// assert_eq!(question.question_id, "FLA-3");
/// assert_eq!(question.likert_max, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub question_id: String,
    pub scale: Scale,
    pub item_number: u32,
    pub subscale: String,
    pub text: String,
    pub reverse_coded: bool,
    pub likert_min: i32,
    pub likert_max: i32,
}

impl SurveyQuestion {
    pub fn from_item(item: &Item, likert: LikertRange) -> Self {
        Self {
            question_id: item.question_id(),
            scale: item.scale,
            item_number: item.item_number,
            subscale: item.subscale.clone(),
            text: item.text.clone(),
            reverse_coded: item.reverse_coded,
            likert_min: likert.min.round() as i32,
            likert_max: likert.max.round() as i32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub total_questions: usize,
    pub questions: Vec<SurveyQuestion>,
}

// ========================================
// Recommendation
// ========================================

/// Body of `POST /api/recommend`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendRequest {
    /// Key: question id (`EQ-7`), value: Likert answer
    pub responses: HashMap<String, f64>,
    /// Answers to replacement questions, per driver scale
    #[serde(default)]
    pub tie_breaker_answers: Option<BTreeMap<Scale, Vec<f64>>>,
}

/// Body of `POST /api/recommend/llm-fallback`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmFallbackRequest {
    pub responses: HashMap<String, f64>,
    #[serde(default)]
    pub tie_breaker_answers: Option<BTreeMap<Scale, Vec<f64>>>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    /// Arbitrate even when the rule result is not tied
    #[serde(default)]
    pub force: bool,
}

// ========================================
// Replacement questions
// ========================================

/// Body of `POST /api/requestion`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestionRequest {
    pub eq_subscale: String,
    pub fla_subscale: String,
    #[serde(default)]
    pub used_question_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestionResponse {
    /// Rounds a client may run before giving up
    pub round_limit: u32,
    pub questions: Vec<SurveyQuestion>,
}

// ========================================
// Health and errors
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Error body: `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommend_request_defaults() {
        let json = r#"{"responses": {"EQ-1": 4, "FLA-2": 2.5}}"#;
        let request: RecommendRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.responses["EQ-1"], 4.0);
        assert_eq!(request.responses["FLA-2"], 2.5);
        assert!(request.tie_breaker_answers.is_none());
    }

    #[test]
    fn test_tie_breaker_keys_are_scales() {
        let json = r#"{"responses": {}, "tie_breaker_answers": {"EQ": [4, 5], "FLA": []}}"#;
        let request: RecommendRequest = serde_json::from_str(json).unwrap();
        let answers = request.tie_breaker_answers.unwrap();
        assert_eq!(answers[&Scale::Eq], vec![4.0, 5.0]);
        assert!(answers[&Scale::Fla].is_empty());

        let bad = r#"{"responses": {}, "tie_breaker_answers": {"XYZ": [1]}}"#;
        assert!(serde_json::from_str::<RecommendRequest>(bad).is_err());
    }

    #[test]
    fn test_llm_fallback_request_optional_fields() {
        let json = r#"{"responses": {"EQ-1": 3}, "user_profile": {"goal": "speaking"}}"#;
        let request: LlmFallbackRequest = serde_json::from_str(json).unwrap();
        assert!(!request.force);
        assert_eq!(request.user_profile.unwrap()["goal"], "speaking");
    }

    #[test]
    fn test_requestion_request_used_ids_default_empty() {
        let json = r#"{"eq_subscale": "empathy", "fla_subscale": "fear"}"#;
        let request: RequestionRequest = serde_json::from_str(json).unwrap();
        assert!(request.used_question_ids.is_empty());
    }

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::new("VALIDATION", "bad answers")).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION");
        assert_eq!(body["error"]["message"], "bad answers");
    }
}
