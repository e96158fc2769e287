//! Short-form questionnaire

use als_common::api::QuestionsResponse;
use axum::{extract::State, Json};

use crate::AppState;

/// GET /api/questions
///
/// Selected items of both driver scales, sorted by scale, subscale and item number.
pub async fn get_questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    let questions = state.service.short_questions();
    Json(QuestionsResponse {
        total_questions: questions.len(),
        questions,
    })
}
