//! Recommendation endpoints

use als_common::api::{LlmFallbackRequest, RecommendRequest};
use als_common::arbitration::ArbitrationOutcome;
use als_common::recommend::RecommendationResult;
use axum::{extract::State, Json};
use tracing::debug;

use crate::error::ApiResult;
use crate::AppState;

/// POST /api/recommend
///
/// Rule-based recommendation. Answers that leave a driver scale unscored, or fall
/// outside the Likert range, are rejected with 400.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> ApiResult<Json<RecommendationResult>> {
    let result = state
        .service
        .recommend(&request.responses, request.tie_breaker_answers.as_ref())?;

    debug!(
        strategy = %result.recommended_strategy,
        tie = result.tie_triggered,
        gap = result.score_gap,
        "Recommendation computed"
    );
    Ok(Json(result))
}

/// POST /api/recommend/llm-fallback
///
/// Same scoring, with tie arbitration when the rule result is tied or `force` is set.
pub async fn recommend_llm_fallback(
    State(state): State<AppState>,
    Json(request): Json<LlmFallbackRequest>,
) -> ApiResult<Json<ArbitrationOutcome>> {
    let outcome = state
        .service
        .llm_fallback_recommend(
            &request.responses,
            request.tie_breaker_answers.as_ref(),
            request.user_profile.as_ref(),
            request.force,
        )
        .await?;
    Ok(Json(outcome))
}
