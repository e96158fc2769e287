//! Replacement questions

use als_common::api::{RequestionRequest, RequestionResponse};
use axum::{extract::State, Json};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /api/requestion
///
/// Up to one unused replacement question per driver scale, plus the round limit the
/// client must respect.
pub async fn requestion(
    State(state): State<AppState>,
    Json(request): Json<RequestionRequest>,
) -> ApiResult<Json<RequestionResponse>> {
    let questions = {
        let mut rng = state
            .rng
            .lock()
            .map_err(|_| ApiError::Internal("Random source lock poisoned".to_string()))?;
        state.service.next_questions(
            &request.eq_subscale,
            &request.fla_subscale,
            &request.used_question_ids,
            &mut *rng,
        )
    };

    Ok(Json(RequestionResponse {
        round_limit: state.service.round_limit(),
        questions,
    }))
}
