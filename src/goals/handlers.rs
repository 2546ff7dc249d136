use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use super::calculator::{calculate, Biometrics, GoalError};
use super::dto::{GoalBreakdown, GoalPreviewResponse, SavedGoalResponse};
use super::repo::{self, DailyGoals};
use crate::{auth::AuthUser, errors::ErrorBody, state::AppState};

pub fn goal_routes() -> Router<AppState> {
    Router::new()
        .route("/goals", get(get_goals).post(save_goals))
        .route("/goals/preview", post(preview_goals))
}

impl IntoResponse for GoalError {
    fn into_response(self) -> Response {
        let GoalError::InvalidInput(fields) = &self;
        let body = ErrorBody::new(
            "invalid biometric input",
            Some(format!("must be positive: {}", fields.join(", "))),
        );
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Unknown enum values and malformed bodies keep the extractor's status
/// (422 or 400) but get the same JSON body as the other goal errors.
fn biometrics(input: Result<Json<Biometrics>, JsonRejection>) -> Result<Biometrics, Response> {
    input.map(|Json(b)| b).map_err(|rejection| {
        let body = ErrorBody::new("invalid biometric input", Some(rejection.body_text()));
        (rejection.status(), Json(body)).into_response()
    })
}

/// POST /goals/preview: compute only.
#[instrument(skip(input))]
pub async fn preview_goals(
    input: Result<Json<Biometrics>, JsonRejection>,
) -> Result<Json<GoalPreviewResponse>, Response> {
    let input = biometrics(input)?;
    let goal = calculate(&input).map_err(IntoResponse::into_response)?;
    Ok(Json(GoalPreviewResponse {
        goal,
        breakdown: GoalBreakdown::of(&input),
    }))
}

/// POST /goals: compute and store as the caller's daily goal.
#[instrument(skip(state, input))]
pub async fn save_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    input: Result<Json<Biometrics>, JsonRejection>,
) -> Result<Json<SavedGoalResponse>, Response> {
    let input = biometrics(input)?;
    let goal = calculate(&input).map_err(IntoResponse::into_response)?;
    let saved = repo::upsert(&state.db, user_id, &goal).await.map_err(|e| {
        error!(error = %e, %user_id, "upsert daily goals failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
    })?;
    info!(%user_id, calories = saved.calories, "daily goals updated");
    Ok(Json(SavedGoalResponse {
        goal: saved,
        breakdown: GoalBreakdown::of(&input),
    }))
}

#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DailyGoals>, (StatusCode, String)> {
    match repo::get_for_user(&state.db, user_id).await {
        Ok(Some(goals)) => Ok(Json(goals)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "No daily goals set".into())),
        Err(e) => {
            error!(error = %e, %user_id, "get daily goals failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
