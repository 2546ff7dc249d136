use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, instrument};

use super::repo::{self, AiLog};
use crate::{auth::AuthUser, state::AppState};

pub fn ai_log_routes() -> Router<AppState> {
    Router::new().route("/ai-logs", get(list_ai_logs))
}

#[instrument(skip(state))]
pub async fn list_ai_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AiLog>>, (StatusCode, String)> {
    let logs = repo::list_recent(&state.db, user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "list ai logs failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(logs))
}
