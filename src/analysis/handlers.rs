use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use super::error::AnalysisError;
use super::pipeline::{AnalysisRequest, ImageUpload, MAX_IMAGE_BYTES};
use super::response::MealCandidate;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyzeMealResponse {
    pub success: bool,
    pub meal: MealCandidate,
    pub image_url: String,
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-meal", post(analyze_meal))
        // headroom over the image limit so oversize files get a proper error body
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 2 * 1024 * 1024))
}

/// POST /analyze-meal (multipart: `image` file, `userId` text)
#[instrument(skip(state, mp))]
pub async fn analyze_meal(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Json<AnalyzeMealResponse>, AnalysisError> {
    let mut req = AnalysisRequest::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AnalysisError::InvalidImage(format!("malformed form data: {e}")))?
    {
        match field.name() {
            Some("image") => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AnalysisError::InvalidImage(format!("unreadable image: {e}")))?;
                req.image = Some(ImageUpload {
                    bytes,
                    content_type,
                });
            }
            Some("userId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AnalysisError::InvalidUser(e.to_string()))?;
                req.user_id = Some(text);
            }
            _ => {}
        }
    }

    let done = state.analyzer.analyze(req).await?;
    Ok(Json(AnalyzeMealResponse {
        success: true,
        meal: done.meal,
        image_url: done.image_url,
    }))
}
