use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::response::{ResponseError, ValidationError};
use super::vision::VisionError;
use crate::errors::ErrorBody;

/// Pipeline stages, in order. Each failure belongs to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Stored,
    Published,
    Inferred,
    Parsed,
    Validated,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Stored => "stored",
            Stage::Published => "published",
            Stage::Inferred => "inferred",
            Stage::Parsed => "parsed",
            Stage::Validated => "validated",
            Stage::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("image is required")]
    MissingImage,
    #[error("user id is required")]
    MissingUser,
    #[error("user id is invalid")]
    InvalidUser(String),
    #[error("image is not acceptable")]
    InvalidImage(String),
    #[error("failed to upload image to storage")]
    StorageWrite(String),
    #[error("failed to obtain image URL")]
    UnpublishedAsset,
    #[error("image URL is not reachable")]
    UnreachableAsset(String),
    #[error("inference service is not configured")]
    InferenceConfig,
    #[error("failed to analyze image")]
    InferenceUnavailable(String),
    #[error("failed to parse AI response")]
    MalformedResponse(String),
    #[error("meal data has an invalid format")]
    InvalidMealData(ValidationError),
}

impl AnalysisError {
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::MissingImage
            | AnalysisError::MissingUser
            | AnalysisError::InvalidUser(_)
            | AnalysisError::InvalidImage(_) => Stage::Received,
            AnalysisError::StorageWrite(_) => Stage::Stored,
            AnalysisError::UnpublishedAsset | AnalysisError::UnreachableAsset(_) => {
                Stage::Published
            }
            AnalysisError::InferenceConfig | AnalysisError::InferenceUnavailable(_) => {
                Stage::Inferred
            }
            AnalysisError::MalformedResponse(_) => Stage::Parsed,
            AnalysisError::InvalidMealData(_) => Stage::Validated,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.stage() {
            Stage::Received | Stage::Parsed | Stage::Validated => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-oriented detail, when there is more to say than the message.
    pub fn details(&self) -> Option<String> {
        match self {
            AnalysisError::InvalidUser(d)
            | AnalysisError::InvalidImage(d)
            | AnalysisError::StorageWrite(d)
            | AnalysisError::UnreachableAsset(d)
            | AnalysisError::InferenceUnavailable(d)
            | AnalysisError::MalformedResponse(d) => Some(d.clone()),
            AnalysisError::InvalidMealData(v) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Offending field for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AnalysisError::InvalidMealData(v) => Some(v.field()),
            _ => None,
        }
    }
}

impl From<VisionError> for AnalysisError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::NotConfigured => AnalysisError::InferenceConfig,
            other => AnalysisError::InferenceUnavailable(other.to_string()),
        }
    }
}

impl From<ResponseError> for AnalysisError {
    fn from(e: ResponseError) -> Self {
        match e {
            ResponseError::Malformed(d) => AnalysisError::MalformedResponse(d),
            ResponseError::Invalid(v) => AnalysisError::InvalidMealData(v),
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            details: self.details(),
            field: self.field(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_side_failures_are_400() {
        for e in [
            AnalysisError::MissingImage,
            AnalysisError::MissingUser,
            AnalysisError::InvalidImage("x".into()),
            AnalysisError::MalformedResponse("x".into()),
            AnalysisError::InvalidMealData(ValidationError::UnknownMealType),
        ] {
            assert_eq!(e.status(), StatusCode::BAD_REQUEST, "{e:?}");
        }
    }

    #[test]
    fn infrastructure_failures_are_500() {
        for e in [
            AnalysisError::StorageWrite("x".into()),
            AnalysisError::UnpublishedAsset,
            AnalysisError::UnreachableAsset("x".into()),
            AnalysisError::InferenceConfig,
            AnalysisError::InferenceUnavailable("x".into()),
        ] {
            assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR, "{e:?}");
        }
    }

    #[test]
    fn vision_errors_map_to_inference_stage() {
        let e: AnalysisError = VisionError::NotConfigured.into();
        assert!(matches!(e, AnalysisError::InferenceConfig));

        let e: AnalysisError = VisionError::Status {
            status: 503,
            message: "overloaded".into(),
        }
        .into();
        assert_eq!(e.stage(), Stage::Inferred);
        assert!(e.details().unwrap().contains("overloaded"));
    }

    #[test]
    fn error_body_names_invalid_field() {
        let e = AnalysisError::InvalidMealData(ValidationError::NotNonNegativeNumber("carbs"));
        let body = ErrorBody {
            success: false,
            error: e.to_string(),
            details: e.details(),
            field: e.field(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["field"], "carbs");
        assert!(json["details"].as_str().unwrap().contains("carbs"));
    }
}
