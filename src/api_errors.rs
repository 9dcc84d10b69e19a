use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::errors::PredictorError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::Unprocessable(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            AppError::BadRequest(s) => (StatusCode::BAD_REQUEST, s),
            AppError::Unprocessable(s) => (StatusCode::UNPROCESSABLE_ENTITY, s),
            AppError::Unavailable(s) => (StatusCode::SERVICE_UNAVAILABLE, s),
            AppError::Internal(s) => (StatusCode::INTERNAL_SERVER_ERROR, s),
        };
        (code, Json(ErrBody { error: msg.clone() })).into_response()
    }
}

impl From<PredictorError> for AppError {
    fn from(err: PredictorError) -> Self {
        match err {
            PredictorError::NoMatchingFeatures { .. } => AppError::unprocessable(err.to_string()),
            PredictorError::ModelNotLoaded | PredictorError::ModelInfoUnavailable => {
                AppError::unavailable(err.to_string())
            }
            PredictorError::Config { message } => AppError::bad_request(message),
            PredictorError::PredictionFailed { .. }
            | PredictorError::ArtifactMissing { .. }
            | PredictorError::ArtifactCorrupt { .. }
            | PredictorError::UnmappedFeature { .. }
            | PredictorError::InvalidDataset { .. }
            | PredictorError::Io { .. } => AppError::internal(err.to_string()),
        }
    }
}
