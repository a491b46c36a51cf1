use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::ApiMessage;

/// Domain outcomes for everything that can go wrong on a request.
///
/// Remote-call failures are converted into one of these at the component
/// boundary; raw transport errors never reach the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("hash collision detected for key {0}")]
    Collision(String),

    #[error("the registry has reached its entry limit")]
    Capacity,

    #[error("upstream store failure: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Identity(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Collision(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Capacity => StatusCode::INSUFFICIENT_STORAGE,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Rate-limit refusals are warnings in the payload classification,
        // everything else is an error.
        let message = match &self {
            ApiError::RateLimited(msg) => ApiMessage::warning(msg),
            other => ApiMessage::error(&other.to_string()),
        };
        (status, message).into_response()
    }
}
