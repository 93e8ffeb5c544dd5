use crate::infrastructure::error::InfraError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Infra(infra) => match infra {
                InfraError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
                InfraError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                InfraError::InvalidTransition(_) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
                InfraError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                InfraError::Json(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infra_errors_map_to_status_codes() {
        let cases = [
            (InfraError::Validation("bad".to_string()), StatusCode::UNPROCESSABLE_ENTITY),
            (InfraError::NotFound("item".to_string()), StatusCode::NOT_FOUND),
            (InfraError::InvalidTransition("idle".to_string()), StatusCode::CONFLICT),
            (InfraError::State("poisoned".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let response = ApiError::Unauthorized("missing bearer token".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
