use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::base::{token::TokenError, types::InvalidInput};

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures surfaced to HTTP clients as a JSON body of the form `{error, details}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InvalidInput>() {
            Ok(invalid) => ApiError::BadRequest(invalid.0),
            Err(err) => ApiError::Internal(err),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Token(TokenError::Validation(_) | TokenError::Malformed(_)) => StatusCode::BAD_REQUEST,
            ApiError::Token(TokenError::Configuration(_) | TokenError::Encoding(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad request",
            ApiError::NotFound(_) => "Not found",
            ApiError::Token(TokenError::Configuration(_)) => "Twilio configuration error",
            ApiError::Token(TokenError::Validation(_)) => "Invalid token request",
            ApiError::Token(_) => "Failed to generate access token",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let body = match &self {
            ApiError::Token(err) => json!({ "success": false, "error": self.summary(), "details": err.to_string() }),
            _ => json!({ "error": self.summary(), "details": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_becomes_bad_request() {
        let err: ApiError = anyhow::Error::from(InvalidInput::new("name is required")).into();

        assert!(matches!(&err, ApiError::BadRequest(message) if message == "name is required"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn token_errors_map_to_client_or_server_status() {
        assert_eq!(ApiError::from(TokenError::Validation("ttl".to_string())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(TokenError::Configuration("missing".to_string())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::from(anyhow::anyhow!("boom")).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
