//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::{AdapterError, EngineError};
use ledger::LedgerError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Engine error.
    Engine(EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Engine(err) => engine_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn engine_error_to_response(err: EngineError) -> (StatusCode, String) {
    match &err {
        EngineError::RecordNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        EngineError::Domain(_) | EngineError::ProviderNotConfigured(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        EngineError::InconsistentState(_) => (StatusCode::CONFLICT, err.to_string()),
        EngineError::Provider { source, .. } => match source {
            AdapterError::InvalidReference(_) | AdapterError::Unsupported => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            _ => (StatusCode::BAD_GATEWAY, err.to_string()),
        },
        EngineError::Ledger(LedgerError::UserExists(_)) => (StatusCode::CONFLICT, err.to_string()),
        EngineError::Ledger(_) => {
            tracing::error!(error = %err, "ledger failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}
