//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use strata_types::error::MemoryError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Memory(MemoryError),
}

impl From<MemoryError> for AppError {
    fn from(e: MemoryError) -> Self {
        AppError::Memory(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Memory(MemoryError::InvalidPayload(rejection.body_text()))
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Memory(MemoryError::InvalidPayload(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD")
            }
            AppError::Memory(MemoryError::ProviderUnavailable { .. }) => {
                (StatusCode::BAD_GATEWAY, "PROVIDER_UNAVAILABLE")
            }
            AppError::Memory(MemoryError::MalformedExtractionResponse(_)) => {
                (StatusCode::BAD_GATEWAY, "MALFORMED_EXTRACTION_RESPONSE")
            }
            AppError::Memory(MemoryError::Configuration(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::Memory(MemoryError::QueueUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_UNAVAILABLE")
            }
            AppError::Memory(MemoryError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let AppError::Memory(err) = &self;
        let message = err.to_string();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}
