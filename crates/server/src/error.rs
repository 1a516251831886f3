use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use std::fmt;
use tracing::error;
use visearch_common::VisearchError;

use crate::types::ErrorResponse;

/// HTTP-facing wrapper around the library error
#[derive(Debug)]
pub struct ApiError(pub VisearchError);

impl From<VisearchError> for ApiError {
    fn from(err: VisearchError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        })
    }
}

/// Shorthand for 400 responses raised by request validation
pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(VisearchError::invalid_input(message))
}

/// JSON extractor failures rendered as `{error, message}` bodies
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let err = match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            VisearchError::payload_too_large(err.to_string())
        }
        other => VisearchError::invalid_input(format!("invalid JSON body: {}", other)),
    };
    ApiError(err).into()
}
