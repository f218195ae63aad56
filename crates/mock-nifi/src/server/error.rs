//! Ingest errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure handling an upload.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`IngestError::BadRequest`] → 400
/// - [`IngestError::Storage`] → 500
///
/// The display text is the plain-text response body.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request failed validation; no retry will help.
    #[error("{0}")]
    BadRequest(String),

    /// The upload could not be written to disk.
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl IngestError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
