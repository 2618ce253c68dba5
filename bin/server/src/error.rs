//! HTTP error responses.
//!
//! Relay and transcript failures are mapped to status codes by the kind of
//! their outermost context. Bodies follow the Ollama shape, `{"error": ...}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatbridge_relay::RelayError;
use chatbridge_transcript::TranscriptError;
use rootcause::prelude::Report;
use serde_json::json;

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Relay(Report<RelayError>),
    Transcript(Report<TranscriptError>),
    StreamingUnsupported,
}

impl From<Report<RelayError>> for ApiError {
    fn from(report: Report<RelayError>) -> Self {
        Self::Relay(report)
    }
}

impl From<Report<TranscriptError>> for ApiError {
    fn from(report: Report<TranscriptError>) -> Self {
        Self::Transcript(report)
    }
}

/// Status code for a relay failure.
#[must_use]
pub fn relay_status(error: &RelayError) -> StatusCode {
    match error {
        RelayError::Configuration { .. } | RelayError::Storage { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        RelayError::PeerResolution { .. } | RelayError::Transport { .. } => {
            StatusCode::BAD_GATEWAY
        }
        RelayError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        RelayError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
    }
}

/// Status code for a transcript failure.
#[must_use]
pub fn transcript_status(error: &TranscriptError) -> StatusCode {
    match error {
        TranscriptError::NotFound { .. } => StatusCode::NOT_FOUND,
        TranscriptError::InvalidName { .. } => StatusCode::BAD_REQUEST,
        TranscriptError::Io { .. }
        | TranscriptError::Serialize { .. }
        | TranscriptError::Closed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Relay(report) => {
                let error = report.current_context();
                (relay_status(error), error.to_string())
            }
            Self::Transcript(report) => {
                let error = report.current_context();
                (transcript_status(error), error.to_string())
            }
            Self::StreamingUnsupported => (
                StatusCode::NOT_IMPLEMENTED,
                "streaming responses are not supported".to_string(),
            ),
        };

        match &self {
            Self::Relay(report) if status.is_server_error() => {
                tracing::error!(error = %report, "request failed");
            }
            Self::Transcript(report) if status.is_server_error() => {
                tracing::error!(error = %report, "request failed");
            }
            _ => tracing::debug!(%status, reason = %message, "request rejected"),
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
