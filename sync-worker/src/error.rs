//! Per-request error taxonomy and its mapping onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

/// Everything that can end a webhook request early.
///
/// Responses carry a short fixed reason only; payload contents never reach
/// the caller.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing required headers")]
    MissingHeaders,

    #[error("signing secret misconfigured: {0}")]
    Configuration(String),

    #[error("Invalid Signature")]
    SignatureMismatch,

    #[error("Stale webhook timestamp")]
    StaleTimestamp,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingHeaders
            | WebhookError::SignatureMismatch
            | WebhookError::StaleTimestamp => StatusCode::BAD_REQUEST,
            // A verified sender producing undecodable JSON is treated as a
            // server-side decode fault, as the deployed handlers always did.
            WebhookError::MalformedPayload(_)
            | WebhookError::Configuration(_)
            | WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plaintext body sent back to the caller.
    pub fn public_reason(&self) -> &'static str {
        match self {
            WebhookError::MissingHeaders => "Missing required headers",
            WebhookError::SignatureMismatch => "Invalid Signature",
            WebhookError::StaleTimestamp => "Stale webhook timestamp",
            WebhookError::Configuration(_) => "Webhook verification is not configured",
            WebhookError::MalformedPayload(_) => "Error parsing webhook payload",
            WebhookError::Storage(StoreError::Lookup(_)) => "Error fetching user data",
            WebhookError::Storage(StoreError::Insert(_) | StoreError::Conflict(_)) => {
                "Error inserting user data"
            }
            WebhookError::Storage(_) => "Error updating user data",
        }
    }

    /// Short label for log events.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookError::MissingHeaders => "missing_headers",
            WebhookError::Configuration(_) => "configuration",
            WebhookError::SignatureMismatch => "signature_mismatch",
            WebhookError::StaleTimestamp => "stale_timestamp",
            WebhookError::MalformedPayload(_) => "malformed_payload",
            WebhookError::Storage(_) => "storage",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status_code(), self.public_reason()).into_response()
    }
}
