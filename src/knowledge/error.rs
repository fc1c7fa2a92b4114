// Cadence — Knowledge error types

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed knowledge corpus: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate knowledge item id: {0}")]
    DuplicateId(String),

    #[error("Invalid knowledge item '{id}': {reason}")]
    InvalidItem { id: String, reason: String },
}

/// Failure of the outbound language-model call. Recoverable by caller retry.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Model request failed: {0}")]
    Http(String),

    #[error("Model provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
}
