// Cadence — Audit Module
//
// Bounded per-owner usage history for tool invocations, with parameter
// redaction and simple analytics.

mod history;
mod redact;

use thiserror::Error;

pub use history::{AuditEntry, UsageAuditLog, UsageSummary, DEFAULT_RETENTION_CAP};
pub use redact::{ParamRedactor, DEFAULT_REDACTED_FIELDS};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid input: {0}")]
    Validation(String),
}
