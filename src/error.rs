// Cadence — Top-level error types
//
// Aggregates the per-module errors into a single enum for the transports.

use thiserror::Error;

use crate::store::StoreError;

/// Top-level error type for all Cadence operations.
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Enclave error: {0}")]
    Enclave(#[from] crate::enclave::EnclaveError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] crate::audit::AuditError),

    #[error("Access error: {0}")]
    Access(#[from] crate::access::AccessError),

    #[error("Knowledge error: {0}")]
    Knowledge(#[from] crate::knowledge::KnowledgeError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] crate::knowledge::UpstreamError),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CadenceError {
    /// Only upstream failures are worth retrying; everything else fails the
    /// same way twice.
    pub fn is_retriable(&self) -> bool {
        matches!(self, CadenceError::Upstream(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CadenceError::Store(StoreError::NotFound { .. }))
    }

    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, CadenceError::Store(e) if e.is_decryption_failure())
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CadenceError::Validation(_)
                | CadenceError::Store(StoreError::Validation(_))
                | CadenceError::Audit(crate::audit::AuditError::Validation(_))
                | CadenceError::Access(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::EnclaveError;
    use crate::knowledge::UpstreamError;
    use std::time::Duration;

    #[test]
    fn test_only_upstream_is_retriable() {
        assert!(CadenceError::from(UpstreamError::Timeout(Duration::from_secs(1))).is_retriable());
        assert!(!CadenceError::Validation("x".into()).is_retriable());
        assert!(!CadenceError::from(StoreError::Crypto(EnclaveError::Decryption(
            "tag".into()
        )))
        .is_retriable());
    }

    #[test]
    fn test_classification() {
        let not_found = CadenceError::from(StoreError::NotFound {
            owner: "u1".into(),
            name: "llm-api".into(),
        });
        assert!(not_found.is_not_found());
        assert!(!not_found.is_validation());

        let tampered = CadenceError::from(StoreError::Crypto(EnclaveError::Decryption(
            "tag mismatch".into(),
        )));
        assert!(tampered.is_decryption_failure());

        assert!(CadenceError::from(StoreError::Validation("empty".into())).is_validation());
        assert!(CadenceError::from(crate::access::AccessError::UnknownRole("root".into()))
            .is_validation());
    }
}
