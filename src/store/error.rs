// Cadence — Store error types

use thiserror::Error;

use crate::enclave::EnclaveError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Credential '{name}' not found for owner '{owner}'")]
    NotFound { owner: String, name: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    /// Encryption or authenticated-decryption failure. Never retried.
    #[error("Crypto error: {0}")]
    Crypto(#[from] EnclaveError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True when a stored ciphertext failed verification.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, StoreError::Crypto(EnclaveError::Decryption(_)))
    }
}
