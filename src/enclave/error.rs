// Cadence — Enclave error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Master secret not found in {0}")]
    MasterSecretNotFound(String),

    #[error("Master secret too short: {0} bytes, expected at least {1}")]
    WeakMasterSecret(usize, usize),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Authenticated decryption failed: tampered, truncated, or mismatched IV.
    #[error("Decryption failed: {0}")]
    Decryption(String),
}
