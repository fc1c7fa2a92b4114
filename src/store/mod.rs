// Cadence — Store Module
//
// The credential vault and its pluggable persistence. Secrets are sealed with
// AES-256-GCM by the enclave CipherBox before they are handed to a repository.

mod db;
mod error;
mod models;
mod repository;
mod vault;

pub use db::Database;
pub use error::StoreError;
pub use models::{
    validate_owner, CredentialRecord, CredentialSummary, MAX_KEY_LEN, MAX_SECRET_LEN,
};
pub use repository::{
    CredentialRepository, InMemoryCredentialRepository, SqliteCredentialRepository,
};
pub use vault::CredentialVault;
