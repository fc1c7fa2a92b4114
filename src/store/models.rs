// Cadence — Credential data models
//
// SECURITY: a `CredentialRecord` only ever carries ciphertext. Plaintext exists
// solely as the `Zeroizing<String>` returned from `CredentialVault::get`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enclave::SealedSecret;

/// Longest accepted owner id or credential name, in characters.
pub const MAX_KEY_LEN: usize = 128;

/// Largest secret the vault accepts, in bytes.
pub const MAX_SECRET_LEN: usize = 16 * 1024;

/// The persisted form of one credential, keyed by `(owner_id, name)`.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub owner_id: String,
    pub name: String,
    pub ciphertext: String,
    pub iv: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Build a fresh record from a sealed secret, stamped `now`.
    pub fn new(owner_id: &str, name: &str, sealed: SealedSecret, now: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            ciphertext: sealed.ciphertext,
            iv: sealed.iv,
            created_at: now,
            last_used_at: now,
        }
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            name: self.name.clone(),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        }
    }
}

/// Ciphertext is opaque but still not something to spray into logs.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("ciphertext", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

/// A lightweight view of a credential, used for listing.
/// Never contains ciphertext or plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl fmt::Display for CredentialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (created {}, last used {})",
            self.name,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.last_used_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Owner ids come from an external identity provider; accept anything printable.
pub fn validate_owner(owner_id: &str) -> Result<(), String> {
    if owner_id.trim().is_empty() {
        return Err("owner id must not be empty".to_string());
    }
    if owner_id.chars().count() > MAX_KEY_LEN {
        return Err(format!("owner id exceeds {} characters", MAX_KEY_LEN));
    }
    if owner_id.chars().any(char::is_control) {
        return Err("owner id must not contain control characters".to_string());
    }
    Ok(())
}

/// Credential names are identifiers such as `llm-api` or `spotify.refresh`.
pub fn validate_credential_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("credential name must not be empty".to_string());
    }
    if name.chars().count() > MAX_KEY_LEN {
        return Err(format!("credential name exceeds {} characters", MAX_KEY_LEN));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
    {
        return Err(format!("credential name contains invalid character {:?}", bad));
    }
    Ok(())
}

pub fn validate_secret(secret: &str) -> Result<(), String> {
    if secret.is_empty() {
        return Err("secret must not be empty".to_string());
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(format!(
            "secret is {} bytes, limit is {}",
            secret.len(),
            MAX_SECRET_LEN
        ));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
