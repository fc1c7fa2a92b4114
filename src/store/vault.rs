// Cadence — Credential Vault
//
// Owner-scoped encrypted credential storage. The vault seals every value with
// the process-wide CipherBox before it reaches the repository, and serializes
// all mutations per owner: `store`, `get` (which refreshes `last_used_at`) and
// `delete` take the owner's write lock, `list` takes the read lock. Different
// owners never contend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use zeroize::Zeroizing;

use crate::enclave::CipherBox;

use super::models::{
    validate_credential_name, validate_owner, validate_secret, CredentialRecord,
    CredentialSummary,
};
use super::repository::CredentialRepository;
use super::StoreError;

// ─── Owner locks ─────────────────────────────────────────────────────────────

/// One reader/writer lock per owner id. An entry lives only while some
/// operation on that owner holds or waits for it.
#[derive(Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl OwnerLocks {
    fn with_read<T>(&self, owner_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.acquire(owner_id);
        let out = {
            let _guard = lock.read();
            f()
        };
        self.release(owner_id, lock);
        out
    }

    fn with_write<T>(&self, owner_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.acquire(owner_id);
        let out = {
            let _guard = lock.write();
            f()
        };
        self.release(owner_id, lock);
        out
    }

    fn acquire(&self, owner_id: &str) -> Arc<RwLock<()>> {
        self.locks
            .lock()
            .entry(owner_id.to_string())
            .or_default()
            .clone()
    }

    /// Clones are only taken under the registry mutex, so a strong count of
    /// one seen under it means no other operation uses the entry.
    fn release(&self, owner_id: &str, lock: Arc<RwLock<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks
            .get(owner_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(owner_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

// ─── Vault ───────────────────────────────────────────────────────────────────

pub struct CredentialVault {
    cipher: CipherBox,
    repo: Arc<dyn CredentialRepository>,
    locks: OwnerLocks,
}

impl CredentialVault {
    pub fn new(cipher: CipherBox, repo: Arc<dyn CredentialRepository>) -> Self {
        Self {
            cipher,
            repo,
            locks: OwnerLocks::default(),
        }
    }

    /// Encrypt and store a secret, replacing any previous value under the same
    /// `(owner, name)`. `created_at` survives replacement; `last_used_at` is
    /// always refreshed.
    pub fn store(&self, owner_id: &str, name: &str, secret: &str) -> Result<(), StoreError> {
        validate_owner(owner_id).map_err(StoreError::Validation)?;
        validate_credential_name(name).map_err(StoreError::Validation)?;
        validate_secret(secret).map_err(StoreError::Validation)?;

        let sealed = self.cipher.encrypt(secret)?;

        let created = self.locks.with_write(owner_id, || {
            let record = CredentialRecord::new(owner_id, name, sealed, Utc::now());
            self.repo.upsert(&record)
        })?;

        tracing::info!(
            owner = %owner_id,
            credential = %name,
            created,
            "Credential stored"
        );
        Ok(())
    }

    /// Decrypt and return a secret, refreshing its `last_used_at`.
    pub fn get(&self, owner_id: &str, name: &str) -> Result<Zeroizing<String>, StoreError> {
        validate_owner(owner_id).map_err(StoreError::Validation)?;
        validate_credential_name(name).map_err(StoreError::Validation)?;

        let secret = self.locks.with_write(owner_id, || {
            let record = self
                .repo
                .fetch(owner_id, name)?
                .ok_or_else(|| StoreError::NotFound {
                    owner: owner_id.to_string(),
                    name: name.to_string(),
                })?;

            let secret = self
                .cipher
                .decrypt(&record.ciphertext, &record.iv)
                .map_err(|e| {
                    tracing::error!(
                        owner = %owner_id,
                        credential = %name,
                        "Stored credential failed verification"
                    );
                    StoreError::Crypto(e)
                })?;

            self.repo.touch(owner_id, name, Utc::now())?;
            Ok::<_, StoreError>(secret)
        })?;

        tracing::debug!(owner = %owner_id, credential = %name, "Credential accessed");
        Ok(secret)
    }

    /// List an owner's credentials. Never returns ciphertext or plaintext.
    pub fn list(&self, owner_id: &str) -> Result<Vec<CredentialSummary>, StoreError> {
        validate_owner(owner_id).map_err(StoreError::Validation)?;

        self.locks.with_read(owner_id, || self.repo.list(owner_id))
    }

    /// Remove a credential. Returns false, not an error, if it did not exist.
    pub fn delete(&self, owner_id: &str, name: &str) -> Result<bool, StoreError> {
        validate_owner(owner_id).map_err(StoreError::Validation)?;
        validate_credential_name(name).map_err(StoreError::Validation)?;

        let removed = self
            .locks
            .with_write(owner_id, || self.repo.remove(owner_id, name))?;
        if removed {
            tracing::info!(owner = %owner_id, credential = %name, "Credential deleted");
        }
        Ok(removed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
