// Cadence — CipherBox
//
// Authenticated symmetric encryption for credential values. The AES-256 key is
// derived exactly once from the master secret with Argon2id and kept in
// zeroizing memory for the lifetime of the box. Every encryption draws a fresh
// 96-bit nonce; the nonce travels alongside the ciphertext as the "IV" and must
// be supplied again to decrypt.
//
// Both halves of a sealed secret are base64 (standard alphabet) strings so they
// can be stored in any text column or JSON document.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::EnclaveError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Length of the derived AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Master secrets shorter than this are refused outright.
pub const MIN_MASTER_SECRET_LEN: usize = 16;

// Argon2id defaults: m=65536 (64 MiB), t=3, p=4
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

// ─── KDF parameters ──────────────────────────────────────────────────────────

/// Argon2id cost parameters, configurable per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Parallelism lanes.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    ARGON2_M_COST
}

fn default_iterations() -> u32 {
    ARGON2_T_COST
}

fn default_parallelism() -> u32 {
    ARGON2_P_COST
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_M_COST,
            iterations: ARGON2_T_COST,
            parallelism: ARGON2_P_COST,
        }
    }
}

impl KdfParams {
    /// Minimal cost parameters so unit tests don't spend seconds in Argon2.
    #[cfg(test)]
    pub(crate) fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Build the per-deployment KDF salt.
/// Salt = SHA-256("cadence-kdf" || "::" || deployment_id)
pub fn deployment_salt(deployment_id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"cadence-kdf");
    hasher.update(b"::");
    hasher.update(deployment_id.as_bytes());
    hasher.finalize().into()
}

// ─── Sealed secret ───────────────────────────────────────────────────────────

/// Output of a single encryption: ciphertext (with GCM tag) and the nonce used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    pub ciphertext: String,
    pub iv: String,
}

// ─── CipherBox ───────────────────────────────────────────────────────────────

pub struct CipherBox {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl CipherBox {
    /// Derive the encryption key from the master secret. This is the slow step
    /// and must happen once per process, not per call.
    pub fn derive(
        master_secret: &[u8],
        salt: &[u8],
        params: &KdfParams,
    ) -> Result<Self, EnclaveError> {
        if master_secret.len() < MIN_MASTER_SECRET_LEN {
            return Err(EnclaveError::WeakMasterSecret(
                master_secret.len(),
                MIN_MASTER_SECRET_LEN,
            ));
        }

        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| EnclaveError::Derivation(format!("invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(master_secret, salt, &mut *key)
            .map_err(|e| EnclaveError::Derivation(format!("Argon2id hash failed: {}", e)))?;

        tracing::debug!("Vault encryption key derived");
        Ok(Self { key })
    }

    fn aead(&self) -> Result<Aes256Gcm, EnclaveError> {
        Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|e| EnclaveError::Encryption(format!("invalid key: {}", e)))
    }

    /// Encrypt a secret string under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<SealedSecret, EnclaveError> {
        let cipher = self.aead()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| EnclaveError::Encryption(format!("AES-GCM seal failed: {}", e)))?;

        Ok(SealedSecret {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(nonce_bytes),
        })
    }

    /// Decrypt a sealed secret. Any tampering with either half fails
    /// authentication and yields `EnclaveError::Decryption`.
    pub fn decrypt(&self, ciphertext: &str, iv: &str) -> Result<Zeroizing<String>, EnclaveError> {
        let nonce_bytes = STANDARD
            .decode(iv)
            .map_err(|e| EnclaveError::Decryption(format!("malformed IV: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(EnclaveError::Decryption(format!(
                "invalid IV length: expected {}, got {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }

        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|e| EnclaveError::Decryption(format!("malformed ciphertext: {}", e)))?;

        let plaintext = self
            .aead()?
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_slice())
            .map_err(|_| EnclaveError::Decryption("authentication tag mismatch".to_string()))?;

        let text = String::from_utf8(plaintext).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            EnclaveError::Decryption("plaintext is not valid UTF-8".to_string())
        })?;

        Ok(Zeroizing::new(text))
    }
}

/// Never print key material.
impl fmt::Debug for CipherBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherBox")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &[u8] = b"correct horse battery staple 0001";

    fn test_box() -> CipherBox {
        CipherBox::derive(MASTER, &deployment_salt("test"), &KdfParams::insecure_fast()).unwrap()
    }

    fn flip_byte(encoded: &str, index: usize) -> String {
        let mut raw = STANDARD.decode(encoded).unwrap();
        raw[index] ^= 0x01;
        STANDARD.encode(raw)
    }

    #[test]
    fn test_round_trip_various_inputs() {
        let cipher = test_box();
        let long = "x".repeat(10_000);
        for input in ["", "sk-123", "pässwörd ✓ 鍵", long.as_str()] {
            let sealed = cipher.encrypt(input).unwrap();
            let opened = cipher.decrypt(&sealed.ciphertext, &sealed.iv).unwrap();
            assert_eq!(opened.as_str(), input);
        }
    }

    fn random_text(rng: &mut impl rand::Rng, max_chars: usize) -> String {
        let len = rng.random_range(0..=max_chars);
        (0..len)
            .map(|_| loop {
                let candidate = match rng.random_range(0..4) {
                    0 => rng.random_range(0x20..0x7f),
                    1 => rng.random_range(0x80..0x800),
                    2 => rng.random_range(0x800..0x10000),
                    _ => rng.random_range(0x10000..0x110000),
                };
                if let Some(c) = char::from_u32(candidate) {
                    break c;
                }
            })
            .collect()
    }

    #[test]
    fn test_round_trip_generated_inputs() {
        let cipher = test_box();
        let mut rng = rand::rng();

        for _ in 0..200 {
            let input = random_text(&mut rng, 256);
            let sealed = cipher.encrypt(&input).unwrap();
            let opened = cipher.decrypt(&sealed.ciphertext, &sealed.iv).unwrap();
            assert_eq!(opened.as_str(), input);
        }

        // Largest secret the vault accepts, in one- and multi-byte text.
        let max = crate::store::MAX_SECRET_LEN;
        for input in ["a".repeat(max), "é".repeat(max / 2), "鍵".repeat(max / 3)] {
            assert!(input.len() <= max);
            let sealed = cipher.encrypt(&input).unwrap();
            let opened = cipher.decrypt(&sealed.ciphertext, &sealed.iv).unwrap();
            assert_eq!(opened.as_str(), input);
        }
    }

    #[test]
    fn test_each_encryption_uses_fresh_iv() {
        let cipher = test_box();
        let a = cipher.encrypt("same text").unwrap();
        let b = cipher.encrypt("same text").unwrap();
        assert_ne!(a.iv, b.iv, "IVs must never repeat");
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_ciphertext_does_not_contain_plaintext() {
        let cipher = test_box();
        let sealed = cipher.encrypt("sk-live-abcdef").unwrap();
        let raw = STANDARD.decode(&sealed.ciphertext).unwrap();
        assert!(!raw.windows(6).any(|w| w == b"sk-liv"));
    }

    #[test]
    fn test_tampering_any_ciphertext_byte_fails() {
        let cipher = test_box();
        let sealed = cipher.encrypt("tutor-api-key").unwrap();
        let len = STANDARD.decode(&sealed.ciphertext).unwrap().len();

        for i in 0..len {
            let tampered = flip_byte(&sealed.ciphertext, i);
            let result = cipher.decrypt(&tampered, &sealed.iv);
            assert!(
                matches!(result, Err(EnclaveError::Decryption(_))),
                "byte {} tampered must fail",
                i
            );
        }
    }

    #[test]
    fn test_tampering_any_iv_byte_fails() {
        let cipher = test_box();
        let sealed = cipher.encrypt("tutor-api-key").unwrap();

        for i in 0..NONCE_LEN {
            let tampered = flip_byte(&sealed.iv, i);
            let result = cipher.decrypt(&sealed.ciphertext, &tampered);
            assert!(matches!(result, Err(EnclaveError::Decryption(_))));
        }
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let cipher = test_box();
        let sealed = cipher.encrypt("something longer than a tag").unwrap();
        let mut raw = STANDARD.decode(&sealed.ciphertext).unwrap();
        raw.truncate(raw.len() - 1);
        let result = cipher.decrypt(&STANDARD.encode(raw), &sealed.iv);
        assert!(matches!(result, Err(EnclaveError::Decryption(_))));
    }

    #[test]
    fn test_mismatched_iv_pairing_fails() {
        let cipher = test_box();
        let a = cipher.encrypt("first").unwrap();
        let b = cipher.encrypt("second").unwrap();
        let result = cipher.decrypt(&a.ciphertext, &b.iv);
        assert!(matches!(result, Err(EnclaveError::Decryption(_))));
    }

    #[test]
    fn test_malformed_encoding_and_iv_length_fail() {
        let cipher = test_box();
        let sealed = cipher.encrypt("value").unwrap();

        assert!(matches!(
            cipher.decrypt("%%% not base64 %%%", &sealed.iv),
            Err(EnclaveError::Decryption(_))
        ));
        assert!(matches!(
            cipher.decrypt(&sealed.ciphertext, &STANDARD.encode([0u8; 8])),
            Err(EnclaveError::Decryption(_))
        ));
    }

    #[test]
    fn test_same_master_and_salt_derive_compatible_boxes() {
        let first = test_box();
        let second = test_box();
        let sealed = first.encrypt("portable").unwrap();
        let opened = second.decrypt(&sealed.ciphertext, &sealed.iv).unwrap();
        assert_eq!(opened.as_str(), "portable");
    }

    #[test]
    fn test_different_salt_cannot_decrypt() {
        let first = test_box();
        let other = CipherBox::derive(
            MASTER,
            &deployment_salt("another-deployment"),
            &KdfParams::insecure_fast(),
        )
        .unwrap();
        let sealed = first.encrypt("scoped").unwrap();
        assert!(other.decrypt(&sealed.ciphertext, &sealed.iv).is_err());
    }

    #[test]
    fn test_weak_master_secret_rejected() {
        let result = CipherBox::derive(b"short", &deployment_salt("t"), &KdfParams::insecure_fast());
        assert!(matches!(result, Err(EnclaveError::WeakMasterSecret(5, MIN_MASTER_SECRET_LEN))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let output = format!("{:?}", test_box());
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn test_deployment_salt_is_stable_and_distinct() {
        assert_eq!(deployment_salt("a"), deployment_salt("a"));
        assert_ne!(deployment_salt("a"), deployment_salt("b"));
    }
}
