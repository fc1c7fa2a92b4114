// Cadence — Master Secret Sources
//
// The vault key is derived from one server-wide master secret. Deployments
// supply it either through an environment variable (containers, CI) or through
// the platform keyring (workstations). The secret is only held long enough to
// run the key derivation in `CipherBox::derive`.

use rand::RngCore;
use zeroize::Zeroizing;

use super::EnclaveError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default environment variable holding the master secret.
pub const DEFAULT_SECRET_ENV: &str = "CADENCE_MASTER_SECRET";

/// Service name used to identify Cadence entries in the platform keyring.
const KEYRING_SERVICE: &str = "cadence-gateway";

/// Username for the keyring entry (identifies the master secret).
const KEYRING_USER: &str = "master-secret";

/// Length of a generated master secret in bytes (256-bit entropy).
const MASTER_SECRET_LEN: usize = 32;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over where the master secret lives, so the vault never cares
/// whether it came from the environment, the OS keyring, or a test fixture.
pub trait MasterSecretSource: Send + Sync {
    /// Human-readable location, used in error messages and logs.
    fn describe(&self) -> String;

    /// Load the master secret. Fails with `MasterSecretNotFound` if absent.
    fn load(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    /// Check whether a master secret is present.
    fn is_present(&self) -> Result<bool, EnclaveError>;
}

// ─── Environment ─────────────────────────────────────────────────────────────

/// Reads the master secret from an environment variable.
pub struct EnvSecretSource {
    var: String,
}

impl EnvSecretSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretSource {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_ENV)
    }
}

impl MasterSecretSource for EnvSecretSource {
    fn describe(&self) -> String {
        format!("environment variable ${}", self.var)
    }

    fn load(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Zeroizing::new(value.into_bytes())),
            _ => Err(EnclaveError::MasterSecretNotFound(self.describe())),
        }
    }

    fn is_present(&self) -> Result<bool, EnclaveError> {
        Ok(std::env::var(&self.var).map(|v| !v.is_empty()).unwrap_or(false))
    }
}

// ─── Platform keyring ────────────────────────────────────────────────────────

/// Stores the master secret in the platform keyring via the `keyring` crate.
/// Dispatches to:
///   - Linux: kernel keyutils
///   - macOS: Security.framework Keychain
///   - Windows: Windows Credential Manager
pub struct KeyringSecretSource {
    service: String,
    user: String,
}

impl KeyringSecretSource {
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    /// Creates a source with custom service/user names (useful for isolating deployments).
    pub fn with_names(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, EnclaveError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| EnclaveError::Keyring(format!("failed to create keyring entry: {}", e)))
    }

    /// Return the stored secret, generating and storing a new random one on first use.
    /// Used by `cadence init`.
    pub fn get_or_create(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        let entry = self.entry()?;
        match entry.get_secret() {
            Ok(secret) => {
                tracing::debug!("Retrieved existing master secret from keyring");
                Ok(Zeroizing::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::info!("No master secret found, generating a new one");
                let secret = generate_master_secret();
                entry.set_secret(&secret).map_err(|e| {
                    EnclaveError::Keyring(format!("failed to store master secret: {}", e))
                })?;
                tracing::info!("Master secret stored in platform keyring");
                Ok(secret)
            }
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to retrieve master secret: {}",
                e
            ))),
        }
    }
}

impl Default for KeyringSecretSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterSecretSource for KeyringSecretSource {
    fn describe(&self) -> String {
        format!("platform keyring ({}/{})", self.service, self.user)
    }

    fn load(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match self.entry()?.get_secret() {
            Ok(secret) => Ok(Zeroizing::new(secret)),
            Err(keyring::Error::NoEntry) => {
                Err(EnclaveError::MasterSecretNotFound(self.describe()))
            }
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to retrieve master secret: {}",
                e
            ))),
        }
    }

    fn is_present(&self) -> Result<bool, EnclaveError> {
        match self.entry()?.get_secret() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to check master secret: {}",
                e
            ))),
        }
    }
}

// ─── Static ──────────────────────────────────────────────────────────────────

/// A master secret handed over directly by the embedding application.
pub struct StaticSecretSource {
    secret: Zeroizing<Vec<u8>>,
}

impl StaticSecretSource {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }
}

impl MasterSecretSource for StaticSecretSource {
    fn describe(&self) -> String {
        "static master secret".to_string()
    }

    fn load(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        Ok(self.secret.clone())
    }

    fn is_present(&self) -> Result<bool, EnclaveError> {
        Ok(!self.secret.is_empty())
    }
}

/// Generate a cryptographically secure random master secret.
pub fn generate_master_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; MASTER_SECRET_LEN]);
    rand::rng().fill_bytes(&mut secret);
    secret
}

// ─── Tests ───────────────────────────────────────────────────────────────────
