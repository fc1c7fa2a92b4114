// Cadence — Configuration
//
// TOML configuration with every section defaulted, so an empty file (or no
// file at all) yields a working local setup.
//
// Lookup order: explicit `--config` path, then `$CADENCE_CONFIG`, then
// `<data_dir>/cadence.toml` when it exists, then built-in defaults. A few
// environment variables override individual fields after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::DEFAULT_REDACTED_FIELDS;
use crate::enclave::{
    EnvSecretSource, KdfParams, KeyringSecretSource, MasterSecretSource, DEFAULT_SECRET_ENV,
};
use crate::knowledge::{RetrieverSettings, DEFAULT_MODEL_CREDENTIAL, DEFAULT_SYSTEM_PROMPT};

// ─── Constants ───────────────────────────────────────────────────────────────

pub const CONFIG_ENV: &str = "CADENCE_CONFIG";
pub const DATA_DIR_ENV: &str = "CADENCE_DATA_DIR";
pub const LLM_ENDPOINT_ENV: &str = "CADENCE_LLM_ENDPOINT";
pub const LLM_MODEL_ENV: &str = "CADENCE_LLM_MODEL";

const CONFIG_FILE_NAME: &str = "cadence.toml";
const DATABASE_FILE_NAME: &str = "vault.db";
const SOCKET_FILE_NAME: &str = "cadence.sock";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    Parse { message: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub kdf: KdfConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSourceKind {
    Env,
    #[default]
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub backend: VaultBackend,

    /// SQLite file; `<data_dir>/vault.db` when unset.
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub master_secret: SecretSourceKind,

    /// Variable read when `master_secret = "env"`.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: VaultBackend::default(),
            database: None,
            master_secret: SecretSourceKind::default(),
            secret_env: default_secret_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Feeds the per-deployment salt. Changing it makes existing ciphertexts
    /// unreadable.
    #[serde(default = "default_deployment_id")]
    pub deployment_id: String,

    #[serde(flatten)]
    pub params: KdfParams,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            deployment_id: default_deployment_id(),
            params: KdfParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_retention_cap")]
    pub retention_cap: usize,

    #[serde(default = "default_redacted_fields")]
    pub redacted_fields: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_cap: default_retention_cap(),
            redacted_fields: default_redacted_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Credential name holding each owner's API key.
    #[serde(default = "default_credential_name")]
    pub credential_name: String,

    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_timeout_secs(),
            max_context_chars: default_max_context_chars(),
            credential_name: default_credential_name(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON corpus file; the built-in corpus when unset.
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
}

// ─── Defaults ────────────────────────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadence")
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

fn default_deployment_id() -> String {
    "default".to_string()
}

fn default_retention_cap() -> usize {
    crate::audit::DEFAULT_RETENTION_CAP
}

fn default_redacted_fields() -> Vec<String> {
    DEFAULT_REDACTED_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_credential_name() -> String {
    DEFAULT_MODEL_CREDENTIAL.to_string()
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            vault: VaultConfig::default(),
            kdf: KdfConfig::default(),
            audit: AuditConfig::default(),
            llm: LlmConfig::default(),
            knowledge: KnowledgeConfig::default(),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl CadenceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Resolve, load, apply environment overrides, and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// `load` with an injectable environment lookup.
    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_path = env(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from);
        let default_path = env(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir)
            .join(CONFIG_FILE_NAME);

        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config");
                Self::from_file(&path)?
            }
            None if default_path.is_file() => {
                tracing::debug!(path = %default_path.display(), "Loading config");
                Self::from_file(&default_path)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(env);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(endpoint) = env(LLM_ENDPOINT_ENV).filter(|v| !v.is_empty()) {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = env(LLM_MODEL_ENV).filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.retention_cap == 0 {
            return Err(ConfigError::Invalid(
                "audit.retention_cap must be greater than zero".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.llm.max_context_chars == 0 {
            return Err(ConfigError::Invalid(
                "llm.max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.llm.credential_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "llm.credential_name must not be empty".to_string(),
            ));
        }
        if self.kdf.deployment_id.is_empty() {
            return Err(ConfigError::Invalid(
                "kdf.deployment_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived values ──────────────────────────────────────────────────

    pub fn database_path(&self) -> PathBuf {
        self.vault
            .database
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DATABASE_FILE_NAME))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join(SOCKET_FILE_NAME)
    }

    pub fn secret_source(&self) -> Box<dyn MasterSecretSource> {
        match self.vault.master_secret {
            SecretSourceKind::Env => Box::new(EnvSecretSource::new(self.vault.secret_env.clone())),
            SecretSourceKind::Keyring => Box::new(KeyringSecretSource::new()),
        }
    }

    pub fn retriever_settings(&self) -> RetrieverSettings {
        RetrieverSettings {
            credential_name: self.llm.credential_name.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
            max_context_chars: self.llm.max_context_chars,
            system_prompt: self
                .llm
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
