// Cadence — Enclave Module
//
// Master secret sourcing and the CipherBox: Argon2id key derivation plus
// AES-256-GCM authenticated encryption of credential values.

mod cipher;
mod error;
mod provider;

pub use cipher::{deployment_salt, CipherBox, KdfParams, SealedSecret, KEY_LEN, NONCE_LEN};
pub use error::EnclaveError;
pub use provider::{
    generate_master_secret, EnvSecretSource, KeyringSecretSource, MasterSecretSource,
    StaticSecretSource, DEFAULT_SECRET_ENV,
};
