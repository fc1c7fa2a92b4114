// Cadence — Access Module
//
// Closed role and tier vocabularies plus the resolver that turns a caller's
// roles into knowledge tiers and capability flags.

mod policy;
mod role;

use thiserror::Error;

pub use policy::{AccessPolicyResolver, PermissionGrant};
pub use role::{Role, RoleSet, Tier};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown knowledge tier: {0}")]
    UnknownTier(String),
}
