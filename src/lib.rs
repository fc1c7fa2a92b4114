// Cadence — Library root
//
// Credential vault, usage audit log, role-based access policy and knowledge
// retrieval, fronted by a `Gateway` service and exposed over CLI, MCP and UDS.

pub mod access;
pub mod audit;
pub mod cli;
pub mod config;
pub mod enclave;
pub mod error;
pub mod gateway;
pub mod knowledge;
pub mod mcp;
pub mod service;
pub mod store;

pub use config::CadenceConfig;
pub use error::{CadenceError, Result};
pub use service::{Caller, Gateway};
