// Cadence — Gateway Module
//
// Unix Domain Socket (UDS) server for local services. Provides JSON-RPC 2.0
// over an owner-only Unix socket.

mod protocol;
mod uds;

pub use protocol::{
    error_code, JsonRpcError, JsonRpcRequest, JsonRpcResponse, DECRYPTION_FAILED, NOT_FOUND,
    UPSTREAM_FAILED,
};
pub use uds::UdsServer;
