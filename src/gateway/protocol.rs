// Cadence — JSON-RPC 2.0 Protocol Types
//
// Minimal JSON-RPC 2.0 implementation for the UDS gateway, plus the mapping
// from Cadence errors to application error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CadenceError;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes
pub const NOT_FOUND: i32 = -32004;
pub const DECRYPTION_FAILED: i32 = -32005;
pub const UPSTREAM_FAILED: i32 = -32006;

/// JSON-RPC code for a Cadence error.
pub fn error_code(err: &CadenceError) -> i32 {
    if err.is_validation() {
        INVALID_PARAMS
    } else if err.is_not_found() {
        NOT_FOUND
    } else if err.is_decryption_failure() {
        DECRYPTION_FAILED
    } else if err.is_retriable() {
        UPSTREAM_FAILED
    } else {
        INTERNAL_ERROR
    }
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Error response for a failed gateway operation. The `data` member tells
    /// clients whether a retry can help.
    pub fn from_error(id: Value, err: &CadenceError) -> Self {
        let mut resp = Self::error(id, error_code(err), err.to_string());
        if let Some(error) = resp.error.as_mut() {
            error.data = Some(serde_json::json!({ "retriable": err.is_retriable() }));
        }
        resp
    }

    /// Create a parse error response (id is null because we couldn't parse it).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }
}

impl JsonRpcRequest {
    /// Validate that this is a proper JSON-RPC 2.0 request.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"".to_string());
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::EnclaveError;
    use crate::knowledge::UpstreamError;
    use crate::store::StoreError;

    #[test]
    fn test_parse_valid_request() {
        let json = r#"{"jsonrpc":"2.0","method":"vault.list","params":{"owner":"u1"},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "vault.list");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_parse_request_without_params() {
        let json = r#"{"jsonrpc":"2.0","method":"vault.list","id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_invalid_jsonrpc_version() {
        let json = r#"{"jsonrpc":"1.0","method":"vault.list","params":{},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_success_response_serialization() {
        let resp = JsonRpcResponse::success(Value::Number(1.into()), serde_json::json!({"count": 5}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let resp = JsonRpcResponse::parse_error("bad json");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32700"));
    }

    #[test]
    fn test_error_code_mapping() {
        let validation = CadenceError::from(StoreError::Validation("bad".into()));
        let not_found = CadenceError::from(StoreError::NotFound {
            owner: "u1".into(),
            name: "x".into(),
        });
        let tampered = CadenceError::from(StoreError::Crypto(EnclaveError::Decryption(
            "tag".into(),
        )));
        let upstream = CadenceError::from(UpstreamError::Http("refused".into()));
        let io = CadenceError::from(std::io::Error::other("disk"));

        assert_eq!(error_code(&validation), INVALID_PARAMS);
        assert_eq!(error_code(&not_found), NOT_FOUND);
        assert_eq!(error_code(&tampered), DECRYPTION_FAILED);
        assert_eq!(error_code(&upstream), UPSTREAM_FAILED);
        assert_eq!(error_code(&io), INTERNAL_ERROR);
    }

    #[test]
    fn test_from_error_flags_retriable() {
        let upstream = CadenceError::from(UpstreamError::Http("refused".into()));
        let resp = JsonRpcResponse::from_error(Value::from(3), &upstream);
        let error = resp.error.unwrap();
        assert_eq!(error.code, UPSTREAM_FAILED);
        assert_eq!(error.data.unwrap()["retriable"], true);
    }
}
