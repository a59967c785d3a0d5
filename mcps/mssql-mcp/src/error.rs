//! Error taxonomy for the gateway
//!
//! Every failure a tool call can produce maps to exactly one variant.
//! Nothing here is retried; errors surface to the caller as-is.

use rmcp::ErrorData as McpError;
use serde_json::json;
use thiserror::Error;

/// Errors produced while resolving configuration, connecting, or running SQL
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or contradictory configuration, detected before any connect
    #[error("{0}")]
    Config(String),

    /// The selected backend's client library is not available
    #[error("{0}")]
    BackendUnavailable(String),

    /// Network or authentication failure while opening a connection
    #[error("{0}")]
    Connection(String),

    /// Failure while executing a statement, with the server's error number
    #[error("{message}")]
    Query { message: String, code: Option<i64> },
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn config(message: impl Into<String>) -> Self {
        GatewayError::Config(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        GatewayError::Query {
            message: message.into(),
            code: None,
        }
    }

    /// Stable kind label reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "ConfigError",
            GatewayError::BackendUnavailable(_) => "BackendUnavailableError",
            GatewayError::Connection(_) => "ConnectionError",
            GatewayError::Query { .. } => "QueryError",
        }
    }

    /// Backend error number, when the server reported one
    pub fn code(&self) -> Option<i64> {
        match self {
            GatewayError::Query { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<GatewayError> for McpError {
    fn from(err: GatewayError) -> Self {
        let data = json!({ "kind": err.kind(), "code": err.code() });
        McpError::internal_error(err.to_string(), Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_message_is_verbatim() {
        let err = GatewayError::config("server required");
        assert_eq!(err.to_string(), "server required");
        assert_eq!(err.kind(), "ConfigError");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_mcp_error_carries_kind_and_code() {
        let err = GatewayError::Query {
            message: "Invalid object name 'nope'.".to_string(),
            code: Some(208),
        };
        let mcp: McpError = err.into();
        assert_eq!(mcp.message, "Invalid object name 'nope'.");
        let data = mcp.data.unwrap();
        assert_eq!(data["kind"], "QueryError");
        assert_eq!(data["code"], 208);
    }
}
