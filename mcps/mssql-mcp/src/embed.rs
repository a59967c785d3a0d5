//! In-process tool calls
//!
//! [`EmbeddableMcp`] lets a host call the server's tools directly, without
//! a stdio transport in between.

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use rmcp::ErrorData as McpError;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddableError {
    /// No tool with this name
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments did not deserialize into the tool's parameters
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// The tool ran and failed; `data` carries the error kind and code
    #[error("{}", .0.message)]
    Tool(McpError),
}

impl From<McpError> for EmbeddableError {
    fn from(err: McpError) -> Self {
        EmbeddableError::Tool(err)
    }
}

impl EmbeddableError {
    /// Gateway error kind reported by a failed tool, e.g. `QueryError`
    pub fn kind(&self) -> Option<&str> {
        match self {
            EmbeddableError::Tool(err) => err.data.as_ref()?.get("kind")?.as_str(),
            _ => None,
        }
    }
}

pub type EmbeddableResult<T> = Result<T, EmbeddableError>;

#[async_trait]
pub trait EmbeddableMcp: Send + Sync {
    fn server_name(&self) -> &str;

    fn list_tools(&self) -> Vec<Tool>;

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult>;

    fn server_description(&self) -> Option<&str> {
        None
    }
}
