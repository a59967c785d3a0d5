//! MCP server exposing the gateway as tools
//!
//! Tool bodies live in the handlers module; this module wires them into
//! the rmcp router and the in-process [`EmbeddableMcp`] interface.

use async_trait::async_trait;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo, Tool},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use serde_json::Value;

use crate::embed::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
use crate::gateway::Gateway;
use crate::handlers;
use crate::params::*;

/// The MSSQL MCP Server
#[derive(Clone)]
pub struct MssqlMcpServer {
    gateway: Gateway,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MssqlMcpServer {
    /// Create a server that reads `MSSQL_*` settings on every call
    pub fn new() -> Self {
        Self::with_gateway(Gateway::new())
    }

    pub fn with_gateway(gateway: Gateway) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Run arbitrary SQL against the configured SQL Server. Returns {columns, rows} for statements that produce rows, otherwise commits and returns {rows_affected}.")]
    async fn run_query(
        &self,
        Parameters(params): Parameters<RunQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::run_query(&self.gateway, params).await
    }

    #[tool(description = "List the columns of schema.table_name in ordinal order with their data type, nullability and maximum character length.")]
    async fn describe_table(
        &self,
        Parameters(params): Parameters<DescribeTableParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::describe_table(&self.gateway, params).await
    }

    #[tool(description = "Describe the indexes of schema.table_name with their ordered columns, plus the foreign keys it declares (outbound) and the foreign keys on other tables that reference it (inbound).")]
    async fn describe_indexes_and_foreign_keys(
        &self,
        Parameters(params): Parameters<DescribeTableParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::describe_indexes_and_foreign_keys(&self.gateway, params).await
    }
}

#[tool_handler]
impl rmcp::ServerHandler for MssqlMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Microsoft SQL Server gateway. Use run_query to execute SQL, \
                 describe_table for column metadata, and describe_indexes_and_foreign_keys \
                 for index and foreign key structure. Connection settings come from \
                 MSSQL_* environment variables or ~/.binks/mssql.toml."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

impl Default for MssqlMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// In-process calls
// ============================================================================

#[async_trait]
impl EmbeddableMcp for MssqlMcpServer {
    fn server_name(&self) -> &str {
        "mssql"
    }

    fn server_description(&self) -> Option<&str> {
        Some("Microsoft SQL Server query and schema metadata tools")
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddableResult<CallToolResult> {
        match name {
            "run_query" => {
                let params: RunQueryParams = serde_json::from_value(params)?;
                self.run_query(Parameters(params)).await.map_err(Into::into)
            }

            "describe_table" => {
                let params: DescribeTableParams = serde_json::from_value(params)?;
                self.describe_table(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            "describe_indexes_and_foreign_keys" => {
                let params: DescribeTableParams = serde_json::from_value(params)?;
                self.describe_indexes_and_foreign_keys(Parameters(params))
                    .await
                    .map_err(Into::into)
            }

            _ => Err(EmbeddableError::ToolNotFound(name.to_string())),
        }
    }
}
