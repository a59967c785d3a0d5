//! Tool handlers
//!
//! Each handler runs one gateway operation and renders the outcome as
//! pretty-printed JSON text content.

use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use serde::Serialize;
use tracing::warn;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::params::*;

/// Serialize `data` as the tool's single text result
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn tool_error(tool: &str, err: GatewayError) -> McpError {
    warn!(tool, kind = err.kind(), code = ?err.code(), error = %err, "tool call failed");
    err.into()
}

pub async fn run_query(
    gateway: &Gateway,
    params: RunQueryParams,
) -> Result<CallToolResult, McpError> {
    let outcome = gateway
        .run_query(&params.sql)
        .await
        .map_err(|e| tool_error("run_query", e))?;
    json_success(&outcome)
}

pub async fn describe_table(
    gateway: &Gateway,
    params: DescribeTableParams,
) -> Result<CallToolResult, McpError> {
    let columns = gateway
        .describe_table(&params.schema, &params.table_name)
        .await
        .map_err(|e| tool_error("describe_table", e))?;
    json_success(&columns)
}

pub async fn describe_indexes_and_foreign_keys(
    gateway: &Gateway,
    params: DescribeTableParams,
) -> Result<CallToolResult, McpError> {
    let keys = gateway
        .describe_indexes_and_foreign_keys(&params.schema, &params.table_name)
        .await
        .map_err(|e| tool_error("describe_indexes_and_foreign_keys", e))?;
    json_success(&keys)
}
