//! Parameter types for MSSQL MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunQueryParams {
    #[schemars(description = "SQL to execute verbatim. Statements that return rows yield columns and rows; anything else is committed and yields rows_affected")]
    pub sql: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DescribeTableParams {
    #[schemars(description = "Schema name, e.g. dbo")]
    pub schema: String,

    #[schemars(description = "Table name within the schema")]
    pub table_name: String,
}
