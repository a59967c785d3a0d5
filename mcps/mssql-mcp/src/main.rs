//! MSSQL MCP Server
//!
//! Serves the SQL Server gateway tools over stdio.

use mssql_mcp::MssqlMcpServer;
use rmcp::ServiceExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mssql_mcp::logging::init_tracing("mssql_mcp")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        odbc = mssql_mcp::db::odbc_available(),
        "Starting mssql_mcp MCP Server"
    );

    let server = MssqlMcpServer::new();
    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Server running, waiting for requests...");

    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}
