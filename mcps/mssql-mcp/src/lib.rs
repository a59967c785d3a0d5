//! MSSQL MCP Library
//!
//! Gateway to Microsoft SQL Server: run arbitrary SQL and read table
//! metadata through either a native TDS client or an ODBC driver, behind
//! one result contract.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use mssql_mcp::{EmbeddableMcp, MssqlMcpServer};
//!
//! let server = MssqlMcpServer::new();
//! let result = server
//!     .call_tool("run_query", serde_json::json!({ "sql": "SELECT @@VERSION AS v" }))
//!     .await?;
//! ```

pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod handlers;
pub mod logging;
pub mod metadata;
pub mod normalize;
pub mod params;
pub mod plan;
pub mod server;
pub mod types;

pub use config::{Settings, SettingsSource};
pub use embed::{EmbeddableError, EmbeddableMcp, EmbeddableResult};
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use server::MssqlMcpServer;

// Re-export parameter types for direct API usage
pub use params::*;
