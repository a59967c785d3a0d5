//! Response types for MSSQL MCP tools

use serde::Serialize;

use crate::db::Record;

// ============================================================================
// Query Results
// ============================================================================

/// Rows returned by a statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularResult {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Rows keyed by column name
    pub rows: Vec<Record>,
}

/// Outcome of a statement that returned no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub rows_affected: u64,
}

/// Result of `run_query`; serializes as either shape, untagged
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Rows(TabularResult),
    Affected(WriteResult),
}

// ============================================================================
// Schema Metadata
// ============================================================================

/// One column of a table, from INFORMATION_SCHEMA.COLUMNS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    /// Maximum character length; absent for non-character types
    pub length: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexColumnRef {
    pub name: String,
    pub key_ordinal: i64,
    pub is_included: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    /// Storage type, e.g. CLUSTERED or NONCLUSTERED
    #[serde(rename = "type")]
    pub index_type: String,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub columns: Vec<IndexColumnRef>,
}

/// A local column and the column it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPair {
    pub column: String,
    pub references: String,
}

/// A foreign key on this table pointing at another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundForeignKey {
    pub name: String,
    pub target_schema: String,
    pub target_table: String,
    pub columns: Vec<ColumnPair>,
}

/// A foreign key on another table pointing at this one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundForeignKey {
    pub name: String,
    pub source_schema: String,
    pub source_table: String,
    pub columns: Vec<ColumnPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexesAndForeignKeys {
    pub indexes: Vec<IndexDescriptor>,
    pub foreign_keys_outbound: Vec<OutboundForeignKey>,
    pub foreign_keys_inbound: Vec<InboundForeignKey>,
}
