//! Metadata aggregation
//!
//! Catalog queries return one flat row per (object, column). These are
//! folded into nested descriptors, keeping the catalog's ordering: objects
//! in first-seen order, columns in row order within each object.

pub mod catalog;
pub mod group;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::db::{Connection, Record};
use crate::error::{GatewayError, GatewayResult};
use crate::normalize::normalize;
use crate::types::{
    ColumnDescriptor, ColumnPair, InboundForeignKey, IndexColumnRef, IndexDescriptor,
    IndexesAndForeignKeys, OutboundForeignKey,
};

use self::group::OrderedGroups;

/// Name reported for an index the catalog returns without one (heaps)
pub const UNNAMED_INDEX: &str = "(unnamed)";

pub async fn describe_columns(
    conn: &mut Box<dyn Connection>,
    schema: &str,
    table: &str,
) -> GatewayResult<Vec<ColumnDescriptor>> {
    let sql = catalog::columns_query(conn.placeholder_style());
    let rows = fetch(conn, &sql, schema, table).await?;

    rows.iter()
        .map(|row| {
            Ok(ColumnDescriptor {
                column: text(row, "COLUMN_NAME")?,
                data_type: text(row, "DATA_TYPE")?,
                nullable: optional_text(row, "IS_NULLABLE")?.as_deref() == Some("YES"),
                length: optional_integer(row, "CHARACTER_MAXIMUM_LENGTH")?,
            })
        })
        .collect()
}

/// Indexes plus outbound and inbound foreign keys, read on one connection
///
/// The three queries run in sequence; the first failure aborts the lot.
#[instrument(skip(conn))]
pub async fn describe_indexes_and_foreign_keys(
    conn: &mut Box<dyn Connection>,
    schema: &str,
    table: &str,
) -> GatewayResult<IndexesAndForeignKeys> {
    let style = conn.placeholder_style();

    let index_rows = fetch(conn, &catalog::indexes_query(style), schema, table).await?;
    let indexes = group_indexes(&index_rows)?;

    let outbound_rows =
        fetch(conn, &catalog::outbound_foreign_keys_query(style), schema, table).await?;
    let foreign_keys_outbound = group_outbound(&outbound_rows)?;

    let inbound_rows =
        fetch(conn, &catalog::inbound_foreign_keys_query(style), schema, table).await?;
    let foreign_keys_inbound = group_inbound(&inbound_rows)?;

    debug!(
        indexes = indexes.len(),
        outbound = foreign_keys_outbound.len(),
        inbound = foreign_keys_inbound.len(),
        "aggregated keys"
    );

    Ok(IndexesAndForeignKeys {
        indexes,
        foreign_keys_outbound,
        foreign_keys_inbound,
    })
}

async fn fetch(
    conn: &mut Box<dyn Connection>,
    sql: &str,
    schema: &str,
    table: &str,
) -> GatewayResult<Vec<Record>> {
    conn.execute(sql, &[schema, table]).await?;
    Ok(normalize(conn.fetch_all()).rows)
}

struct IndexHeader {
    name: String,
    index_type: String,
    is_primary_key: bool,
    is_unique: bool,
}

fn group_indexes(rows: &[Record]) -> GatewayResult<Vec<IndexDescriptor>> {
    let mut groups = OrderedGroups::new();
    for row in rows {
        let name = optional_text(row, "index_name")?
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNNAMED_INDEX.to_string());
        let header = IndexHeader {
            name: name.clone(),
            index_type: optional_text(row, "type_desc")?.unwrap_or_default(),
            is_primary_key: flag(row, "is_primary_key")?,
            is_unique: flag(row, "is_unique")?,
        };
        let column = IndexColumnRef {
            name: text(row, "column_name")?,
            key_ordinal: optional_integer(row, "key_ordinal")?.unwrap_or(0),
            is_included: flag(row, "is_included_column")?,
        };
        groups.push(name, || header, column);
    }

    Ok(groups.into_vec(|header, columns| IndexDescriptor {
        name: header.name,
        index_type: header.index_type,
        is_primary_key: header.is_primary_key,
        is_unique: header.is_unique,
        columns,
    }))
}

fn group_outbound(rows: &[Record]) -> GatewayResult<Vec<OutboundForeignKey>> {
    let mut groups = OrderedGroups::new();
    for row in rows {
        let name = text(row, "constraint_name")?;
        let header = (
            name.clone(),
            text(row, "referenced_schema")?,
            text(row, "referenced_table")?,
        );
        let pair = ColumnPair {
            column: text(row, "column_name")?,
            references: text(row, "referenced_column")?,
        };
        groups.push(name, || header, pair);
    }

    Ok(groups.into_vec(
        |(name, target_schema, target_table), columns| OutboundForeignKey {
            name,
            target_schema,
            target_table,
            columns,
        },
    ))
}

fn group_inbound(rows: &[Record]) -> GatewayResult<Vec<InboundForeignKey>> {
    let mut groups = OrderedGroups::new();
    for row in rows {
        let name = text(row, "constraint_name")?;
        let header = (
            name.clone(),
            text(row, "referencing_schema")?,
            text(row, "referencing_table")?,
        );
        let pair = ColumnPair {
            column: text(row, "referencing_column")?,
            references: text(row, "referenced_column")?,
        };
        groups.push(name, || header, pair);
    }

    Ok(groups.into_vec(
        |(name, source_schema, source_table), columns| InboundForeignKey {
            name,
            source_schema,
            source_table,
            columns,
        },
    ))
}

// ============================================================================
// Row accessors
// ============================================================================

fn field<'r>(row: &'r Record, column: &str) -> GatewayResult<&'r Value> {
    row.get(column)
        .ok_or_else(|| GatewayError::query(format!("catalog row is missing column {}", column)))
}

fn optional_text(row: &Record, column: &str) -> GatewayResult<Option<String>> {
    match field(row, column)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Ok(Some(other.to_string())),
    }
}

fn text(row: &Record, column: &str) -> GatewayResult<String> {
    optional_text(row, column)?
        .ok_or_else(|| GatewayError::query(format!("catalog column {} is null", column)))
}

fn optional_integer(row: &Record, column: &str) -> GatewayResult<Option<i64>> {
    match field(row, column)? {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| {
            GatewayError::query(format!("catalog column {} is not an integer: {}", column, n))
        }),
        Value::String(s) => s.trim().parse().map(Some).map_err(|_| {
            GatewayError::query(format!("catalog column {} is not an integer: {}", column, s))
        }),
        other => Err(GatewayError::query(format!(
            "catalog column {} is not an integer: {}",
            column, other
        ))),
    }
}

/// SQL `bit`: bool from the native backend, 0/1 from ODBC drivers that
/// report it as a number or text
fn flag(row: &Record, column: &str) -> GatewayResult<bool> {
    match field(row, column)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_i64().map_or(false, |v| v != 0)),
        Value::String(s) => Ok(matches!(s.trim(), "1" | "true" | "True")),
        other => Err(GatewayError::query(format!(
            "catalog column {} is not a flag: {}",
            column, other
        ))),
    }
}
