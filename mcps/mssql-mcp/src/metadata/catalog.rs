//! Catalog queries
//!
//! Each query takes two parameters, schema then table, spelled in the
//! connection's placeholder style.

use crate::db::PlaceholderStyle;

/// One row per column, in ordinal order
pub fn columns_query(style: PlaceholderStyle) -> String {
    format!(
        "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, CHARACTER_MAXIMUM_LENGTH
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = {schema} AND TABLE_NAME = {table}
ORDER BY ORDINAL_POSITION;",
        schema = style.bind(1),
        table = style.bind(2),
    )
}

/// One row per index column, grouped by index in index_id order
pub fn indexes_query(style: PlaceholderStyle) -> String {
    format!(
        "SELECT i.name AS index_name,
       i.type_desc,
       i.is_primary_key,
       i.is_unique,
       ic.is_included_column,
       ic.key_ordinal,
       c.name AS column_name
FROM sys.indexes AS i
INNER JOIN sys.tables t ON t.object_id = i.object_id
INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
INNER JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
INNER JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
WHERE s.name = {schema} AND t.name = {table} AND i.is_hypothetical = 0
ORDER BY i.index_id, ic.index_column_id;",
        schema = style.bind(1),
        table = style.bind(2),
    )
}

const FOREIGN_KEY_JOINS: &str = "FROM sys.foreign_keys fk
INNER JOIN sys.tables pt ON pt.object_id = fk.parent_object_id
INNER JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
INNER JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
INNER JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
INNER JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
INNER JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
INNER JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id";

/// Foreign keys declared on the table, one row per column pair
pub fn outbound_foreign_keys_query(style: PlaceholderStyle) -> String {
    format!(
        "SELECT fk.name AS constraint_name,
       pc.name AS column_name,
       rs.name AS referenced_schema,
       rt.name AS referenced_table,
       rc.name AS referenced_column
{joins}
WHERE ps.name = {schema} AND pt.name = {table}
ORDER BY fk.name, fkc.constraint_column_id;",
        joins = FOREIGN_KEY_JOINS,
        schema = style.bind(1),
        table = style.bind(2),
    )
}

/// Foreign keys on other tables that reference the table
pub fn inbound_foreign_keys_query(style: PlaceholderStyle) -> String {
    format!(
        "SELECT fk.name AS constraint_name,
       ps.name AS referencing_schema,
       pt.name AS referencing_table,
       pc.name AS referencing_column,
       rc.name AS referenced_column
{joins}
WHERE rs.name = {schema} AND rt.name = {table}
ORDER BY fk.name, fkc.constraint_column_id;",
        joins = FOREIGN_KEY_JOINS,
        schema = style.bind(1),
        table = style.bind(2),
    )
}
