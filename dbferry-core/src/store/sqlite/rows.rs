//! Paged row reads and value decoding.
//!
//! SQLite is dynamically typed, so values are decoded by the storage class
//! of each cell rather than by the declared column type.

use crate::Result;
use crate::codec::quote_identifier;
use crate::error::DbFerryError;
use crate::models::{Row, RowOrdering, SqlValue, TableDescriptor};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, SqlitePool, TypeInfo, ValueRef};

/// Builds the ORDER BY clause for a table's ordering.
pub fn order_by_clause(table: &TableDescriptor) -> String {
    let quoted = |columns: &[String]| {
        columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    match &table.ordering {
        RowOrdering::RowId => "ORDER BY rowid".to_string(),
        RowOrdering::PrimaryKey { columns } => format!("ORDER BY {}", quoted(columns)),
        RowOrdering::AllColumns => format!("ORDER BY {}", quoted(&table.columns)),
    }
}

/// Builds the paged SELECT for a table.
pub fn page_query(table: &TableDescriptor) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} {} LIMIT ? OFFSET ?",
        columns,
        quote_identifier(&table.name),
        order_by_clause(table)
    )
}

/// Reads one page of rows.
pub async fn fetch_page(
    pool: &SqlitePool,
    table: &TableDescriptor,
    offset: u64,
    limit: u64,
) -> Result<Vec<Row>> {
    let limit = i64::try_from(limit)
        .map_err(|_| DbFerryError::configuration("Page size exceeds i64::MAX"))?;
    let offset = i64::try_from(offset)
        .map_err(|_| DbFerryError::query("Row offset exceeds i64::MAX"))?;

    let rows = sqlx::query(&page_query(table))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            DbFerryError::query_failed(format!("Failed to read rows of table '{}'", table.name), e)
        })?;

    rows.iter()
        .map(|row| decode_row(row, table.columns.len()))
        .collect()
}

fn decode_row(row: &SqliteRow, width: usize) -> Result<Row> {
    let mut values = Vec::with_capacity(width);
    for index in 0..width {
        values.push(decode_value(row, index)?);
    }
    Ok(Row::new(values))
}

/// Decodes one cell by its storage class.
fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| DbFerryError::query_failed("Failed to read column value", e))?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(SqlValue::Integer),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(SqlValue::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(SqlValue::Blob),
        _ => row.try_get_unchecked::<String, _>(index).map(SqlValue::Text),
    };

    value.map_err(|e| {
        DbFerryError::query_failed(format!("Failed to decode {} value", storage_class), e)
    })
}
