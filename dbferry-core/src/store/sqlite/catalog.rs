//! Catalog enumeration through `sqlite_master` and `PRAGMA table_info`.
//!
//! Every listing is ordered by name so repeated traversals agree.

use crate::Result;
use crate::codec::quote_identifier;
use crate::error::DbFerryError;
use crate::models::{IndexDescriptor, RowOrdering, TableDescriptor, ViewDescriptor};
use sqlx::{Row, SqlitePool};

/// Lists user tables (SQLite's own `sqlite_*` tables excluded).
pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| DbFerryError::catalog_failed("Failed to enumerate tables", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|e| DbFerryError::catalog_failed("Failed to read table name", e))
        })
        .collect()
}

/// Describes a table from `sqlite_master` and `PRAGMA table_info`.
///
/// # Errors
/// Returns `Query` if the table does not exist or has no readable columns.
pub async fn describe_table(pool: &SqlitePool, table: &str) -> Result<TableDescriptor> {
    let sql: Option<String> =
        sqlx::query_scalar("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                DbFerryError::query_failed(
                    format!("Failed to read definition of table '{}'", table),
                    e,
                )
            })?
            .flatten();
    let sql = sql.ok_or_else(|| {
        DbFerryError::query(format!("Table '{}' has no definition in the catalog", table))
    })?;

    let pragma = format!("PRAGMA table_info({})", quote_identifier(table));
    let rows = sqlx::query(&pragma).fetch_all(pool).await.map_err(|e| {
        DbFerryError::query_failed(format!("Failed to read columns of table '{}'", table), e)
    })?;

    let mut columns = Vec::with_capacity(rows.len());
    let mut pk_columns: Vec<(i64, String)> = Vec::new();
    for row in &rows {
        let name: String = row.try_get("name").map_err(|e| {
            DbFerryError::query_failed(format!("Invalid column metadata for '{}'", table), e)
        })?;
        let pk: i64 = row.try_get("pk").unwrap_or(0);
        if pk > 0 {
            pk_columns.push((pk, name.clone()));
        }
        columns.push(name);
    }

    if columns.is_empty() {
        return Err(DbFerryError::query(format!(
            "Table '{}' reported no columns",
            table
        )));
    }

    let ordering = detect_ordering(pool, table, pk_columns).await;
    tracing::debug!("Table '{}' uses {:?} ordering", table, ordering);

    Ok(TableDescriptor {
        name: table.to_string(),
        columns,
        sql,
        ordering,
    })
}

/// Picks a stable ordering: rowid, then primary key, then all columns.
async fn detect_ordering(
    pool: &SqlitePool,
    table: &str,
    mut pk_columns: Vec<(i64, String)>,
) -> RowOrdering {
    // Fails to prepare for WITHOUT ROWID tables
    let probe = format!("SELECT rowid FROM {} LIMIT 0", quote_identifier(table));
    if sqlx::query(&probe).fetch_optional(pool).await.is_ok() {
        return RowOrdering::RowId;
    }

    if !pk_columns.is_empty() {
        pk_columns.sort_by_key(|(position, _)| *position);
        return RowOrdering::PrimaryKey {
            columns: pk_columns.into_iter().map(|(_, name)| name).collect(),
        };
    }

    RowOrdering::AllColumns
}

/// Lists explicit indexes of `table`. Automatic indexes have no SQL and are skipped.
pub async fn list_indexes(pool: &SqlitePool, table: &str) -> Result<Vec<IndexDescriptor>> {
    let rows = sqlx::query(
        "SELECT name, tbl_name, sql FROM sqlite_master \
         WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL \
         ORDER BY name",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        DbFerryError::query_failed(format!("Failed to list indexes of table '{}'", table), e)
    })?;

    let mut indexes = Vec::with_capacity(rows.len());
    for row in &rows {
        indexes.push(IndexDescriptor {
            name: row.try_get("name").map_err(index_column_error)?,
            table: row.try_get("tbl_name").map_err(index_column_error)?,
            sql: row.try_get("sql").map_err(index_column_error)?,
        });
    }
    Ok(indexes)
}

fn index_column_error(e: sqlx::Error) -> DbFerryError {
    DbFerryError::query_failed("Invalid index metadata", e)
}

/// Lists view definitions.
pub async fn list_views(pool: &SqlitePool) -> Result<Vec<ViewDescriptor>> {
    let rows = sqlx::query(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'view' AND sql IS NOT NULL \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| DbFerryError::catalog_failed("Failed to enumerate views", e))?;

    let mut views = Vec::with_capacity(rows.len());
    for row in &rows {
        views.push(ViewDescriptor {
            name: row
                .try_get("name")
                .map_err(|e| DbFerryError::catalog_failed("Invalid view metadata", e))?,
            sql: row
                .try_get("sql")
                .map_err(|e| DbFerryError::catalog_failed("Invalid view metadata", e))?,
        });
    }
    Ok(views)
}

/// Lists trigger names.
pub async fn list_triggers(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'trigger' ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(|e| DbFerryError::catalog_failed("Failed to enumerate triggers", e))
}

/// Returns true when a table named `table` exists.
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                DbFerryError::query_failed(format!("Failed to look up table '{}'", table), e)
            })?;
    Ok(count > 0)
}
