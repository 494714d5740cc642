//! SQLite store backed by an sqlx pool.
//!
//! # Module Structure
//! - `connection`: connection string handling and pool creation
//! - `catalog`: table, index, view and trigger enumeration via `sqlite_master`
//! - `rows`: paged reads and typed value decoding
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db`, `sqlite://./relative.db` or a
//!   bare path ending in `.db`, `.sqlite` or `.sqlite3`
//! - In-memory: `sqlite::memory:` or `:memory:` (single connection, kept open
//!   for the life of the pool)

pub mod catalog;
pub mod connection;
pub mod rows;

#[cfg(test)]
mod tests;

use super::DumpStore;
use crate::Result;
use crate::config::StoreConfig;
use crate::error::DbFerryError;
use crate::models::{IndexDescriptor, Row, TableDescriptor, ViewDescriptor};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub use connection::validate_sqlite_connection_string;

/// SQLite implementation of [`DumpStore`].
pub struct SqliteStore {
    /// Connection pool
    pub pool: SqlitePool,
    /// Pool configuration
    pub config: StoreConfig,
    /// Original connection string (public for test access)
    pub connection_string: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("database", &self.database_name())
            .field("is_in_memory", &self.is_in_memory())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DumpStore for SqliteStore {
    fn source_name(&self) -> String {
        self.database_name()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        catalog::list_tables(&self.pool).await
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescriptor> {
        catalog::describe_table(&self.pool, table).await
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        catalog::list_indexes(&self.pool, table).await
    }

    async fn list_views(&self) -> Result<Vec<ViewDescriptor>> {
        catalog::list_views(&self.pool).await
    }

    async fn list_triggers(&self) -> Result<Vec<String>> {
        catalog::list_triggers(&self.pool).await
    }

    async fn fetch_page(
        &self,
        table: &TableDescriptor,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Row>> {
        rows::fetch_page(&self.pool, table, offset, limit).await
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        if self.config.read_only {
            return Err(DbFerryError::configuration(
                "Store is opened read-only; statements cannot be executed",
            ));
        }

        let result = sqlx::raw_sql(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| DbFerryError::query_failed("Statement execution failed", e))?;
        Ok(result.rows_affected())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        catalog::table_exists(&self.pool, table).await
    }
}
