//! Store abstraction and schema enumeration.
//!
//! The engines never talk to a database driver directly. They go through
//! [`DumpStore`], which offers exactly what a dump needs: catalog
//! enumeration, column introspection, paged reads and raw statement
//! execution.
//!
//! # Module Structure
//! - `sqlite`: sqlx-backed SQLite implementation (feature `sqlite`)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::Result;
use crate::config::{TableFilter, is_internal_name};
use crate::models::{IndexDescriptor, Row, TableDescriptor, ViewDescriptor};
use async_trait::async_trait;

/// Capabilities the export, import and clear engines require from a store.
///
/// # Ordering
/// Catalog listings are returned sorted by name and paged reads follow
/// [`TableDescriptor::ordering`], so two traversals of an unchanged store
/// visit the same objects and rows in the same order.
///
/// # Object Safety
/// This trait is object-safe; engines hold stores as `Arc<dyn DumpStore>`.
#[async_trait]
pub trait DumpStore: Send + Sync {
    /// Human-readable identifier of the store (never contains credentials).
    fn source_name(&self) -> String;

    /// Lists user table names, sorted by name.
    ///
    /// # Errors
    /// Returns `Catalog` if the catalog cannot be read.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describes one table: columns, create statement and row ordering.
    async fn describe_table(&self, table: &str) -> Result<TableDescriptor>;

    /// Lists explicit indexes attached to `table`, sorted by name.
    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>>;

    /// Lists view definitions, sorted by name.
    async fn list_views(&self) -> Result<Vec<ViewDescriptor>>;

    /// Lists trigger names, sorted by name.
    async fn list_triggers(&self) -> Result<Vec<String>>;

    /// Reads up to `limit` rows of `table` starting at `offset`, in the
    /// table's stable ordering.
    async fn fetch_page(&self, table: &TableDescriptor, offset: u64, limit: u64)
    -> Result<Vec<Row>>;

    /// Executes one statement and returns the affected-row count.
    ///
    /// The count is only meaningful for INSERT, UPDATE and DELETE.
    async fn execute(&self, statement: &str) -> Result<u64>;

    /// Returns true when a table named `table` exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;
}

/// Enumerates the tables a dump should contain.
///
/// Internal tables (by name prefix) are always excluded. A non-empty
/// whitelist selects exactly the listed tables that exist; otherwise every
/// table not on the blacklist is selected. Catalog order is preserved.
///
/// # Errors
/// Returns the store's error if the catalog cannot be enumerated.
pub async fn enumerate_tables(
    store: &dyn DumpStore,
    filter: &TableFilter,
    internal_prefixes: &[String],
) -> Result<Vec<String>> {
    let tables = store.list_tables().await?;
    let total = tables.len();

    let selected: Vec<String> = tables
        .into_iter()
        .filter(|name| !is_internal_name(name, internal_prefixes))
        .filter(|name| filter.selects(name))
        .collect();

    tracing::debug!(
        "Selected {} of {} catalog tables from {}",
        selected.len(),
        total,
        store.source_name()
    );

    for wanted in &filter.whitelist {
        if !selected.iter().any(|name| name == wanted) {
            tracing::warn!("Whitelisted table '{}' not found in catalog", wanted);
        }
    }

    Ok(selected)
}
