//! Shared helpers for dbferry-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::TryStreamExt;

use dbferry_core::{
    DbFerryError, DumpStore, ExportConfig, Result, SqliteStore, export::export,
    models::{IndexDescriptor, Row, SqlValue, TableDescriptor, ViewDescriptor},
};

/// Opens a fresh in-memory store.
pub async fn memory_store() -> SqliteStore {
    SqliteStore::new(":memory:")
        .await
        .expect("in-memory store should open")
}

/// Executes each statement, panicking on failure.
pub async fn run_all(store: &dyn DumpStore, statements: &[&str]) {
    for statement in statements {
        store
            .execute(statement)
            .await
            .unwrap_or_else(|e| panic!("setup statement failed: {statement}: {e}"));
    }
}

/// Store with two tables covering every scalar type, an index and a view.
pub async fn seeded_store() -> SqliteStore {
    let store = memory_store().await;
    run_all(
        &store,
        &[
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL, active BOOLEAN, avatar BLOB)",
            "CREATE INDEX idx_users_name ON users (name)",
            "CREATE TABLE notes (user_id INTEGER, body TEXT)",
            "CREATE VIEW active_users AS SELECT id, name FROM users WHERE active = 1",
            "INSERT INTO users VALUES (1, 'Ada', 9.5, 1, X'DEADBEEF')",
            "INSERT INTO users VALUES (2, 'O''Brien', -0.25, 0, NULL)",
            "INSERT INTO users VALUES (3, 'Zoë; \"quoted\" -- not a comment', NULL, NULL, X'')",
            "INSERT INTO notes VALUES (1, 'line one\nline two')",
            "INSERT INTO notes VALUES (2, NULL)",
            "INSERT INTO notes VALUES (NULL, '/* not a comment */ ;;')",
        ],
    )
    .await;
    store
}

/// Drains a full export into a string.
pub async fn dump_text(store: Arc<dyn DumpStore>, config: ExportConfig) -> Result<String> {
    let chunks: Vec<bytes::Bytes> = export(store, config)?.try_collect().await?;
    let bytes: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    String::from_utf8(bytes).map_err(|e| DbFerryError::query(e.to_string()))
}

/// Reads every row of `table`, sorted by their literal form.
pub async fn all_rows(store: &dyn DumpStore, table: &str) -> Vec<Vec<SqlValue>> {
    let descriptor = store
        .describe_table(table)
        .await
        .expect("table should exist");
    let mut rows: Vec<Vec<SqlValue>> = store
        .fetch_page(&descriptor, 0, 1_000_000)
        .await
        .expect("rows should be readable")
        .into_iter()
        .map(|row| row.values)
        .collect();
    rows.sort_by_key(|values| dbferry_core::codec::encode_tuple(values));
    rows
}

/// Wraps a store and injects faults.
pub struct FaultyStore {
    pub inner: SqliteStore,
    /// Make `list_tables` fail
    pub fail_catalog: bool,
    /// Make `describe_table` fail for this table
    pub fail_describe_for: Option<String>,
    /// Make `fetch_page` fail for this table
    pub fail_rows_for: Option<String>,
    /// Make `table_exists` fail
    pub fail_exists: bool,
    /// Rewrite every text value to a string whose length grows per call
    pub drifting: bool,
    pub page_calls: AtomicU64,
}

impl FaultyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_catalog: false,
            fail_describe_for: None,
            fail_rows_for: None,
            fail_exists: false,
            drifting: false,
            page_calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl DumpStore for FaultyStore {
    fn source_name(&self) -> String {
        "faulty".to_string()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        if self.fail_catalog {
            return Err(DbFerryError::catalog_failed(
                "Failed to enumerate tables",
                std::io::Error::other("catalog unavailable"),
            ));
        }
        self.inner.list_tables().await
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescriptor> {
        if self.fail_describe_for.as_deref() == Some(table) {
            return Err(DbFerryError::query("no such table"));
        }
        self.inner.describe_table(table).await
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        self.inner.list_indexes(table).await
    }

    async fn list_views(&self) -> Result<Vec<ViewDescriptor>> {
        self.inner.list_views().await
    }

    async fn list_triggers(&self) -> Result<Vec<String>> {
        self.inner.list_triggers().await
    }

    async fn fetch_page(
        &self,
        table: &TableDescriptor,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Row>> {
        if self.fail_rows_for.as_deref() == Some(table.name.as_str()) {
            return Err(DbFerryError::query("disk I/O error"));
        }
        let call = self.page_calls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        let mut rows = self.inner.fetch_page(table, offset, limit).await?;
        if self.drifting {
            for row in &mut rows {
                for value in &mut row.values {
                    if let SqlValue::Text(text) = value {
                        *text = "x".repeat(call as usize);
                    }
                }
            }
        }
        Ok(rows)
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        self.inner.execute(statement).await
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        if self.fail_exists {
            return Err(DbFerryError::query("catalog locked"));
        }
        self.inner.table_exists(table).await
    }
}
