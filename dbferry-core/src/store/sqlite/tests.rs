//! Unit tests for the SQLite store.
//!
//! These tests verify:
//! - Catalog listing order and internal-table exclusion
//! - Row ordering detection for rowid and WITHOUT ROWID tables
//! - Storage-class based value decoding
//! - Statement execution and read-only enforcement

use super::SqliteStore;
use super::rows::{order_by_clause, page_query};
use crate::config::{StoreConfig, TableFilter, default_internal_prefixes};
use crate::models::{RowOrdering, SqlValue, TableDescriptor};
use crate::store::{DumpStore, enumerate_tables};

async fn memory_store() -> SqliteStore {
    SqliteStore::new(":memory:").await.unwrap()
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[tokio::test]
async fn test_list_tables_sorted_and_filtered() {
    let store = memory_store().await;
    store
        .execute("CREATE TABLE zebra (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)")
        .await
        .unwrap();
    store.execute("CREATE TABLE apple (id INTEGER)").await.unwrap();
    store.execute("CREATE TABLE _cf_meta (k TEXT)").await.unwrap();
    store
        .execute("INSERT INTO zebra (v) VALUES ('x')")
        .await
        .unwrap();

    // sqlite_sequence exists now but is never listed
    let tables = store.list_tables().await.unwrap();
    assert_eq!(tables, vec!["_cf_meta", "apple", "zebra"]);

    let selected = enumerate_tables(&store, &TableFilter::default(), &default_internal_prefixes())
        .await
        .unwrap();
    assert_eq!(selected, vec!["apple", "zebra"]);
}

#[tokio::test]
async fn test_enumerate_tables_whitelist_wins() {
    let store = memory_store().await;
    for table in ["a", "b", "c"] {
        store
            .execute(&format!("CREATE TABLE {} (id INTEGER)", table))
            .await
            .unwrap();
    }

    let filter = TableFilter {
        whitelist: vec!["b".to_string(), "missing".to_string()],
        blacklist: vec!["b".to_string(), "c".to_string()],
    };
    let selected = enumerate_tables(&store, &filter, &default_internal_prefixes())
        .await
        .unwrap();
    assert_eq!(selected, vec!["b"]);

    let filter = TableFilter {
        whitelist: Vec::new(),
        blacklist: vec!["b".to_string()],
    };
    let selected = enumerate_tables(&store, &filter, &default_internal_prefixes())
        .await
        .unwrap();
    assert_eq!(selected, vec!["a", "c"]);
}

#[tokio::test]
async fn test_describe_table_rowid_ordering() {
    let store = memory_store().await;
    store
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT)")
        .await
        .unwrap();

    let table = store.describe_table("users").await.unwrap();
    assert_eq!(table.columns, vec!["id", "name", "email"]);
    assert!(table.sql.starts_with("CREATE TABLE users"));
    assert_eq!(table.ordering, RowOrdering::RowId);
}

#[tokio::test]
async fn test_describe_table_without_rowid_uses_primary_key() {
    let store = memory_store().await;
    store
        .execute("CREATE TABLE kv (b TEXT, a TEXT, v BLOB, PRIMARY KEY (a, b)) WITHOUT ROWID")
        .await
        .unwrap();

    let table = store.describe_table("kv").await.unwrap();
    assert_eq!(
        table.ordering,
        RowOrdering::PrimaryKey {
            columns: vec!["a".to_string(), "b".to_string()]
        }
    );
}

#[tokio::test]
async fn test_describe_missing_table_fails() {
    let store = memory_store().await;
    assert!(store.describe_table("nope").await.is_err());
    assert!(!store.table_exists("nope").await.unwrap());
}

#[tokio::test]
async fn test_list_indexes_skips_automatic_indexes() {
    let store = memory_store().await;
    store
        .execute("CREATE TABLE t (id INTEGER, code TEXT UNIQUE)")
        .await
        .unwrap();
    store
        .execute("CREATE INDEX idx_t_id ON t (id)")
        .await
        .unwrap();

    let indexes = store.list_indexes("t").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "idx_t_id");
    assert_eq!(indexes[0].table, "t");
}

#[tokio::test]
async fn test_list_views_and_triggers() {
    let store = memory_store().await;
    store.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
    store
        .execute("CREATE VIEW v_ids AS SELECT id FROM t")
        .await
        .unwrap();
    store
        .execute("CREATE TRIGGER trg AFTER INSERT ON t BEGIN SELECT 1; END")
        .await
        .unwrap();

    let views = store.list_views().await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].name, "v_ids");
    assert_eq!(store.list_triggers().await.unwrap(), vec!["trg"]);
}

// =============================================================================
// Row Tests
// =============================================================================

#[test]
fn test_order_by_clause() {
    let mut table = TableDescriptor {
        name: "t".to_string(),
        columns: vec!["a".to_string(), "b\"c".to_string()],
        sql: String::new(),
        ordering: RowOrdering::RowId,
    };
    assert_eq!(order_by_clause(&table), "ORDER BY rowid");

    table.ordering = RowOrdering::AllColumns;
    assert_eq!(order_by_clause(&table), "ORDER BY \"a\", \"b\"\"c\"");

    table.ordering = RowOrdering::PrimaryKey {
        columns: vec!["a".to_string()],
    };
    assert_eq!(
        page_query(&table),
        "SELECT \"a\", \"b\"\"c\" FROM \"t\" ORDER BY \"a\" LIMIT ? OFFSET ?"
    );
}

#[tokio::test]
async fn test_fetch_page_decodes_storage_classes() {
    let store = memory_store().await;
    store
        .execute("CREATE TABLE mixed (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT)")
        .await
        .unwrap();
    store
        .execute("INSERT INTO mixed VALUES (42, 1.5, 'it''s', X'00FF', NULL)")
        .await
        .unwrap();

    let table = store.describe_table("mixed").await.unwrap();
    let rows = store.fetch_page(&table, 0, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].values,
        vec![
            SqlValue::Integer(42),
            SqlValue::Float(1.5),
            SqlValue::Text("it's".to_string()),
            SqlValue::Blob(vec![0x00, 0xFF]),
            SqlValue::Null,
        ]
    );
}

#[tokio::test]
async fn test_fetch_page_offsets_are_stable() {
    let store = memory_store().await;
    store.execute("CREATE TABLE seq (n INTEGER)").await.unwrap();
    store
        .execute("INSERT INTO seq VALUES (5), (4), (3), (2), (1)")
        .await
        .unwrap();

    let table = store.describe_table("seq").await.unwrap();
    let first = store.fetch_page(&table, 0, 2).await.unwrap();
    let second = store.fetch_page(&table, 2, 2).await.unwrap();
    let third = store.fetch_page(&table, 4, 2).await.unwrap();
    let empty = store.fetch_page(&table, 6, 2).await.unwrap();

    assert_eq!(first[0].values, vec![SqlValue::Integer(5)]);
    assert_eq!(second[1].values, vec![SqlValue::Integer(2)]);
    assert_eq!(third.len(), 1);
    assert!(empty.is_empty());
}

// =============================================================================
// Execution Tests
// =============================================================================

#[tokio::test]
async fn test_execute_reports_rows_affected() {
    let store = memory_store().await;
    store.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
    let inserted = store
        .execute("INSERT INTO t VALUES (1), (2), (3)")
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let deleted = store.execute("DELETE FROM t WHERE id > 1").await.unwrap();
    assert_eq!(deleted, 2);

    assert!(store.execute("INSERT INTO nope VALUES (1)").await.is_err());
}

#[tokio::test]
async fn test_read_only_store_rejects_statements() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.db");
    let path = path.to_string_lossy().to_string();

    let writable = SqliteStore::new(&path).await.unwrap();
    writable.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
    writable.close().await;

    let store = SqliteStore::with_config(&path, StoreConfig::new().with_read_only(true))
        .await
        .unwrap();
    assert!(store.execute("INSERT INTO t VALUES (1)").await.is_err());
    assert_eq!(store.list_tables().await.unwrap(), vec!["t"]);
    assert_eq!(store.source_name(), "ro.db");
}

#[tokio::test]
async fn test_store_debug_omits_connection_string() {
    let store = memory_store().await;
    let debug = format!("{:?}", store);
    assert!(debug.contains("SqliteStore"));
    assert!(debug.contains(":memory:"));
    assert!(store.is_in_memory());
    assert!(store.is_healthy().await);
}
