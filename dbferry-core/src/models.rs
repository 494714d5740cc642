//! Data models shared by the export, import, upload and clone engines.
//!
//! Descriptors are transient views over the store catalog and are never
//! persisted. Result types serialize with camelCase keys so that they can be
//! returned verbatim by an HTTP caller and parsed back by the clone
//! orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed scalar value read from or written to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// Double precision float
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Boolean (stored as 0/1 by SQLite)
    Boolean(bool),
    /// Binary blob
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns true for `SqlValue::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One row of a table, values in the column order of its [`TableDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    pub values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row from its values.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }
}

/// Stable row order used when paging through a table.
///
/// Paging must visit rows in the same order on every pass, otherwise two
/// generations of the same dump could differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOrdering {
    /// SQLite's implicit rowid
    RowId,
    /// Primary key columns, for `WITHOUT ROWID` tables
    PrimaryKey {
        /// Key columns in key order
        columns: Vec<String>,
    },
    /// Every column in declaration order (no key available)
    AllColumns,
}

/// A user table as reported by the store catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Column names in declaration order
    pub columns: Vec<String>,
    /// Raw `CREATE TABLE` text from the catalog
    pub sql: String,
    /// Order used for paged reads
    pub ordering: RowOrdering,
}

/// An index attached to a user table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name
    pub name: String,
    /// Owning table
    pub table: String,
    /// Raw `CREATE INDEX` text from the catalog
    pub sql: String,
}

/// A view definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    /// View name
    pub name: String,
    /// Raw `CREATE VIEW` text from the catalog
    pub sql: String,
}

/// Progress and summary of one export run.
///
/// Exposed as side-channel metadata next to the dump body; none of it is
/// required to replay the dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    /// Selected tables that could be described and are exported, in
    /// emission order
    pub tables: Vec<String>,
    /// Tables fully processed so far
    pub tables_processed: usize,
    /// Rows written so far across all tables
    pub total_rows: u64,
    /// Per-table faults absorbed during the run
    pub warnings: Vec<String>,
    /// Set once the stream has been fully drained
    pub finished: bool,
}

impl ExportSummary {
    /// Number of absorbed per-table warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

/// A statement that failed during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementError {
    /// Truncated excerpt of the failing statement
    pub statement: String,
    /// Store error message
    pub error: String,
}

/// Accumulated outcome of one import call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// True when the stream completed and no statement failed
    pub success: bool,
    /// Statements executed successfully
    pub executed_statements: u64,
    /// Rows affected by successful mutations
    pub rows_inserted: u64,
    /// Tables that did not exist before the import and were created by it
    pub tables_created: Vec<String>,
    /// Failed statements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<StatementError>,
    /// Skipped statements and other benign notices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ImportResult {
    /// Records a successfully executed statement.
    pub fn record_executed(&mut self, rows_affected: u64) {
        self.executed_statements = self.executed_statements.saturating_add(1);
        self.rows_inserted = self.rows_inserted.saturating_add(rows_affected);
    }

    /// Records a newly created table, ignoring duplicates.
    pub fn record_table_created(&mut self, table: &str) {
        if !self.tables_created.iter().any(|t| t == table) {
            self.tables_created.push(table.to_string());
        }
    }

    /// Records a failed statement.
    pub fn record_error(&mut self, statement: String, error: impl Into<String>) {
        self.errors.push(StatementError {
            statement,
            error: error.into(),
        });
    }

    /// Records a benign notice such as a skipped statement.
    pub fn record_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Metadata stored alongside an uploaded dump.
///
/// Computed once before the first pass so that it is identical for both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Dump generation timestamp (also embedded in the dump header)
    pub generated_at: DateTime<Utc>,
    /// Identifier of the store the dump was taken from
    pub source: String,
    /// Declared content length in bytes
    pub declared_size: u64,
    /// Unique identifier of this dump
    pub dump_id: uuid::Uuid,
}

/// Everything a blob store needs before the first byte is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// Bucket or container identifier
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Exact content length
    pub content_length: u64,
    /// Pass-invariant metadata
    pub metadata: UploadMetadata,
}

/// Result of an exact-size upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// True when the sink accepted exactly the declared number of bytes
    pub success: bool,
    /// Object key
    pub key: String,
    /// Measured size in bytes
    pub size: u64,
    /// Export warnings and the failure reason, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Metadata written next to the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UploadMetadata>,
}

/// Result of a clear operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResult {
    /// True when every table was cleared
    pub success: bool,
    /// Tables dropped or emptied
    pub tables_cleared: Vec<String>,
    /// Per-object failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Clear results gathered by a clone run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneClearResults {
    /// Destination clear issued before import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ClearResult>,
    /// Source clear issued after export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ClearResult>,
}

/// Outcome of a clone run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneReport {
    /// Exactly the destination import's success flag, or false on transport failure
    pub success: bool,
    /// The destination's import result, when the import round-trip completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_result: Option<ImportResult>,
    /// Clear results, when any clear was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_results: Option<CloneClearResults>,
    /// Failure message for a transport-level abort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Downgraded failures, such as a failed source clear
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_result_serializes_camel_case() {
        let mut result = ImportResult::default();
        result.record_executed(3);
        result.record_table_created("users");
        result.success = true;

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["executedStatements"], 3);
        assert_eq!(json["rowsInserted"], 3);
        assert_eq!(json["tablesCreated"][0], "users");
        assert!(json.get("errors").is_none());
        assert!(json.get("warnings").is_none());
    }

    #[test]
    fn test_import_result_parses_without_optional_lists() {
        let json = r#"{"success":true,"executedStatements":2,"rowsInserted":5,"tablesCreated":[]}"#;
        let result: ImportResult = serde_json::from_str(json).unwrap();
        assert!(result.success);
        assert_eq!(result.rows_inserted, 5);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_record_table_created_deduplicates() {
        let mut result = ImportResult::default();
        result.record_table_created("a");
        result.record_table_created("a");
        result.record_table_created("b");
        assert_eq!(result.tables_created, vec!["a", "b"]);
    }

    #[test]
    fn test_sql_value_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Integer(0).is_null());
    }
}
