//! Export engine.
//!
//! [`export`] returns an [`ExportStream`], a lazy sequence of byte chunks
//! whose concatenation is a replayable SQL dump:
//!
//! 1. header comment carrying `generated_at`
//! 2. idempotent `CREATE TABLE IF NOT EXISTS` for every selected table,
//!    each followed by its `CREATE INDEX IF NOT EXISTS` statements
//! 3. `CREATE VIEW IF NOT EXISTS` for every view
//! 4. batched multi-row INSERT statements, table by table
//! 5. trailing summary comment
//!
//! Every chunk holds whole lines, so nothing is buffered beyond the INSERT
//! batch being assembled. Failures on a single table become warnings and
//! the remaining tables are still exported. Only a failure to enumerate the
//! catalog ends the stream with an error.

use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use regex::Regex;
use tokio::sync::watch;

use crate::Result;
use crate::codec::{encode_tuple, quote_identifier};
use crate::config::{ConflictPolicy, ExportConfig};
use crate::models::{ExportSummary, IndexDescriptor, TableDescriptor};
use crate::store::{DumpStore, enumerate_tables};

/// Header line that starts every dump.
pub const DUMP_HEADER: &str = "-- dbferry SQL dump";

/// Lazy stream of dump chunks plus a live progress handle.
///
/// The stream is finite and not restartable; call [`export`] again for a
/// fresh traversal.
pub struct ExportStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
    progress: watch::Receiver<ExportSummary>,
}

impl std::fmt::Debug for ExportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportStream")
            .field("progress", &*self.progress.borrow())
            .finish_non_exhaustive()
    }
}

impl ExportStream {
    /// Snapshot of the run so far: selected tables, rows written, warnings.
    ///
    /// This is side-channel metadata; none of it is part of the dump body.
    pub fn progress(&self) -> ExportSummary {
        self.progress.borrow().clone()
    }

    /// Receiver that observes every progress update.
    pub fn subscribe(&self) -> watch::Receiver<ExportSummary> {
        self.progress.clone()
    }
}

impl Stream for ExportStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Starts an export of `store`.
///
/// Nothing is read from the store until the stream is polled.
///
/// # Errors
/// Returns a configuration error if `config` fails validation.
pub fn export(store: Arc<dyn DumpStore>, config: ExportConfig) -> Result<ExportStream> {
    config.validate()?;
    let (sender, progress) = watch::channel(ExportSummary::default());
    Ok(ExportStream {
        inner: Box::pin(generate(store, config, sender)),
        progress,
    })
}

fn generate(
    store: Arc<dyn DumpStore>,
    config: ExportConfig,
    progress: watch::Sender<ExportSummary>,
) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    try_stream! {
        let mut summary = ExportSummary::default();
        tracing::info!("Starting export of {}", store.source_name());

        yield Bytes::from(header(&config));

        let tables = match enumerate_tables(store.as_ref(), &config.filter, &config.internal_prefixes).await {
            Ok(tables) => tables,
            Err(e) => {
                tracing::error!("Catalog enumeration failed: {}", e);
                Err(e)?
            }
        };
        let mut descriptors: Vec<TableDescriptor> = Vec::with_capacity(tables.len());
        for name in &tables {
            match store.describe_table(name).await {
                Ok(table) => {
                    summary.tables.push(table.name.clone());
                    descriptors.push(table);
                }
                Err(e) => record_warning(&mut summary, format!("Skipping table '{}': {}", name, e.to_report_string())),
            }
        }
        progress.send_replace(summary.clone());

        if config.include_schema {
            for table in &descriptors {
                yield Bytes::from(table_schema(table, config.drop_existing));
                match store.list_indexes(&table.name).await {
                    Ok(indexes) => {
                        if !indexes.is_empty() {
                            yield Bytes::from(index_schema(&indexes));
                        }
                    }
                    Err(e) => record_warning(
                        &mut summary,
                        format!("Failed to export indexes of '{}': {}", table.name, e.to_report_string()),
                    ),
                }
            }

            if config.include_views {
                match store.list_views().await {
                    Ok(views) => {
                        for view in views.iter().filter(|v| !crate::config::is_internal_name(&v.name, &config.internal_prefixes)) {
                            yield Bytes::from(format!("{}\n", idempotent_create(&view.sql)));
                        }
                    }
                    Err(e) => record_warning(&mut summary, format!("Failed to export views: {}", e.to_report_string())),
                }
            }
            progress.send_replace(summary.clone());
        }

        for table in &descriptors {
            if config.include_data {
                let mut batcher = InsertBatcher::new(
                    config.conflict_policy,
                    table,
                    config.max_rows_per_statement,
                    config.max_statement_bytes,
                );
                let mut offset: u64 = 0;
                let mut table_rows: u64 = 0;

                loop {
                    let page = match store.fetch_page(table, offset, config.page_size).await {
                        Ok(page) => page,
                        Err(e) => {
                            record_warning(
                                &mut summary,
                                format!("Data export of '{}' stopped after {} rows: {}", table.name, table_rows, e.to_report_string()),
                            );
                            break;
                        }
                    };
                    let fetched = page.len() as u64;

                    for row in page {
                        let tuple = encode_tuple(&row.values);
                        for statement in batcher.push(tuple) {
                            if statement.oversize {
                                record_warning(&mut summary, oversize_warning(&table.name, &statement, config.max_statement_bytes));
                            }
                            table_rows = table_rows.saturating_add(statement.rows as u64);
                            summary.total_rows = summary.total_rows.saturating_add(statement.rows as u64);
                            yield Bytes::from(statement.text);
                        }
                    }
                    progress.send_replace(summary.clone());

                    if fetched < config.page_size {
                        break;
                    }
                    offset = offset.saturating_add(fetched);
                }

                if let Some(statement) = batcher.finish() {
                    if statement.oversize {
                        record_warning(&mut summary, oversize_warning(&table.name, &statement, config.max_statement_bytes));
                    }
                    table_rows = table_rows.saturating_add(statement.rows as u64);
                    summary.total_rows = summary.total_rows.saturating_add(statement.rows as u64);
                    yield Bytes::from(statement.text);
                }
                tracing::debug!("Exported {} rows from '{}'", table_rows, table.name);
            }

            summary.tables_processed = summary.tables_processed.saturating_add(1);
            progress.send_replace(summary.clone());
        }

        yield Bytes::from(trailer(&summary));
        summary.finished = true;
        tracing::info!(
            "Export finished: {} tables, {} rows, {} warnings",
            summary.tables.len(),
            summary.total_rows,
            summary.warning_count()
        );
        progress.send_replace(summary);
    }
}

fn record_warning(summary: &mut ExportSummary, warning: String) {
    tracing::warn!("{}", warning);
    summary.warnings.push(warning);
}

fn oversize_warning(table: &str, statement: &InsertStatement, ceiling: usize) -> String {
    format!(
        "A row of '{}' needs a {}-byte statement, above the {}-byte ceiling",
        table,
        statement.len(),
        ceiling
    )
}

fn header(config: &ExportConfig) -> String {
    format!(
        "{}\n-- Generated at: {}\n\n",
        DUMP_HEADER,
        config.generated_at.to_rfc3339()
    )
}

fn trailer(summary: &ExportSummary) -> String {
    format!(
        "\n-- Export complete: {} tables, {} rows, {} warnings\n",
        summary.tables.len(),
        summary.total_rows,
        summary.warning_count()
    )
}

fn create_regex() -> &'static Regex {
    static CREATE: OnceLock<Regex> = OnceLock::new();
    CREATE.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*CREATE\s+(?:TEMP\s+|TEMPORARY\s+)?(UNIQUE\s+)?(TABLE|INDEX|VIEW|TRIGGER)\s+(?:IF\s+NOT\s+EXISTS\s+)?",
        )
        .expect("Valid regex for CREATE statements")
    })
}

/// Rewrites a catalog `CREATE` statement into its `IF NOT EXISTS` form.
///
/// The result always ends with the terminator.
pub fn idempotent_create(sql: &str) -> String {
    let rewritten = create_regex().replace(sql, |caps: &regex::Captures<'_>| {
        format!(
            "CREATE {}{} IF NOT EXISTS ",
            caps.get(1).map_or("", |m| m.as_str()).to_ascii_uppercase(),
            caps[2].to_ascii_uppercase()
        )
    });
    let trimmed = rewritten.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

fn table_schema(table: &TableDescriptor, drop_existing: bool) -> String {
    let mut out = String::new();
    if drop_existing {
        out.push_str("DROP TABLE IF EXISTS ");
        out.push_str(&quote_identifier(&table.name));
        out.push_str(";\n");
    }
    out.push_str(&idempotent_create(&table.sql));
    out.push('\n');
    out
}

fn index_schema(indexes: &[IndexDescriptor]) -> String {
    let mut out = String::new();
    for index in indexes {
        out.push_str(&idempotent_create(&index.sql));
        out.push('\n');
    }
    out
}

/// One flushed INSERT statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InsertStatement {
    /// Statement text including the terminator and a trailing newline
    pub(crate) text: String,
    /// Row tuples it carries
    pub(crate) rows: usize,
    /// True when a single row alone exceeds the byte ceiling
    pub(crate) oversize: bool,
}

impl InsertStatement {
    /// Statement length in bytes up to and including the terminator.
    pub(crate) fn len(&self) -> usize {
        self.text.len().saturating_sub(1)
    }
}

/// Accumulates row tuples into multi-row INSERT statements.
///
/// A statement is flushed when it holds `max_rows` tuples, or before a tuple
/// that would push it over `max_bytes`. Only the batch being assembled is
/// held in memory.
#[derive(Debug)]
pub(crate) struct InsertBatcher {
    prefix: String,
    max_rows: usize,
    max_bytes: usize,
    tuples: String,
    rows: usize,
}

impl InsertBatcher {
    pub(crate) fn new(
        policy: ConflictPolicy,
        table: &TableDescriptor,
        max_rows: usize,
        max_bytes: usize,
    ) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            prefix: format!(
                "{} {} ({}) VALUES ",
                policy.insert_prefix(),
                quote_identifier(&table.name),
                columns
            ),
            max_rows: max_rows.max(1),
            max_bytes,
            tuples: String::new(),
            rows: 0,
        }
    }

    /// Adds a tuple and returns any statements it caused to be flushed.
    pub(crate) fn push(&mut self, tuple: String) -> Vec<InsertStatement> {
        let mut flushed = Vec::new();

        // prefix + tuples + "," + tuple + ";"
        let projected = self
            .prefix
            .len()
            .saturating_add(self.tuples.len())
            .saturating_add(tuple.len())
            .saturating_add(2);
        if self.rows > 0 && projected > self.max_bytes {
            flushed.extend(self.finish());
        }

        if self.rows > 0 {
            self.tuples.push(',');
        }
        self.tuples.push_str(&tuple);
        self.rows = self.rows.saturating_add(1);

        if self.rows >= self.max_rows {
            flushed.extend(self.finish());
        }
        flushed
    }

    /// Flushes the pending batch, if any.
    pub(crate) fn finish(&mut self) -> Option<InsertStatement> {
        if self.rows == 0 {
            return None;
        }
        let mut text = String::with_capacity(
            self.prefix
                .len()
                .saturating_add(self.tuples.len())
                .saturating_add(2),
        );
        text.push_str(&self.prefix);
        text.push_str(&self.tuples);
        text.push_str(";\n");

        let statement = InsertStatement {
            oversize: text.len().saturating_sub(1) > self.max_bytes,
            text,
            rows: self.rows,
        };
        self.tuples.clear();
        self.rows = 0;
        Some(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowOrdering;

    fn table() -> TableDescriptor {
        TableDescriptor {
            name: "t".to_string(),
            columns: vec!["id".to_string(), "name".to_string()],
            sql: "CREATE TABLE t (id INTEGER, name TEXT)".to_string(),
            ordering: RowOrdering::RowId,
        }
    }

    #[test]
    fn test_idempotent_create_rewrites() {
        assert_eq!(
            idempotent_create("CREATE TABLE t (id INTEGER)"),
            "CREATE TABLE IF NOT EXISTS t (id INTEGER);"
        );
        assert_eq!(
            idempotent_create("create unique index ix on t(id)"),
            "CREATE UNIQUE INDEX IF NOT EXISTS ix on t(id);"
        );
        assert_eq!(
            idempotent_create("CREATE TABLE IF NOT EXISTS \"a b\" (x)"),
            "CREATE TABLE IF NOT EXISTS \"a b\" (x);"
        );
        assert_eq!(
            idempotent_create("CREATE VIEW v AS SELECT 1;"),
            "CREATE VIEW IF NOT EXISTS v AS SELECT 1;"
        );
    }

    #[test]
    fn test_table_schema_with_drop() {
        let schema = table_schema(&table(), true);
        assert_eq!(
            schema,
            "DROP TABLE IF EXISTS \"t\";\nCREATE TABLE IF NOT EXISTS t (id INTEGER, name TEXT);\n"
        );
        assert!(!table_schema(&table(), false).contains("DROP"));
    }

    #[test]
    fn test_batcher_flushes_on_row_ceiling() {
        let mut batcher = InsertBatcher::new(ConflictPolicy::Insert, &table(), 2, 10_000);
        assert!(batcher.push("(1, 'a')".to_string()).is_empty());
        let flushed = batcher.push("(2, 'b')".to_string());
        assert_eq!(flushed.len(), 1);
        assert_eq!(
            flushed[0].text,
            "INSERT INTO \"t\" (\"id\", \"name\") VALUES (1, 'a'),(2, 'b');\n"
        );
        assert_eq!(flushed[0].rows, 2);
        assert!(batcher.finish().is_none());
    }

    #[test]
    fn test_batcher_flushes_on_byte_ceiling() {
        let prefix_len = "INSERT INTO \"t\" (\"id\", \"name\") VALUES ".len();
        // room for exactly two 8-byte tuples plus separator and terminator
        let ceiling = prefix_len + 8 + 1 + 8 + 1;
        let mut batcher = InsertBatcher::new(ConflictPolicy::Insert, &table(), 100, ceiling);

        assert!(batcher.push("(1, 'a')".to_string()).is_empty());
        assert!(batcher.push("(2, 'b')".to_string()).is_empty());
        let flushed = batcher.push("(3, 'c')".to_string());
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].rows, 2);
        assert_eq!(flushed[0].len(), ceiling);
        assert!(!flushed[0].oversize);

        let rest = batcher.finish().unwrap();
        assert_eq!(rest.rows, 1);
        assert!(rest.len() <= ceiling);
    }

    #[test]
    fn test_batcher_oversize_row_stands_alone() {
        let mut batcher = InsertBatcher::new(ConflictPolicy::Replace, &table(), 100, 50);
        let big = format!("(1, '{}')", "x".repeat(100));

        assert!(batcher.push("(0, 'a')".to_string()).is_empty());
        let flushed = batcher.push(big);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].rows, 1);
        assert!(flushed[0].text.starts_with("INSERT OR REPLACE INTO"));

        let alone = batcher.finish().unwrap();
        assert_eq!(alone.rows, 1);
        assert!(alone.oversize);
    }

    #[test]
    fn test_header_and_trailer() {
        let config = ExportConfig::default();
        let header = header(&config);
        assert!(header.starts_with(DUMP_HEADER));
        assert!(header.contains(&config.generated_at.to_rfc3339()));

        let summary = ExportSummary {
            tables: vec!["a".to_string(), "b".to_string()],
            total_rows: 7,
            warnings: vec!["w".to_string()],
            ..ExportSummary::default()
        };
        assert_eq!(
            trailer(&summary),
            "\n-- Export complete: 2 tables, 7 rows, 1 warnings\n"
        );
    }
}
