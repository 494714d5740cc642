//! Import engine.
//!
//! [`import`] consumes a byte stream whose chunk boundaries are arbitrary,
//! decodes it incrementally as UTF-8, feeds the text to a
//! [`StatementSplitter`] and applies every complete statement to the store.
//!
//! Before execution each statement is classified:
//! - transaction and pragma verbs are skipped with a warning
//! - statements targeting internal tables are skipped with a warning
//! - `DROP TABLE` is skipped with a warning unless drops are allowed
//!
//! A failing statement is recorded with an excerpt and the import carries
//! on, and so is a statement larger than the size limit, which is never
//! executed. A failure of the input stream itself stops the import with
//! `success = false` and whatever had been applied so far stays applied.

use std::sync::OnceLock;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use regex::Regex;

use crate::Result;
use crate::codec::excerpt;
use crate::config::{ImportConfig, is_internal_name};
use crate::models::ImportResult;
use crate::splitter::{Split, StatementSplitter, strip_leading_trivia};
use crate::store::DumpStore;

/// Leading verbs that are never executed.
pub const DENIED_VERBS: &[&str] = &[
    "BEGIN", "COMMIT", "END", "ROLLBACK", "SAVEPOINT", "RELEASE", "PRAGMA",
];

/// How the import engine treats one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementClass {
    /// Transaction or pragma statement, skipped
    Control(String),
    /// Statement targeting an internal table, skipped
    Internal(String),
    /// `DROP TABLE`, skipped unless drops are allowed
    DropTable(String),
    /// `CREATE TABLE`
    CreateTable(String),
    /// INSERT, REPLACE, UPDATE or DELETE; affected rows are counted
    Mutation,
    /// Anything else (indexes, views, triggers)
    Other,
}

const IDENT: &str = r#"(?:"(?:[^"]|"")+"|`[^`]+`|\[[^\]]+\]|[\w$]+)"#;

fn target_regex() -> &'static Regex {
    static TARGET: OnceLock<Regex> = OnceLock::new();
    TARGET.get_or_init(|| {
        let pattern = format!(
            r"(?is)^(INSERT(?:\s+OR\s+\w+)?\s+INTO|REPLACE\s+INTO|CREATE\s+(?:TEMP\s+|TEMPORARY\s+)?TABLE(?:\s+IF\s+NOT\s+EXISTS)?|DROP\s+TABLE(?:\s+IF\s+EXISTS)?|DELETE\s+FROM|UPDATE(?:\s+OR\s+\w+)?|ALTER\s+TABLE)\s+(?:{IDENT}\s*\.\s*)?({IDENT})"
        );
        Regex::new(&pattern).expect("Valid regex for statement targets")
    })
}

fn index_target_regex() -> &'static Regex {
    static INDEX_TARGET: OnceLock<Regex> = OnceLock::new();
    INDEX_TARGET.get_or_init(|| {
        let pattern = format!(
            r"(?is)^CREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:{IDENT}\s*\.\s*)?{IDENT}\s+ON\s+({IDENT})"
        );
        Regex::new(&pattern).expect("Valid regex for index targets")
    })
}

/// Removes identifier quoting (`"..."`, `` `...` ``, `[...]`).
fn unquote_identifier(ident: &str) -> String {
    if let Some(inner) = ident.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner.replace("\"\"", "\"");
    }
    if let Some(inner) = ident.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return inner.to_string();
    }
    if let Some(inner) = ident.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return inner.to_string();
    }
    ident.to_string()
}

/// Classifies a statement produced by the splitter.
pub fn classify(statement: &str, internal_prefixes: &[String]) -> StatementClass {
    let text = strip_leading_trivia(statement);
    let verb: String = text
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if DENIED_VERBS.contains(&verb.as_str()) {
        return StatementClass::Control(verb);
    }

    let (operation, target) = if let Some(caps) = target_regex().captures(text) {
        (
            caps[1].to_ascii_uppercase(),
            Some(unquote_identifier(&caps[2])),
        )
    } else if let Some(caps) = index_target_regex().captures(text) {
        ("CREATE INDEX".to_string(), Some(unquote_identifier(&caps[1])))
    } else {
        (verb.clone(), None)
    };

    if let Some(table) = &target
        && is_internal_name(table, internal_prefixes)
    {
        return StatementClass::Internal(table.clone());
    }

    match (verb.as_str(), target) {
        ("DROP", Some(table)) if operation.contains("TABLE") => StatementClass::DropTable(table),
        ("CREATE", Some(table)) if operation.contains("TABLE") => {
            StatementClass::CreateTable(table)
        }
        ("INSERT" | "REPLACE" | "UPDATE" | "DELETE", _) => StatementClass::Mutation,
        _ => StatementClass::Other,
    }
}

/// Incremental UTF-8 decoder that keeps an incomplete trailing sequence.
///
/// Invalid byte sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = after.get(len..).unwrap_or_default();
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let tail = rest.to_vec();
        self.pending = tail;
        out
    }

    /// Flushes any incomplete sequence left at end of input.
    pub(crate) fn finish(self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }
}

/// Applies a dump stream to `store`.
///
/// Always returns a result record once the configuration is valid;
/// statement and stream failures are reported inside it.
///
/// # Errors
/// Returns a configuration error if `config` fails validation.
pub async fn import<S, E>(
    store: &dyn DumpStore,
    input: S,
    config: &ImportConfig,
) -> Result<ImportResult>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send,
    E: std::fmt::Display,
{
    config.validate()?;
    tracing::info!("Starting import into {}", store.source_name());

    let mut result = ImportResult::default();
    let mut splitter = StatementSplitter::with_max_statement_bytes(config.max_statement_bytes);
    let mut decoder = Utf8Decoder::default();
    let mut stream_failed = false;

    let mut input = std::pin::pin!(input);
    while let Some(chunk) = input.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let message = format!("Input stream failed: {}", e);
                tracing::error!("{}", message);
                result.record_error(String::new(), message);
                stream_failed = true;
                break;
            }
        };

        let text = decoder.decode(&chunk);
        for split in splitter.push(&text) {
            apply_split(store, split, config, &mut result).await;
        }
    }

    if !stream_failed {
        let rest = decoder.finish();
        for split in splitter.push(&rest) {
            apply_split(store, split, config, &mut result).await;
        }

        match splitter.finish() {
            Some(Split::Statement(tail)) if config.execute_unterminated_tail => {
                tracing::warn!("Executing unterminated trailing statement");
                apply(store, &tail, config, &mut result).await;
            }
            Some(Split::Statement(tail)) => {
                result.record_error(
                    excerpt(&tail, config.excerpt_chars),
                    "Unterminated statement at end of input",
                );
            }
            Some(oversized) => apply_split(store, oversized, config, &mut result).await,
            None => {}
        }
    }

    result.success = !stream_failed && result.errors.is_empty();
    tracing::info!(
        "Import finished: {} statements, {} rows, {} errors, {} warnings",
        result.executed_statements,
        result.rows_inserted,
        result.errors.len(),
        result.warnings.len()
    );
    Ok(result)
}

/// Applies a complete dump held in memory.
///
/// # Errors
/// Returns a configuration error if `config` fails validation.
pub async fn import_text(
    store: &dyn DumpStore,
    text: &str,
    config: &ImportConfig,
) -> Result<ImportResult> {
    let chunk = Bytes::copy_from_slice(text.as_bytes());
    let input = futures::stream::iter([Ok::<_, std::convert::Infallible>(chunk)]);
    import(store, input, config).await
}

async fn apply_split(
    store: &dyn DumpStore,
    split: Split,
    config: &ImportConfig,
    result: &mut ImportResult,
) {
    match split {
        Split::Statement(statement) => apply(store, &statement, config, result).await,
        Split::Oversized { head, bytes } => {
            let message = format!(
                "Statement of {} bytes exceeds {} bytes",
                bytes, config.max_statement_bytes
            );
            tracing::warn!("{}", message);
            let mut statement = excerpt(&head, config.excerpt_chars);
            if !statement.ends_with("...") {
                statement.push_str("...");
            }
            result.record_error(statement, message);
        }
    }
}

async fn apply(
    store: &dyn DumpStore,
    statement: &str,
    config: &ImportConfig,
    result: &mut ImportResult,
) {
    let class = classify(statement, &config.internal_prefixes);
    match &class {
        StatementClass::Control(verb) => {
            result.record_warning(format!("Skipped {} statement", verb));
            return;
        }
        StatementClass::Internal(table) => {
            result.record_warning(format!(
                "Skipped statement targeting internal table '{}'",
                table
            ));
            return;
        }
        StatementClass::DropTable(table) if !config.allow_drop => {
            result.record_warning(format!(
                "Skipped DROP TABLE '{}' (drops are not allowed)",
                table
            ));
            return;
        }
        _ => {}
    }

    let existed_before = match &class {
        StatementClass::CreateTable(table) => match store.table_exists(table).await {
            Ok(exists) => exists,
            Err(e) => {
                result.record_warning(format!(
                    "Could not check whether '{}' already exists; it is not listed as created: {}",
                    table,
                    e.to_report_string()
                ));
                true
            }
        },
        _ => false,
    };

    match store.execute(statement).await {
        Ok(affected) => {
            let rows = if class == StatementClass::Mutation {
                affected
            } else {
                0
            };
            result.record_executed(rows);
            if let StatementClass::CreateTable(table) = &class
                && !existed_before
            {
                result.record_table_created(table);
            }
        }
        Err(e) => {
            let message = e.to_report_string();
            tracing::warn!(
                "Statement failed: {} ({})",
                message,
                excerpt(statement, 60)
            );
            result.record_error(excerpt(statement, config.excerpt_chars), message);
        }
    }
}
