//! Export configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DbFerryError;

/// Conflict handling for generated INSERT statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Plain `INSERT`; a conflicting row fails the statement
    #[default]
    Insert,
    /// `INSERT OR IGNORE`; conflicting rows are skipped
    InsertOrIgnore,
    /// `INSERT OR REPLACE`; conflicting rows are overwritten
    Replace,
}

impl ConflictPolicy {
    /// Statement prefix up to and including `INTO`.
    pub fn insert_prefix(self) -> &'static str {
        match self {
            Self::Insert => "INSERT INTO",
            Self::InsertOrIgnore => "INSERT OR IGNORE INTO",
            Self::Replace => "INSERT OR REPLACE INTO",
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = DbFerryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "insert-or-ignore" | "ignore" => Ok(Self::InsertOrIgnore),
            "replace" | "insert-or-replace" => Ok(Self::Replace),
            other => Err(DbFerryError::configuration(format!(
                "Unknown conflict policy '{}': expected insert, insert-or-ignore or replace",
                other
            ))),
        }
    }
}

/// Inclusive/exclusive table name filter.
///
/// A non-empty whitelist wins; the blacklist is only consulted when the
/// whitelist is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter {
    /// Tables to include (empty = all tables)
    pub whitelist: Vec<String>,
    /// Tables to exclude
    pub blacklist: Vec<String>,
}

impl TableFilter {
    /// Returns true when `table` passes the filter.
    pub fn selects(&self, table: &str) -> bool {
        if !self.whitelist.is_empty() {
            return self.whitelist.iter().any(|t| t == table);
        }
        !self.blacklist.iter().any(|t| t == table)
    }
}

/// Configuration for one export run.
///
/// `generated_at` is captured when the config is created and embedded in the
/// dump header. Reusing the same config therefore reproduces the same bytes,
/// which the two-pass upload depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Emit CREATE TABLE / CREATE INDEX statements
    pub include_schema: bool,
    /// Emit INSERT statements
    pub include_data: bool,
    /// Emit CREATE VIEW statements (requires `include_schema`)
    pub include_views: bool,
    /// Emit `DROP TABLE IF EXISTS` before each table definition
    pub drop_existing: bool,
    /// Table selection
    pub filter: TableFilter,
    /// Row tuples per INSERT statement
    pub max_rows_per_statement: usize,
    /// Byte ceiling per INSERT statement
    pub max_statement_bytes: usize,
    /// Rows fetched per paged SELECT
    pub page_size: u64,
    /// INSERT conflict handling
    pub conflict_policy: ConflictPolicy,
    /// Internal table prefixes excluded from export
    pub internal_prefixes: Vec<String>,
    /// Timestamp written into the dump header
    pub generated_at: DateTime<Utc>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            include_schema: true,
            include_data: true,
            include_views: true,
            drop_existing: false,
            filter: TableFilter::default(),
            max_rows_per_statement: 100,
            max_statement_bytes: 100_000,
            page_size: 1000,
            conflict_policy: ConflictPolicy::default(),
            internal_prefixes: super::default_internal_prefixes(),
            generated_at: Utc::now(),
        }
    }
}

impl ExportConfig {
    /// Creates a new export config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to include or skip schema statements.
    pub fn with_schema(mut self, include: bool) -> Self {
        self.include_schema = include;
        self
    }

    /// Builder method to include or skip row data.
    pub fn with_data(mut self, include: bool) -> Self {
        self.include_data = include;
        self
    }

    /// Builder method to include or skip views.
    pub fn with_views(mut self, include: bool) -> Self {
        self.include_views = include;
        self
    }

    /// Builder method to emit DROP TABLE before each definition.
    pub fn with_drop_existing(mut self, drop: bool) -> Self {
        self.drop_existing = drop;
        self
    }

    /// Builder method to set the table whitelist.
    pub fn with_whitelist(mut self, tables: Vec<String>) -> Self {
        self.filter.whitelist = tables;
        self
    }

    /// Builder method to set the table blacklist.
    pub fn with_blacklist(mut self, tables: Vec<String>) -> Self {
        self.filter.blacklist = tables;
        self
    }

    /// Builder method to set the per-statement row ceiling.
    pub fn with_max_rows_per_statement(mut self, rows: usize) -> Self {
        self.max_rows_per_statement = rows;
        self
    }

    /// Builder method to set the per-statement byte ceiling.
    pub fn with_max_statement_bytes(mut self, bytes: usize) -> Self {
        self.max_statement_bytes = bytes;
        self
    }

    /// Builder method to set the paged SELECT size.
    pub fn with_page_size(mut self, rows: u64) -> Self {
        self.page_size = rows;
        self
    }

    /// Builder method to set the INSERT conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Builder method to pin the header timestamp.
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = at;
        self
    }

    /// Validates batching ceilings.
    ///
    /// # Errors
    /// Returns a configuration error when a ceiling is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_rows_per_statement == 0 {
            return Err(DbFerryError::configuration(
                "max_rows_per_statement must be greater than 0",
            ));
        }
        if self.max_statement_bytes == 0 {
            return Err(DbFerryError::configuration(
                "max_statement_bytes must be greater than 0",
            ));
        }
        if self.page_size == 0 {
            return Err(DbFerryError::configuration(
                "page_size must be greater than 0",
            ));
        }
        if !self.include_schema && !self.include_data {
            return Err(DbFerryError::configuration(
                "at least one of include_schema or include_data must be set",
            ));
        }
        Ok(())
    }
}
