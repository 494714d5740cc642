//! Import configuration.

use serde::{Deserialize, Serialize};

use crate::error::DbFerryError;

/// Default statement ceiling.
///
/// Export flushes a row that does not fit its own ceiling as a statement of
/// its own, so this sits well above any single-row statement a dump of
/// ordinary data produces.
pub const DEFAULT_MAX_STATEMENT_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Execute `DROP TABLE` statements instead of skipping them
    pub allow_drop: bool,
    /// Execute a trailing statement that lacks a terminator instead of
    /// recording it as an error
    pub execute_unterminated_tail: bool,
    /// Largest statement the import will execute; larger ones are recorded
    /// as errors and skipped
    pub max_statement_bytes: usize,
    /// Characters of statement text kept in error excerpts
    pub excerpt_chars: usize,
    /// Internal table prefixes that statements may not target
    pub internal_prefixes: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            allow_drop: false,
            execute_unterminated_tail: false,
            max_statement_bytes: DEFAULT_MAX_STATEMENT_BYTES,
            excerpt_chars: 200,
            internal_prefixes: super::default_internal_prefixes(),
        }
    }
}

impl ImportConfig {
    /// Creates a new import config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to allow destructive DROP TABLE statements.
    pub fn with_allow_drop(mut self, allow: bool) -> Self {
        self.allow_drop = allow;
        self
    }

    /// Builder method to execute an unterminated trailing statement.
    pub fn with_execute_unterminated_tail(mut self, execute: bool) -> Self {
        self.execute_unterminated_tail = execute;
        self
    }

    /// Builder method to set the statement size ceiling.
    pub fn with_max_statement_bytes(mut self, bytes: usize) -> Self {
        self.max_statement_bytes = bytes;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a configuration error when a limit is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_statement_bytes == 0 {
            return Err(DbFerryError::configuration(
                "max_statement_bytes must be greater than 0",
            ));
        }
        if self.excerpt_chars == 0 {
            return Err(DbFerryError::configuration(
                "excerpt_chars must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_config_default() {
        let config = ImportConfig::default();
        assert!(!config.allow_drop);
        assert!(!config.execute_unterminated_tail);
        assert_eq!(config.max_statement_bytes, DEFAULT_MAX_STATEMENT_BYTES);
        assert_eq!(config.excerpt_chars, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_import_config_builder() {
        let config = ImportConfig::new()
            .with_allow_drop(true)
            .with_execute_unterminated_tail(true)
            .with_max_statement_bytes(10);
        assert!(config.allow_drop);
        assert!(config.execute_unterminated_tail);
        assert_eq!(config.max_statement_bytes, 10);
        assert!(ImportConfig::new().with_max_statement_bytes(0).validate().is_err());
    }
}
