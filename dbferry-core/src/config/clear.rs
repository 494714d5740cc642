//! Clear configuration.

use serde::{Deserialize, Serialize};

/// How a clear empties a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOptions {
    /// Delete rows but keep table definitions
    pub keep_schema: bool,
    /// Also drop trigger definitions
    pub reset_triggers: bool,
    /// Internal table prefixes left untouched
    pub internal_prefixes: Vec<String>,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            keep_schema: false,
            reset_triggers: false,
            internal_prefixes: super::default_internal_prefixes(),
        }
    }
}

impl ClearOptions {
    /// Creates clear options with defaults (drop tables, keep triggers).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to delete rows instead of dropping tables.
    pub fn with_keep_schema(mut self, keep: bool) -> Self {
        self.keep_schema = keep;
        self
    }

    /// Builder method to drop trigger definitions too.
    pub fn with_reset_triggers(mut self, reset: bool) -> Self {
        self.reset_triggers = reset;
        self
    }

    /// Encodes the flags as query parameters for a remote clear request.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let flag = |b: bool| if b { "true" } else { "false" };
        vec![
            ("keepSchema", flag(self.keep_schema)),
            ("resetTriggers", flag(self.reset_triggers)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_options_query_pairs() {
        let options = ClearOptions::new().with_reset_triggers(true);
        assert_eq!(
            options.to_query_pairs(),
            vec![("keepSchema", "false"), ("resetTriggers", "true")]
        );
    }
}
