//! Configuration types for the dbferry engines.
//!
//! - `ExportConfig`: what to dump and how to batch it
//! - `ImportConfig`: which statements to skip and how strict to be
//! - `ClearOptions`: how a clear empties a store
//! - `UploadConfig`: destination and key for an exact-size upload
//! - `CloneOptions`: clear flags and credentials for a clone run
//! - `StoreConfig`: SQLite pool settings
//!
//! Every config is an immutable value once handed to an engine. Builders
//! consume and return `self`; `validate()` rejects unusable values before any
//! work starts.

mod clear;
mod clone;
mod export;
mod import;
mod store;
mod upload;

pub use clear::ClearOptions;
pub use clone::CloneOptions;
pub use export::{ConflictPolicy, ExportConfig, TableFilter};
pub use import::{DEFAULT_MAX_STATEMENT_BYTES, ImportConfig};
pub use store::StoreConfig;
pub use upload::UploadConfig;

/// Table name prefixes that mark internal bookkeeping tables.
///
/// Tables with these prefixes are never exported, cleared or imported into.
pub const DEFAULT_INTERNAL_PREFIXES: &[&str] = &["sqlite_", "_cf_"];

pub(crate) fn default_internal_prefixes() -> Vec<String> {
    DEFAULT_INTERNAL_PREFIXES
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}

/// Returns true when `name` starts with one of `prefixes` (ASCII case-insensitive).
pub fn is_internal_name(name: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        name.len() >= prefix.len()
            && name.is_char_boundary(prefix.len())
            && name[..prefix.len()].eq_ignore_ascii_case(prefix)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_internal_name() {
        let prefixes = default_internal_prefixes();
        assert!(is_internal_name("sqlite_sequence", &prefixes));
        assert!(is_internal_name("SQLITE_stat1", &prefixes));
        assert!(is_internal_name("_cf_KV", &prefixes));
        assert!(!is_internal_name("users", &prefixes));
        assert!(!is_internal_name("sqlit", &prefixes));
        assert!(!is_internal_name("é", &prefixes));
    }
}
