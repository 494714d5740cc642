//! Clone configuration.

use super::ClearOptions;
use crate::security::SharedSecret;

/// Options for a clone run between two remote endpoints.
///
/// # Security
/// Secrets are held in [`SharedSecret`] and never appear in `Debug` output.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Clear the destination before importing
    pub clear_on_import: bool,
    /// Clear the source once the import has run
    pub clear_after_export: bool,
    /// Leave the source in place when the import reported failures
    pub keep_source_on_import_failure: bool,
    /// How either clear empties its store
    pub clear: ClearOptions,
    /// Credential presented to the source endpoint
    pub export_auth: Option<SharedSecret>,
    /// Credential presented to the destination endpoint
    pub import_auth: Option<SharedSecret>,
}

impl CloneOptions {
    /// Creates clone options with no clears and no credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to clear the destination before import.
    pub fn with_clear_on_import(mut self, clear: bool) -> Self {
        self.clear_on_import = clear;
        self
    }

    /// Builder method to clear the source after import.
    pub fn with_clear_after_export(mut self, clear: bool) -> Self {
        self.clear_after_export = clear;
        self
    }

    /// Builder method to skip the source clear after a failed import.
    pub fn with_keep_source_on_import_failure(mut self, keep: bool) -> Self {
        self.keep_source_on_import_failure = keep;
        self
    }

    /// Builder method to set the source credential.
    pub fn with_export_auth(mut self, secret: SharedSecret) -> Self {
        self.export_auth = Some(secret);
        self
    }

    /// Builder method to set the destination credential.
    pub fn with_import_auth(mut self, secret: SharedSecret) -> Self {
        self.import_auth = Some(secret);
        self
    }
}
