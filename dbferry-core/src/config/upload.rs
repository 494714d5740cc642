//! Exact-size upload configuration.

use super::ExportConfig;
use crate::error::DbFerryError;

/// Destination and export settings for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Export settings shared by both passes
    pub export: ExportConfig,
    /// Bucket or container identifier
    pub bucket: String,
    /// Object key; derived from source and timestamp when `None`
    pub key: Option<String>,
    /// Source identifier recorded in metadata; the store name when `None`
    pub source: Option<String>,
    /// Chunks buffered between generation and transmission
    pub channel_capacity: usize,
}

impl UploadConfig {
    /// Creates an upload config for `bucket` with default export settings.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            export: ExportConfig::default(),
            bucket: bucket.into(),
            key: None,
            source: None,
            channel_capacity: 2,
        }
    }

    /// Builder method to set the export settings.
    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    /// Builder method to set an explicit object key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Builder method to set the source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Resolves the object key for `source`.
    ///
    /// The derived form is `dumps/<source>/<timestamp>.sql`, using the
    /// export header timestamp so it is stable across both passes.
    pub fn resolve_key(&self, source: &str) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None => format!(
                "dumps/{}/{}.sql",
                sanitize_key_segment(source),
                self.export.generated_at.format("%Y%m%dT%H%M%SZ")
            ),
        }
    }

    /// Validates the destination and export settings.
    ///
    /// # Errors
    /// Returns a configuration error for an empty bucket or key, a zero
    /// channel capacity, or invalid export settings.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(DbFerryError::configuration("bucket cannot be empty"));
        }
        if let Some(key) = &self.key
            && key.trim().is_empty()
        {
            return Err(DbFerryError::configuration("key cannot be empty"));
        }
        if self.channel_capacity == 0 {
            return Err(DbFerryError::configuration(
                "channel_capacity must be greater than 0",
            ));
        }
        self.export.validate()
    }
}

fn sanitize_key_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "store".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_resolve_key_derived() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let config = UploadConfig::new("backups")
            .with_export(ExportConfig::new().with_generated_at(at));
        assert_eq!(
            config.resolve_key("app.db"),
            "dumps/app.db/20260304T050607Z.sql"
        );
        assert_eq!(
            config.resolve_key(":memory:"),
            "dumps/_memory_/20260304T050607Z.sql"
        );
    }

    #[test]
    fn test_resolve_key_explicit() {
        let config = UploadConfig::new("backups").with_key("latest.sql");
        assert_eq!(config.resolve_key("ignored"), "latest.sql");
    }

    #[test]
    fn test_upload_config_validation() {
        assert!(UploadConfig::new("b").validate().is_ok());
        assert!(UploadConfig::new(" ").validate().is_err());
        assert!(UploadConfig::new("b").with_key("").validate().is_err());
    }
}
