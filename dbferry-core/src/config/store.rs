//! SQLite store connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DbFerryError;

/// Pool settings for a SQLite store.
///
/// # Security
/// Holds no credentials; the database location is passed separately and is
/// redacted before it is logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum pooled connections (forced to 1 for in-memory databases)
    pub max_connections: u32,
    /// Time allowed to acquire a connection
    pub connect_timeout: Duration,
    /// Idle connection lifetime (ignored for in-memory databases)
    pub idle_timeout: Option<Duration>,
    /// Open the database read-only
    pub read_only: bool,
    /// Create the database file when missing (ignored when read-only)
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new store config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to open the store read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builder method to set the pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Validates pool parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_connections == 0 {
            return Err(DbFerryError::configuration(
                "max_connections must be greater than 0",
            ));
        }
        if self.max_connections > 100 {
            return Err(DbFerryError::configuration(
                "max_connections should not exceed 100 for safety",
            ));
        }
        if self.connect_timeout.as_secs() == 0 {
            return Err(DbFerryError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_validation() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::new().with_max_connections(0).validate().is_err());
        assert!(StoreConfig::new().with_max_connections(101).validate().is_err());

        let mut config = StoreConfig::default();
        config.connect_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }
}
