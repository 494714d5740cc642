//! SQLite connection handling.
//!
//! Connection strings are validated and normalized to sqlx's `sqlite:` URL
//! form before the pool is opened. In-memory databases are private to a
//! single connection, so their pool is pinned to one connection that never
//! idles out.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::SqliteStore;
use crate::Result;
use crate::config::StoreConfig;
use crate::error::{DbFerryError, redact_url};

impl SqliteStore {
    /// Opens a store with default configuration.
    ///
    /// # Errors
    /// Returns error if:
    /// - The connection string does not name a SQLite database
    /// - The database cannot be opened (missing file while read-only, permissions)
    pub async fn new(connection_string: &str) -> Result<Self> {
        Self::with_config(connection_string, StoreConfig::default()).await
    }

    /// Opens a store with custom pool configuration.
    pub async fn with_config(connection_string: &str, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let location = StoreLocation::parse(connection_string)?;
        let pool = create_sqlite_pool(&location, &config).await?;

        tracing::debug!(
            "Opened SQLite store {} (read_only: {})",
            redact_url(connection_string),
            config.read_only
        );

        Ok(Self {
            pool,
            config,
            connection_string: connection_string.to_string(),
        })
    }

    /// True for a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        matches!(
            StoreLocation::parse(&self.connection_string),
            Ok(StoreLocation::Memory)
        )
    }

    /// Database file name, or `:memory:`.
    pub fn database_name(&self) -> String {
        StoreLocation::parse(&self.connection_string)
            .map_or_else(|_| "main".to_string(), |location| location.name())
    }

    /// Closes the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Runs a trivial query to confirm the pool can serve requests.
    pub async fn is_healthy(&self) -> bool {
        matches!(
            sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&self.pool)
                .await,
            Ok(1)
        )
    }
}

const FILE_EXTENSIONS: &[&str] = &[".db", ".sqlite", ".sqlite3"];

/// What a connection string points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreLocation {
    /// Private in-memory database
    Memory,
    /// Database file, as a `sqlite:` URL sqlx accepts
    File { url: String },
}

impl StoreLocation {
    /// Accepts `:memory:`, `sqlite:` URLs and bare paths with a SQLite
    /// file extension.
    pub(crate) fn parse(connection_string: &str) -> Result<Self> {
        let trimmed = connection_string.trim();
        let is_url = trimmed.starts_with("sqlite:");

        if trimmed == ":memory:"
            || (is_url && (trimmed.contains(":memory:") || trimmed.contains("mode=memory")))
        {
            return Ok(Self::Memory);
        }

        if is_url {
            let rest = trimmed
                .strip_prefix("sqlite://")
                .or_else(|| trimmed.strip_prefix("sqlite:"))
                .unwrap_or_default();
            if rest.split('?').next().unwrap_or_default().is_empty() {
                return Err(DbFerryError::configuration(
                    "SQLite URL does not name a database file",
                ));
            }
            return Ok(Self::File {
                url: trimmed.to_string(),
            });
        }

        if trimmed.contains("://") {
            return Err(DbFerryError::configuration(
                "Connection string must use the sqlite:// scheme",
            ));
        }
        if FILE_EXTENSIONS.iter().any(|ext| trimmed.ends_with(ext)) {
            return Ok(Self::File {
                url: format!("sqlite://{}", trimmed),
            });
        }

        Err(DbFerryError::configuration(
            "Invalid SQLite connection string: expected sqlite:// URL, .db/.sqlite path, or :memory:",
        ))
    }

    /// URL handed to sqlx.
    pub(crate) fn url(&self) -> &str {
        match self {
            Self::Memory => "sqlite::memory:",
            Self::File { url } => url,
        }
    }

    /// Short name used as the dump source identifier.
    pub(crate) fn name(&self) -> String {
        match self {
            Self::Memory => ":memory:".to_string(),
            Self::File { url } => {
                let path = url.split('?').next().unwrap_or_default();
                match path.rsplit(['/', ':']).next() {
                    Some(file) if !file.is_empty() => file.to_string(),
                    _ => "main".to_string(),
                }
            }
        }
    }
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns a configuration error if the string is neither a `sqlite:` URL,
/// a database file path, nor `:memory:`.
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    StoreLocation::parse(connection_string).map(|_| ())
}

async fn create_sqlite_pool(location: &StoreLocation, config: &StoreConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(location.url()).map_err(|e| {
        DbFerryError::configuration(format!("Invalid SQLite connection string: {}", e))
    })?;

    if config.read_only {
        options = options.read_only(true);
    } else if config.create_if_missing {
        options = options.create_if_missing(true);
    }

    let pool_options = match location {
        StoreLocation::Memory => SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None),
        StoreLocation::File { .. } => SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .idle_timeout(config.idle_timeout),
    };

    pool_options
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
        .map_err(DbFerryError::connection_failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(url: &str) -> StoreLocation {
        StoreLocation::File {
            url: url.to_string(),
        }
    }

    #[test]
    fn test_parse_memory_locations() {
        for memory in [":memory:", "sqlite::memory:", "sqlite://:memory:", "sqlite:x?mode=memory"] {
            assert_eq!(StoreLocation::parse(memory).unwrap(), StoreLocation::Memory);
        }
    }

    #[test]
    fn test_parse_file_locations() {
        assert_eq!(
            StoreLocation::parse("sqlite:///srv/app.sqlite").unwrap(),
            file("sqlite:///srv/app.sqlite")
        );
        assert_eq!(
            StoreLocation::parse("data/app.db").unwrap(),
            file("sqlite://data/app.db")
        );
        assert_eq!(
            StoreLocation::parse("sqlite:app.db?mode=ro").unwrap(),
            file("sqlite:app.db?mode=ro")
        );
    }

    #[test]
    fn test_parse_rejects_other_targets() {
        assert!(StoreLocation::parse("postgres://localhost/db").is_err());
        assert!(StoreLocation::parse("notes.txt").is_err());
        assert!(StoreLocation::parse("sqlite://").is_err());
        assert!(validate_sqlite_connection_string("invalid").is_err());
    }

    #[test]
    fn test_location_name() {
        assert_eq!(StoreLocation::Memory.name(), ":memory:");
        assert_eq!(file("sqlite:///srv/data/mydb.sqlite").name(), "mydb.sqlite");
        assert_eq!(file("sqlite://./test.db?mode=ro").name(), "test.db");
        assert_eq!(file("sqlite:app.db").name(), "app.db");
    }

    #[test]
    fn test_location_url() {
        assert_eq!(StoreLocation::Memory.url(), "sqlite::memory:");
        assert_eq!(file("sqlite://a.db").url(), "sqlite://a.db");
    }
}
