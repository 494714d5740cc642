//! Core engines for dbferry.
//!
//! This crate streams an embedded SQLite store out as replayable SQL text and
//! back in again, without ever holding a whole dump in memory. It is the
//! library half of dbferry; the `dbferry` binary is one caller, an HTTP
//! router owned by the embedding application is another.
//!
//! # Operations
//! - [`export::export`]: lazy stream of dump chunks with a progress side channel
//! - [`import::import`]: apply a dump stream of arbitrary chunking
//! - [`upload::upload`]: two-pass exact-size upload into a blob store
//! - [`clone::clone`]: remote export piped into a remote import
//! - [`clear::clear`]: drop or empty user tables
//! - [`security::CredentialGate`]: shared-secret check for all of the above
//!
//! # Security Guarantees
//! - Secrets are held in zeroizing containers and never logged
//! - Connection strings and endpoint URLs are redacted in errors and logs
//! - Import never executes transaction control, pragmas or `DROP TABLE`
//!   unless explicitly allowed
//! - Internal tables are never exported, cleared or imported into

pub mod clear;
pub mod clone;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod models;
pub mod security;
pub mod splitter;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use config::{
    ClearOptions, CloneOptions, ConflictPolicy, ExportConfig, ImportConfig, StoreConfig,
    TableFilter, UploadConfig,
};
pub use error::{DbFerryError, Result};
pub use export::ExportStream;
pub use models::{
    ClearResult, CloneReport, ExportSummary, ImportResult, Row, SqlValue, TableDescriptor,
    UploadReceipt,
};
pub use security::{CredentialGate, Operation, SharedSecret};
pub use store::DumpStore;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
