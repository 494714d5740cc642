//! dbferry command-line interface.
//!
//! Moves SQLite stores in and out of plain SQL dumps without ever holding a
//! whole dump in memory. Every subcommand is a thin caller of `dbferry-core`;
//! results are printed as JSON so they can be piped into other tools.
//!
//! # Security Guarantees
//! - Connection strings and endpoints are redacted in logs
//! - Secrets are read from the environment and never echoed
//! - Import skips `DROP TABLE` unless `--allow-drop` is given

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use dbferry_core::{
    ClearOptions, ConflictPolicy, ExportConfig, ImportConfig, SqliteStore, StoreConfig,
    UploadConfig,
    config::DEFAULT_MAX_STATEMENT_BYTES,
    clear::clear,
    error::redact_url,
    export::export,
    import::import,
    logging::init_logging,
    upload::{BlobStore, FsBlobStore, upload},
};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Bytes read from the input per import chunk.
const READ_CHUNK: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "dbferry")]
#[command(about = "Streaming SQL dump export, import, upload and clone")]
#[command(version)]
#[command(long_about = "
dbferry - Streaming SQL dumps for SQLite stores

Exports a database as a replayable SQL dump, applies dumps to a database,
uploads dumps to blob storage with an exact declared size, and clones one
remote store into another.

EXAMPLES:
  dbferry export --database-url sqlite://app.db -o app.sql
  dbferry import --database-url sqlite://copy.db app.sql
  dbferry upload --database-url sqlite://app.db --bucket backups --dir /srv/blobs
  dbferry clone https://src.example.com/db https://dst.example.com/db --clear-on-import
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Export a database as a SQL dump
    Export(ExportArgs),
    /// Apply a SQL dump to a database
    Import(ImportArgs),
    /// Export a database into blob storage with an exact declared size
    Upload(UploadArgs),
    /// Copy one remote store into another
    #[cfg(feature = "remote")]
    Clone(CloneArgs),
    /// Remove user tables and views from a database
    Clear(ClearArgs),
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all log output except errors")]
    pub quiet: bool,
}

#[derive(Args)]
pub struct DatabaseArgs {
    /// Database connection URL
    #[arg(
        long,
        env = "DBFERRY_DATABASE_URL",
        help = "SQLite connection string (sqlite://path, a file path or :memory:)"
    )]
    pub database_url: String,
}

/// INSERT conflict handling as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictArg {
    Insert,
    InsertOrIgnore,
    Replace,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Insert => Self::Insert,
            ConflictArg::InsertOrIgnore => Self::InsertOrIgnore,
            ConflictArg::Replace => Self::Replace,
        }
    }
}

#[derive(Args)]
pub struct DumpArgs {
    #[arg(long, help = "Omit CREATE statements")]
    pub no_schema: bool,

    #[arg(long, help = "Omit INSERT statements")]
    pub no_data: bool,

    #[arg(long, help = "Omit view definitions")]
    pub no_views: bool,

    #[arg(long, help = "Emit DROP TABLE IF EXISTS before each table")]
    pub drop_existing: bool,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated list of tables to export (takes precedence over --exclude)"
    )]
    pub tables: Vec<String>,

    #[arg(long, value_delimiter = ',', help = "Comma-separated list of tables to skip")]
    pub exclude: Vec<String>,

    #[arg(long, value_enum, default_value_t = ConflictArg::Insert, help = "INSERT conflict handling")]
    pub conflict: ConflictArg,

    #[arg(long, default_value_t = 100, help = "Maximum rows per INSERT statement")]
    pub max_rows: usize,

    #[arg(long, default_value_t = 100_000, help = "Byte ceiling per INSERT statement")]
    pub max_bytes: usize,

    #[arg(long, default_value_t = 1000, help = "Rows fetched per paged read")]
    pub page_size: u64,
}

impl DumpArgs {
    fn to_config(&self) -> ExportConfig {
        ExportConfig::new()
            .with_schema(!self.no_schema)
            .with_data(!self.no_data)
            .with_views(!self.no_views)
            .with_drop_existing(self.drop_existing)
            .with_whitelist(self.tables.clone())
            .with_blacklist(self.exclude.clone())
            .with_conflict_policy(self.conflict.into())
            .with_max_rows_per_statement(self.max_rows)
            .with_max_statement_bytes(self.max_bytes)
            .with_page_size(self.page_size)
    }
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub dump: DumpArgs,

    #[arg(short, long, help = "Output file (stdout when omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[arg(help = "Dump file to apply (stdin when omitted or '-')")]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Execute DROP TABLE statements instead of skipping them")]
    pub allow_drop: bool,

    #[arg(long, help = "Execute a trailing statement that lacks its terminator")]
    pub execute_unterminated_tail: bool,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_STATEMENT_BYTES,
        help = "Largest statement executed; larger ones are reported and skipped"
    )]
    pub max_statement_bytes: usize,
}

impl ImportArgs {
    fn to_config(&self) -> ImportConfig {
        ImportConfig::new()
            .with_allow_drop(self.allow_drop)
            .with_execute_unterminated_tail(self.execute_unterminated_tail)
            .with_max_statement_bytes(self.max_statement_bytes)
    }
}

#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["dir", "endpoint"])))]
pub struct UploadArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub dump: DumpArgs,

    #[arg(long, help = "Bucket or container name")]
    pub bucket: String,

    #[arg(long, help = "Object key (dumps/<source>/<timestamp>.sql when omitted)")]
    pub key: Option<String>,

    #[arg(long, help = "Source identifier recorded in the object metadata")]
    pub source: Option<String>,

    #[arg(long, help = "Store the dump under this local directory")]
    pub dir: Option<PathBuf>,

    #[arg(long, help = "PUT the dump to this HTTP(S) blob endpoint")]
    pub endpoint: Option<String>,

    #[arg(
        long,
        env = "DBFERRY_SECRET",
        hide_env_values = true,
        help = "Shared secret presented to the blob endpoint"
    )]
    pub secret: Option<String>,
}

#[derive(Args)]
pub struct ClearFlags {
    #[arg(long, help = "Delete rows but keep table definitions")]
    pub keep_schema: bool,

    #[arg(long, help = "Also drop trigger definitions")]
    pub reset_triggers: bool,
}

impl ClearFlags {
    fn to_options(&self) -> ClearOptions {
        ClearOptions::new()
            .with_keep_schema(self.keep_schema)
            .with_reset_triggers(self.reset_triggers)
    }
}

#[cfg(feature = "remote")]
#[derive(Args)]
pub struct CloneArgs {
    #[arg(help = "Source endpoint base URL")]
    pub source: String,

    #[arg(help = "Destination endpoint base URL")]
    pub destination: String,

    #[arg(long, help = "Clear the destination before importing")]
    pub clear_on_import: bool,

    #[arg(long, help = "Clear the source after the import")]
    pub clear_after_export: bool,

    #[arg(
        long,
        requires = "clear_after_export",
        help = "Skip the source clear when the import reports failures"
    )]
    pub keep_source_on_import_failure: bool,

    #[command(flatten)]
    pub clear: ClearFlags,

    #[arg(
        long,
        env = "DBFERRY_EXPORT_AUTH",
        hide_env_values = true,
        help = "Shared secret presented to the source"
    )]
    pub export_auth: Option<String>,

    #[arg(
        long,
        env = "DBFERRY_IMPORT_AUTH",
        hide_env_values = true,
        help = "Shared secret presented to the destination"
    )]
    pub import_auth: Option<String>,
}

#[derive(Args)]
pub struct ClearArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub clear: ClearFlags,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Export(args) => run_export(args).await,
        Command::Import(args) => run_import(args).await,
        Command::Upload(args) => run_upload(args).await,
        #[cfg(feature = "remote")]
        Command::Clone(args) => run_clone(args).await,
        Command::Clear(args) => run_clear(args).await,
    }
}

async fn open_store(database_url: &str, read_only: bool) -> Result<Arc<SqliteStore>> {
    info!("Opening {}", redact_url(database_url));
    let config = StoreConfig::new().with_read_only(read_only);
    let store = SqliteStore::with_config(database_url, config)
        .await
        .with_context(|| format!("Failed to open {}", redact_url(database_url)))?;
    Ok(Arc::new(store))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Streams a dump to a file or stdout; the summary goes to stderr.
async fn run_export(args: &ExportArgs) -> Result<()> {
    let store = open_store(&args.database.database_url, true).await?;
    let mut stream = export(store, args.dump.to_config()).context("Invalid export settings")?;

    let mut writer: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Export failed")?;
        writer
            .write_all(&chunk)
            .await
            .context("Failed to write dump")?;
    }
    writer.flush().await.context("Failed to flush dump")?;

    let summary = stream.progress();
    info!(
        "Exported {} tables ({} rows, {} warnings)",
        summary.tables.len(),
        summary.total_rows,
        summary.warning_count()
    );
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Reads `reader` as a stream of chunks.
fn read_chunks<R>(mut reader: R) -> impl Stream<Item = std::io::Result<Bytes>> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async_stream::try_stream! {
        let mut buffer = vec![0u8; READ_CHUNK];
        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buffer[..read]);
        }
    }
}

async fn run_import(args: &ImportArgs) -> Result<()> {
    let store = open_store(&args.database.database_url, false).await?;

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &args.input {
        Some(path) if path.as_os_str() != "-" => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        _ => Box::new(tokio::io::stdin()),
    };

    let result = import(&*store, read_chunks(reader), &args.to_config())
        .await
        .context("Invalid import settings")?;
    print_json(&result)?;
    anyhow::ensure!(
        result.success,
        "Import finished with {} failed statements",
        result.errors.len()
    );
    Ok(())
}

#[cfg(feature = "remote")]
fn http_blob_store(endpoint: &str, secret: Option<&str>) -> Result<Box<dyn BlobStore>> {
    let mut blobs = dbferry_core::upload::HttpBlobStore::new(endpoint)
        .context("Invalid upload endpoint")?;
    if let Some(secret) = secret {
        blobs = blobs.with_auth(dbferry_core::SharedSecret::new(secret.to_string()));
    }
    Ok(Box::new(blobs))
}

#[cfg(not(feature = "remote"))]
fn http_blob_store(_endpoint: &str, _secret: Option<&str>) -> Result<Box<dyn BlobStore>> {
    anyhow::bail!("HTTP upload targets require the `remote` feature")
}

async fn run_upload(args: &UploadArgs) -> Result<()> {
    let blobs: Box<dyn BlobStore> = match (&args.dir, &args.endpoint) {
        (Some(dir), _) => Box::new(FsBlobStore::new(dir.clone())),
        (None, Some(endpoint)) => http_blob_store(endpoint, args.secret.as_deref())?,
        (None, None) => anyhow::bail!("Either --dir or --endpoint is required"),
    };

    let mut config = UploadConfig::new(&args.bucket).with_export(args.dump.to_config());
    if let Some(key) = &args.key {
        config = config.with_key(key);
    }
    if let Some(source) = &args.source {
        config = config.with_source(source);
    }

    let store = open_store(&args.database.database_url, true).await?;
    let receipt = upload(store, &*blobs, &config)
        .await
        .with_context(|| format!("Upload to {} could not start", blobs.name()))?;
    print_json(&receipt)?;
    anyhow::ensure!(receipt.success, "Upload of '{}' failed", receipt.key);
    Ok(())
}

#[cfg(feature = "remote")]
async fn run_clone(args: &CloneArgs) -> Result<()> {
    use dbferry_core::{
        CloneOptions, SharedSecret,
        clone::{HttpTransport, clone},
    };

    let mut options = CloneOptions::new()
        .with_clear_on_import(args.clear_on_import)
        .with_clear_after_export(args.clear_after_export)
        .with_keep_source_on_import_failure(args.keep_source_on_import_failure);
    options.clear = args.clear.to_options();
    if let Some(secret) = &args.export_auth {
        options = options.with_export_auth(SharedSecret::new(secret.clone()));
    }
    if let Some(secret) = &args.import_auth {
        options = options.with_import_auth(SharedSecret::new(secret.clone()));
    }

    let report = clone(&HttpTransport::new(), &args.source, &args.destination, &options).await;
    print_json(&report)?;
    anyhow::ensure!(
        report.success,
        "Clone failed: {}",
        report
            .error
            .as_deref()
            .unwrap_or("destination import reported errors")
    );
    Ok(())
}

async fn run_clear(args: &ClearArgs) -> Result<()> {
    let store = open_store(&args.database.database_url, false).await?;
    let result = clear(&*store, &args.clear.to_options()).await;
    print_json(&result)?;
    anyhow::ensure!(
        result.success,
        "Clear finished with {} warnings",
        result.warnings.len()
    );
    Ok(())
}
