//! Exact-size upload integration tests.
//!
//! This test suite covers:
//! - Byte-identical regeneration with a shared configuration
//! - Filesystem uploads with metadata sidecars
//! - Size mismatches caused by data drift between passes
//! - Unusable targets rejected before any export work

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use common::{FaultyStore, dump_text, seeded_store};
use dbferry_core::{
    DumpStore, ExportConfig, Result, UploadConfig,
    upload::{FsBlobStore, measure, upload},
};

// ============================================================================
// Determinism
// ============================================================================

/// Test that two exports sharing one config are byte-identical
#[tokio::test]
async fn test_regeneration_is_byte_identical() -> Result<()> {
    let store: Arc<dyn DumpStore> = Arc::new(seeded_store().await);
    let config = ExportConfig::new()
        .with_max_rows_per_statement(2)
        .with_page_size(1);

    let first = dump_text(Arc::clone(&store), config.clone()).await?;
    let second = dump_text(Arc::clone(&store), config.clone()).await?;

    assert_eq!(first, second);
    assert_eq!(measure(store, &config).await?, first.len() as u64);

    Ok(())
}

// ============================================================================
// Filesystem uploads
// ============================================================================

/// Test a successful upload and its sidecar metadata
#[tokio::test]
async fn test_fs_upload_writes_exact_size() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = FsBlobStore::new(dir.path());
    let store: Arc<dyn DumpStore> = Arc::new(seeded_store().await);
    let config = UploadConfig::new("backups");

    let receipt = upload(store, &blobs, &config).await?;

    assert!(receipt.success, "warnings: {:?}", receipt.warnings);
    let expected_key = format!(
        "dumps/_memory_/{}.sql",
        config.export.generated_at.format("%Y%m%dT%H%M%SZ")
    );
    assert_eq!(receipt.key, expected_key);

    let path = blobs.object_path("backups", &receipt.key)?;
    let stored = std::fs::read(&path).expect("object should exist");
    assert_eq!(stored.len() as u64, receipt.size);
    assert!(stored.starts_with(b"-- dbferry SQL dump"));

    let metadata = blobs.read_metadata("backups", &receipt.key).await?;
    assert_eq!(metadata.declared_size, receipt.size);
    assert_eq!(metadata.source, ":memory:");
    assert_eq!(metadata.generated_at, config.export.generated_at);
    assert_eq!(receipt.metadata, Some(metadata));

    Ok(())
}

/// Test that explicit keys and sources override the derived ones
#[tokio::test]
async fn test_fs_upload_with_explicit_key() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = FsBlobStore::new(dir.path());
    let store: Arc<dyn DumpStore> = Arc::new(seeded_store().await);
    let config = UploadConfig::new("backups")
        .with_key("nightly/latest.sql")
        .with_source("primary");

    let receipt = upload(store, &blobs, &config).await?;

    assert!(receipt.success);
    assert_eq!(receipt.key, "nightly/latest.sql");
    assert!(dir.path().join("backups/nightly/latest.sql").exists());
    let metadata = blobs.read_metadata("backups", "nightly/latest.sql").await?;
    assert_eq!(metadata.source, "primary");

    Ok(())
}

/// Test that data changing between passes fails the upload and leaves nothing behind
#[tokio::test]
async fn test_drift_between_passes_fails_cleanly() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = FsBlobStore::new(dir.path());
    let mut faulty = FaultyStore::new(seeded_store().await);
    faulty.drifting = true;
    let store: Arc<dyn DumpStore> = Arc::new(faulty);
    let config = UploadConfig::new("backups").with_key("drift.sql");

    let receipt = upload(store, &blobs, &config).await?;

    assert!(!receipt.success);
    assert!(receipt.metadata.is_none());
    assert!(
        receipt.warnings.iter().any(|w| w.starts_with("Upload failed")),
        "warnings: {:?}",
        receipt.warnings
    );

    let path = blobs.object_path("backups", "drift.sql")?;
    assert!(!path.exists());
    assert!(!dir.path().join("backups/drift.sql.partial").exists());

    Ok(())
}

/// Test that a terminal export failure during measurement is reported in the receipt
#[tokio::test]
async fn test_measure_failure_reported() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = FsBlobStore::new(dir.path());
    let mut faulty = FaultyStore::new(seeded_store().await);
    faulty.fail_catalog = true;
    let store: Arc<dyn DumpStore> = Arc::new(faulty);

    let receipt = upload(store, &blobs, &UploadConfig::new("backups")).await?;

    assert!(!receipt.success);
    assert_eq!(receipt.size, 0);
    assert!(receipt.warnings[0].contains("measuring"));

    Ok(())
}

/// Test that a missing storage root is rejected before exporting
#[tokio::test]
async fn test_missing_root_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = FsBlobStore::new(dir.path().join("absent"));
    let store: Arc<dyn DumpStore> = Arc::new(seeded_store().await);

    let result = upload(store, &blobs, &UploadConfig::new("backups")).await;
    assert!(result.is_err());
}
