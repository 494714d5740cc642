//! Exact-size upload.
//!
//! Blob sinks need the content length before the first byte is sent, but an
//! export's length is only known once it has been generated. The upload
//! therefore runs the export twice:
//!
//! 1. measure: drain a full export, counting bytes and discarding them
//! 2. transmit: run the export again and pipe it through a bounded channel
//!    into [`BlobStore::put`], wrapped in a [`SizedBody`] that fails unless
//!    exactly the measured number of bytes flows through
//!
//! Both passes share one [`ExportConfig`], including its `generated_at`, so
//! an unchanged store yields identical bytes. Memory stays bounded by the
//! channel capacity plus one INSERT batch.
//!
//! # Module Structure
//! - `sized`: length-enforcing body adapter
//! - `fs`: filesystem blob store
//! - `http`: HTTP `PUT` blob store (feature `remote`)

pub mod fs;
#[cfg(feature = "remote")]
pub mod http;
pub mod sized;

pub use fs::FsBlobStore;
#[cfg(feature = "remote")]
pub use http::HttpBlobStore;
pub use sized::SizedBody;

use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};

use crate::Result;
use crate::config::{ExportConfig, UploadConfig};
use crate::export::export;
use crate::models::{UploadDescriptor, UploadMetadata, UploadReceipt};
use crate::store::DumpStore;

/// A length-declaring blob sink.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Display name for logs (credentials redacted).
    fn name(&self) -> String;

    /// Verifies that `bucket` can be written before any export work starts.
    ///
    /// # Errors
    /// Returns a storage error when the target is missing or unusable.
    async fn check_target(&self, bucket: &str) -> Result<()>;

    /// Writes `body` under the descriptor's bucket and key.
    ///
    /// Implementations must not leave a visible object behind when `body`
    /// yields an error. Returns the number of bytes stored.
    async fn put(&self, descriptor: &UploadDescriptor, body: SizedBody) -> Result<u64>;
}

/// Runs a full export and returns its length in bytes.
///
/// # Errors
/// Returns the export's terminal error, if any.
pub async fn measure(store: Arc<dyn DumpStore>, config: &ExportConfig) -> Result<u64> {
    let mut stream = export(store, config.clone())?;
    let mut size: u64 = 0;
    while let Some(chunk) = stream.next().await {
        size = size.saturating_add(chunk?.len() as u64);
    }
    Ok(size)
}

/// Exports `store` into `blobs` using the two-pass protocol.
///
/// Export and transmit failures, including a size mismatch between the
/// passes, are reported in the receipt with `success = false`.
///
/// # Errors
/// Returns an error before any export work when the configuration is
/// invalid or the destination target is unusable.
pub async fn upload(
    store: Arc<dyn DumpStore>,
    blobs: &dyn BlobStore,
    config: &UploadConfig,
) -> Result<UploadReceipt> {
    config.validate()?;
    blobs.check_target(&config.bucket).await?;

    let source = config.source.clone().unwrap_or_else(|| store.source_name());
    let key = config.resolve_key(&source);
    let mut receipt = UploadReceipt {
        key: key.clone(),
        ..UploadReceipt::default()
    };
    tracing::info!("Uploading dump of {} to {} as '{}'", source, blobs.name(), key);

    let size = match measure(Arc::clone(&store), &config.export).await {
        Ok(size) => size,
        Err(e) => {
            let warning = format!("Export failed while measuring: {}", e.to_report_string());
            tracing::error!("{}", warning);
            receipt.warnings.push(warning);
            return Ok(receipt);
        }
    };
    receipt.size = size;
    tracing::debug!("Measured dump size: {} bytes", size);

    let metadata = UploadMetadata {
        generated_at: config.export.generated_at,
        source,
        declared_size: size,
        dump_id: uuid::Uuid::new_v4(),
    };
    let descriptor = UploadDescriptor {
        bucket: config.bucket.clone(),
        key,
        content_length: size,
        metadata: metadata.clone(),
    };

    let mut stream = export(store, config.export.clone())?;
    let (mut sender, receiver) = mpsc::channel(config.channel_capacity);

    let producer = async move {
        while let Some(chunk) = stream.next().await {
            let failed = chunk.is_err();
            if sender.send(chunk).await.is_err() || failed {
                break;
            }
        }
        stream.progress()
    };
    let consumer = blobs.put(&descriptor, SizedBody::new(receiver, size));

    let (summary, stored) = futures::join!(producer, consumer);
    receipt.warnings.extend(summary.warnings);

    match stored {
        Ok(written) => {
            tracing::info!("Upload of '{}' complete: {} bytes", receipt.key, written);
            receipt.success = true;
            receipt.metadata = Some(metadata);
        }
        Err(e) => {
            let warning = format!("Upload failed: {}", e.to_report_string());
            tracing::error!("{}", warning);
            receipt.warnings.push(warning);
        }
    }
    Ok(receipt)
}
