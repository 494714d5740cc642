//! Filesystem blob store.
//!
//! Objects live at `<root>/<bucket>/<key>`. The body is written to a
//! `.partial` file that is renamed into place only after exactly the declared
//! number of bytes arrived; metadata goes to a `<key>.meta.json` sidecar.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::{BlobStore, SizedBody};
use crate::Result;
use crate::error::DbFerryError;
use crate::models::{UploadDescriptor, UploadMetadata};

/// Sidecar suffix for upload metadata.
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`. The directory must exist before upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the on-disk path of `bucket`/`key`.
    ///
    /// # Errors
    /// Returns a storage error for keys that would escape the bucket.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(DbFerryError::storage(format!(
                "Invalid object location '{}/{}'",
                bucket, key
            )));
        }
        Ok(self.root.join(bucket).join(relative))
    }

    /// Reads the metadata sidecar of an uploaded object.
    pub async fn read_metadata(&self, bucket: &str, key: &str) -> Result<UploadMetadata> {
        let path = with_suffix(&self.object_path(bucket, key)?, METADATA_SUFFIX);
        let raw = tokio::fs::read(&path).await.map_err(|e| DbFerryError::Io {
            context: format!("Failed to read metadata for '{}'", key),
            source: e,
        })?;
        serde_json::from_slice(&raw).map_err(|e| DbFerryError::Serialization {
            context: format!("Invalid metadata for '{}'", key),
            source: e,
        })
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> DbFerryError {
    let context = context.into();
    move |source| DbFerryError::Io { context, source }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn name(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn check_target(&self, bucket: &str) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.root).await.map_err(|_| {
            DbFerryError::storage(format!(
                "Storage root '{}' does not exist",
                self.root.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(DbFerryError::storage(format!(
                "Storage root '{}' is not a directory",
                self.root.display()
            )));
        }
        self.object_path(bucket, "probe").map(|_| ())
    }

    async fn put(&self, descriptor: &UploadDescriptor, mut body: SizedBody) -> Result<u64> {
        let path = self.object_path(&descriptor.bucket, &descriptor.key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error("Failed to create bucket directory"))?;
        }

        let partial = with_suffix(&path, ".partial");
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(io_error("Failed to create object file"))?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let outcome = match chunk {
                Ok(chunk) => {
                    written = written.saturating_add(chunk.len() as u64);
                    file.write_all(&chunk)
                        .await
                        .map_err(io_error("Failed to write object file"))
                }
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    tracing::warn!("Failed to remove partial upload: {}", cleanup);
                }
                return Err(e);
            }
        }

        file.flush()
            .await
            .map_err(io_error("Failed to flush object file"))?;
        file.sync_all()
            .await
            .map_err(io_error("Failed to sync object file"))?;
        drop(file);

        tokio::fs::rename(&partial, &path)
            .await
            .map_err(io_error("Failed to move object into place"))?;

        let sidecar = serde_json::to_vec_pretty(&descriptor.metadata).map_err(|e| {
            DbFerryError::Serialization {
                context: "Failed to encode upload metadata".to_string(),
                source: e,
            }
        })?;
        tokio::fs::write(with_suffix(&path, METADATA_SUFFIX), sidecar)
            .await
            .map_err(io_error("Failed to write metadata sidecar"))?;

        tracing::debug!("Stored {} bytes at {}", written, path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_rejects_traversal() {
        let store = FsBlobStore::new("/tmp/blobs");
        assert!(store.object_path("b", "dumps/a.sql").is_ok());
        assert!(store.object_path("b", "../a.sql").is_err());
        assert!(store.object_path("b", "/etc/passwd").is_err());
        assert!(store.object_path("b", "").is_err());
        assert!(store.object_path("a/b", "x.sql").is_err());
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("/x/dump.sql"), METADATA_SUFFIX),
            PathBuf::from("/x/dump.sql.meta.json")
        );
    }

    #[tokio::test]
    async fn test_check_target_requires_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(store.check_target("bucket").await.is_ok());

        let missing = FsBlobStore::new(dir.path().join("missing"));
        assert!(matches!(
            missing.check_target("bucket").await,
            Err(DbFerryError::Storage { .. })
        ));
    }
}
