//! HTTP blob store: `PUT` with a declared `Content-Length`.

use async_trait::async_trait;
use url::Url;

use super::{BlobStore, SizedBody};
use crate::Result;
use crate::error::{DbFerryError, redact_url};
use crate::models::UploadDescriptor;
use crate::security::{SharedSecret, basic_auth_header};

/// Blob store reached over HTTP at `<endpoint>/<bucket>/<key>`.
///
/// Upload metadata travels as `x-dbferry-*` request headers.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: Url,
    auth: Option<SharedSecret>,
}

impl HttpBlobStore {
    /// Creates a store for `endpoint`.
    ///
    /// # Errors
    /// Returns a configuration error if `endpoint` is not an http(s) URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            DbFerryError::configuration(format!(
                "Invalid blob endpoint '{}': {}",
                redact_url(endpoint),
                e
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DbFerryError::configuration(
                "Blob endpoint must use http:// or https://",
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            auth: None,
        })
    }

    /// Builder method to authenticate uploads with a shared secret.
    pub fn with_auth(mut self, secret: SharedSecret) -> Self {
        self.auth = Some(secret);
        self
    }

    /// Full object URL for `bucket`/`key`.
    ///
    /// # Errors
    /// Returns a configuration error if the endpoint cannot carry a path.
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| DbFerryError::configuration("Blob endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn name(&self) -> String {
        redact_url(self.endpoint.as_str())
    }

    async fn check_target(&self, bucket: &str) -> Result<()> {
        self.object_url(bucket, "probe").map(|_| ())
    }

    async fn put(&self, descriptor: &UploadDescriptor, body: SizedBody) -> Result<u64> {
        let url = self.object_url(&descriptor.bucket, &descriptor.key)?;
        let metadata = &descriptor.metadata;

        let mut request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, descriptor.content_length)
            .header(reqwest::header::CONTENT_TYPE, "application/sql")
            .header("x-dbferry-generated-at", metadata.generated_at.to_rfc3339())
            .header("x-dbferry-source", metadata.source.as_str())
            .header("x-dbferry-declared-size", metadata.declared_size)
            .header("x-dbferry-dump-id", metadata.dump_id.to_string())
            .body(reqwest::Body::wrap_stream(body));
        if let Some(secret) = &self.auth {
            request = request.header(reqwest::header::AUTHORIZATION, basic_auth_header(secret));
        }

        let response = request.send().await.map_err(|e| {
            DbFerryError::storage(format!("Upload request failed: {}", e.without_url()))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DbFerryError::storage(format!(
                "Blob endpoint rejected upload with status {}",
                status
            )));
        }
        Ok(descriptor.content_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url() {
        let store = HttpBlobStore::new("https://blobs.example.com/v1/").unwrap();
        let url = store.object_url("backups", "dumps/app db/x.sql").unwrap();
        assert_eq!(
            url.as_str(),
            "https://blobs.example.com/v1/backups/dumps/app%20db/x.sql"
        );
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(HttpBlobStore::new("ftp://example.com").is_err());
        assert!(HttpBlobStore::new("not a url").is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let store = HttpBlobStore::new("http://localhost:9000")
            .unwrap()
            .with_auth(SharedSecret::new("hunter2".to_string()));
        assert!(!format!("{:?}", store).contains("hunter2"));
    }
}
