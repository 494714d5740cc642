//! Clone orchestrator.
//!
//! Copies one store into another through their remote export, import and
//! clear operations. No local store is involved: the source's export body
//! is forwarded chunk by chunk as the destination's import body.
//!
//! The transport is a trait so a caller can clone over any request/response
//! channel; [`HttpTransport`] speaks to endpoints exposing
//! `GET <base>/export`, `POST <base>/import` and `POST <base>/clear`.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::Result;
use crate::config::{ClearOptions, CloneOptions};
use crate::error::redact_url;
use crate::models::{ClearResult, CloneClearResults, CloneReport, ImportResult};
use crate::security::SharedSecret;

/// Boxed stream of dump bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Remote operations a clone run needs.
///
/// Any non-success response must be returned as an error; it is not retried.
#[async_trait]
pub trait CloneTransport: Send + Sync {
    /// Requests a clear of `endpoint`.
    async fn clear(
        &self,
        endpoint: &str,
        options: &ClearOptions,
        auth: Option<&SharedSecret>,
    ) -> Result<ClearResult>;

    /// Opens the export stream of `endpoint`.
    async fn export(&self, endpoint: &str, auth: Option<&SharedSecret>) -> Result<ByteStream>;

    /// Sends `body` to the import operation of `endpoint` and parses its result.
    async fn import(
        &self,
        endpoint: &str,
        body: ByteStream,
        auth: Option<&SharedSecret>,
    ) -> Result<ImportResult>;
}

/// Clones `source` into `destination`.
///
/// Overall success is exactly the destination import's success flag. A
/// transport failure in a required step ends the run with `success = false`
/// and an error message. A failed source clear is only a warning. The source
/// clear runs whenever it is requested and the import returned a result,
/// unless `keep_source_on_import_failure` holds it back after a failed one.
pub async fn clone(
    transport: &dyn CloneTransport,
    source: &str,
    destination: &str,
    options: &CloneOptions,
) -> CloneReport {
    tracing::info!(
        "Cloning {} into {}",
        redact_url(source),
        redact_url(destination)
    );
    let mut report = CloneReport::default();
    let mut clear_results = CloneClearResults::default();
    let import_auth = options.import_auth.as_ref();
    let export_auth = options.export_auth.as_ref();

    if options.clear_on_import {
        match transport.clear(destination, &options.clear, import_auth).await {
            Ok(result) => {
                if !result.success {
                    report.warnings.push(format!(
                        "Destination clear reported {} warnings",
                        result.warnings.len()
                    ));
                }
                clear_results.destination = Some(result);
            }
            Err(e) => {
                return fail(report, "Destination clear failed", &e.to_report_string());
            }
        }
    }

    let body = match transport.export(source, export_auth).await {
        Ok(body) => body,
        Err(e) => return fail(report, "Source export failed", &e.to_report_string()),
    };

    let import_result = match transport.import(destination, body, import_auth).await {
        Ok(result) => result,
        Err(e) => return fail(report, "Destination import failed", &e.to_report_string()),
    };
    report.success = import_result.success;

    if options.clear_after_export {
        if import_result.success || !options.keep_source_on_import_failure {
            match transport.clear(source, &options.clear, export_auth).await {
                Ok(result) => clear_results.source = Some(result),
                Err(e) => {
                    let warning = format!("Source clear failed: {}", e.to_report_string());
                    tracing::warn!("{}", warning);
                    report.warnings.push(warning);
                }
            }
        } else {
            report
                .warnings
                .push("Source clear skipped because the import did not succeed".to_string());
        }
    }

    if clear_results.destination.is_some() || clear_results.source.is_some() {
        report.clear_results = Some(clear_results);
    }
    tracing::info!(
        "Clone finished (success: {}, {} statements)",
        report.success,
        import_result.executed_statements
    );
    report.import_result = Some(import_result);
    report
}

fn fail(mut report: CloneReport, step: &str, message: &str) -> CloneReport {
    tracing::error!("{}: {}", step, message);
    report.success = false;
    report.error = Some(format!("{}: {}", step, message));
    report
}

#[cfg(feature = "remote")]
pub use http_transport::HttpTransport;

#[cfg(feature = "remote")]
mod http_transport {
    use async_trait::async_trait;
    use futures::{StreamExt, TryStreamExt};
    use url::Url;

    use super::{ByteStream, CloneTransport};
    use crate::Result;
    use crate::config::ClearOptions;
    use crate::error::{DbFerryError, redact_url};
    use crate::models::{ClearResult, ImportResult};
    use crate::security::{SharedSecret, basic_auth_header};

    /// [`CloneTransport`] over HTTP using reqwest.
    ///
    /// Secrets are sent as `Basic` credentials; no timeouts are applied.
    #[derive(Debug, Clone, Default)]
    pub struct HttpTransport {
        client: reqwest::Client,
    }

    impl HttpTransport {
        /// Creates a transport with a fresh client.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a transport reusing `client`.
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    /// Joins `operation` onto an endpoint base URL.
    pub(crate) fn route(endpoint: &str, operation: &str) -> Result<Url> {
        let mut url = Url::parse(endpoint).map_err(|e| {
            DbFerryError::configuration(format!(
                "Invalid endpoint '{}': {}",
                redact_url(endpoint),
                e
            ))
        })?;
        url.path_segments_mut()
            .map_err(|()| DbFerryError::configuration("Endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(operation);
        Ok(url)
    }

    fn authorize(
        request: reqwest::RequestBuilder,
        auth: Option<&SharedSecret>,
    ) -> reqwest::RequestBuilder {
        match auth {
            Some(secret) => request.header(reqwest::header::AUTHORIZATION, basic_auth_header(secret)),
            None => request,
        }
    }

    async fn send(
        request: reqwest::RequestBuilder,
        endpoint: &str,
        operation: &str,
    ) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            DbFerryError::transport(format!(
                "{} request to {} failed: {}",
                operation,
                redact_url(endpoint),
                e.without_url()
            ))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DbFerryError::transport(format!(
                "{} request to {} returned status {}",
                operation,
                redact_url(endpoint),
                status
            )));
        }
        Ok(response)
    }

    #[async_trait]
    impl CloneTransport for HttpTransport {
        async fn clear(
            &self,
            endpoint: &str,
            options: &ClearOptions,
            auth: Option<&SharedSecret>,
        ) -> Result<ClearResult> {
            let request = self
                .client
                .post(route(endpoint, "clear")?)
                .query(&options.to_query_pairs());
            let response = send(authorize(request, auth), endpoint, "Clear").await?;
            response.json().await.map_err(|e| {
                DbFerryError::transport(format!("Invalid clear response: {}", e.without_url()))
            })
        }

        async fn export(&self, endpoint: &str, auth: Option<&SharedSecret>) -> Result<ByteStream> {
            let request = self.client.get(route(endpoint, "export")?);
            let response = send(authorize(request, auth), endpoint, "Export").await?;
            let body = response.bytes_stream().map_err(|e| {
                DbFerryError::transport(format!("Export stream failed: {}", e.without_url()))
            });
            Ok(body.boxed())
        }

        async fn import(
            &self,
            endpoint: &str,
            body: ByteStream,
            auth: Option<&SharedSecret>,
        ) -> Result<ImportResult> {
            let request = self
                .client
                .post(route(endpoint, "import")?)
                .header(reqwest::header::CONTENT_TYPE, "application/sql")
                .body(reqwest::Body::wrap_stream(body));
            let response = send(authorize(request, auth), endpoint, "Import").await?;
            response.json().await.map_err(|e| {
                DbFerryError::transport(format!("Invalid import response: {}", e.without_url()))
            })
        }
    }

}
