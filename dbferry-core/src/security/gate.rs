//! Credential gate for inbound export/import/clear/dump requests.
//!
//! A single shared secret guards every operation. It may be presented as the
//! password (or whole credential) of a `Basic` authorization header, or as
//! the `secret` query parameter. Read-only operations can be opened to
//! anonymous callers with [`CredentialGate::with_public_read`].

use base64::Engine;
use http::Request;

use super::{SECRET_QUERY_PARAM, SharedSecret};
use crate::error::DbFerryError;

/// Operations a caller-owned router dispatches to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Stream a dump of the store
    Export,
    /// Apply a dump to the store
    Import,
    /// Empty the store
    Clear,
    /// Export into blob storage
    Dump,
}

impl Operation {
    /// True for operations that neither mutate the store nor write elsewhere.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Export)
    }
}

/// Shared-secret authorization check.
#[derive(Debug, Clone, Default)]
pub struct CredentialGate {
    secret: Option<SharedSecret>,
    public_read: bool,
}

impl CredentialGate {
    /// Creates a gate. `None` (or an empty secret) authorizes everything.
    pub fn new(secret: Option<SharedSecret>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            public_read: false,
        }
    }

    /// Builder method to let read-only operations through without credentials.
    pub fn with_public_read(mut self, public_read: bool) -> Self {
        self.public_read = public_read;
        self
    }

    /// True when a secret is configured.
    pub fn is_enforcing(&self) -> bool {
        self.secret.is_some()
    }

    /// Authorizes an HTTP request for `operation`.
    pub fn authorize<B>(&self, request: &Request<B>, operation: Operation) -> bool {
        let authorization = request
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        self.authorize_parts(authorization, request.uri().query(), operation)
    }

    /// Authorizes from a raw `Authorization` header value and query string.
    pub fn authorize_parts(
        &self,
        authorization: Option<&str>,
        query: Option<&str>,
        operation: Operation,
    ) -> bool {
        let Some(secret) = &self.secret else {
            return true;
        };

        if self.public_read && operation.is_read_only() {
            return true;
        }

        let header_ok = authorization
            .and_then(|header| decode_basic(header).ok())
            .is_some_and(|(whole, password)| {
                secret.matches(&whole) || password.is_some_and(|p| secret.matches(&p))
            });

        let query_ok = query.is_some_and(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .any(|(key, value)| key == SECRET_QUERY_PARAM && secret.matches(&value))
        });

        if !(header_ok || query_ok) {
            tracing::warn!("Rejected unauthorized {:?} request", operation);
        }
        header_ok || query_ok
    }

    /// Like [`authorize`](Self::authorize) but returns `DbFerryError::Unauthorized`.
    ///
    /// # Errors
    /// Returns `Unauthorized` when the request carries no accepted credential.
    pub fn check<B>(&self, request: &Request<B>, operation: Operation) -> crate::Result<()> {
        if self.authorize(request, operation) {
            Ok(())
        } else {
            Err(DbFerryError::Unauthorized)
        }
    }
}

/// Decodes a `Basic` authorization header value.
///
/// Returns the whole decoded credential and, when it contains `:`, the
/// password part after the first colon.
///
/// # Errors
/// Returns `Unauthorized` for other schemes, malformed base64 or non-UTF-8
/// credentials.
pub fn decode_basic(header: &str) -> crate::Result<(String, Option<String>)> {
    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or(DbFerryError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case("basic") || encoded.trim().contains(' ') {
        return Err(DbFerryError::Unauthorized);
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| DbFerryError::Unauthorized)?;
    let credential = String::from_utf8(decoded).map_err(|_| DbFerryError::Unauthorized)?;
    let password = credential
        .split_once(':')
        .map(|(_, password)| password.to_string());
    Ok((credential, password))
}

/// Builds a `Basic` authorization header value carrying `secret` as password.
pub fn basic_auth_header(secret: &SharedSecret) -> String {
    let credential = format!("dbferry:{}", secret.expose());
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credential)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(secret: &str) -> CredentialGate {
        CredentialGate::new(Some(SharedSecret::new(secret.to_string())))
    }

    fn request(auth: Option<&str>, uri: &str) -> Request<()> {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(http::header::AUTHORIZATION, auth);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_gate_without_secret_accepts_everything() {
        let gate = CredentialGate::new(None);
        assert!(!gate.is_enforcing());
        assert!(gate.authorize(&request(None, "http://h/import"), Operation::Import));

        let empty = CredentialGate::new(Some(SharedSecret::new(String::new())));
        assert!(empty.authorize(&request(None, "http://h/clear"), Operation::Clear));
    }

    #[test]
    fn test_gate_rejects_missing_or_wrong_credential() {
        let gate = gate("hunter2");
        assert!(!gate.authorize(&request(None, "http://h/import"), Operation::Import));

        // base64("user:wrong")
        let wrong = request(Some("Basic dXNlcjp3cm9uZw=="), "http://h/import");
        assert!(!gate.authorize(&wrong, Operation::Import));
        assert!(matches!(
            gate.check(&wrong, Operation::Import),
            Err(DbFerryError::Unauthorized)
        ));

        let wrong_query = request(None, "http://h/import?secret=nope");
        assert!(!gate.authorize(&wrong_query, Operation::Import));
    }

    #[test]
    fn test_gate_accepts_basic_auth_password() {
        let gate = gate("hunter2");
        // base64("user:hunter2")
        let req = request(Some("Basic dXNlcjpodW50ZXIy"), "http://h/import");
        assert!(gate.authorize(&req, Operation::Import));
        assert!(gate.check(&req, Operation::Import).is_ok());
    }

    #[test]
    fn test_gate_accepts_whole_basic_credential() {
        let gate = gate("hunter2");
        // base64("hunter2")
        let req = request(Some("Basic aHVudGVyMg=="), "http://h/clear");
        assert!(gate.authorize(&req, Operation::Clear));
    }

    #[test]
    fn test_gate_accepts_query_parameter() {
        let gate = gate("hunter 2");
        let req = request(None, "http://h/import?table=x&secret=hunter%202");
        assert!(gate.authorize(&req, Operation::Import));
    }

    #[test]
    fn test_gate_public_read_only_covers_read_only_operations() {
        let gate = gate("hunter2").with_public_read(true);
        assert!(gate.authorize(&request(None, "http://h/export"), Operation::Export));
        assert!(!gate.authorize(&request(None, "http://h/import"), Operation::Import));
        assert!(!gate.authorize(&request(None, "http://h/dump"), Operation::Dump));
    }

    #[test]
    fn test_decode_basic() {
        // base64encode("username:password") == "dXNlcm5hbWU6cGFzc3dvcmQ="
        let (whole, password) = decode_basic("Basic dXNlcm5hbWU6cGFzc3dvcmQ=").unwrap();
        assert_eq!(whole, "username:password");
        assert_eq!(password.as_deref(), Some("password"));

        assert!(decode_basic("Basic dXNlcm5hbWU6 cGFzc3dvcmQ=").is_err());
        assert!(decode_basic("Digest dXNlcm5hbWU6cGFzc3dvcmQ=").is_err());
        assert!(decode_basic("Basic").is_err());
        assert!(decode_basic("Basic !!!").is_err());
    }

    #[test]
    fn test_basic_auth_header_round_trip() {
        let secret = SharedSecret::new("s3cret".to_string());
        let header = basic_auth_header(&secret);
        assert!(gate("s3cret").authorize_parts(Some(&header), None, Operation::Import));
    }
}
