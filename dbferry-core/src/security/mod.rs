//! Shared-secret authorization.
//!
//! - `secret`: zeroizing container for the shared secret
//! - `gate`: the credential gate that authorizes inbound requests
//!
//! # Security Guarantees
//! - The secret is cleared from memory when dropped
//! - The secret never appears in `Debug` output or logs
//! - Comparison time does not depend on where a candidate first differs

mod gate;
mod secret;

pub use gate::{CredentialGate, Operation, basic_auth_header, decode_basic};
pub use secret::SharedSecret;

/// Query parameter that may carry the shared secret.
pub const SECRET_QUERY_PARAM: &str = "secret";
