//! Auth module - authorization headers, credentials and token negotiation.
//!
//! The crate never signs anything itself. Signing lives behind two seams:
//! - [`AuthProvider`] - turns a URL into a ready-to-send header string
//! - [`TokenEndpoints`] - produces the signed URLs of the token handshake
//!
//! [`AuthFlow`] drives that handshake over a multiplexer and
//! [`CredentialStore`] persists its result.

mod credentials;
mod flow;

pub use credentials::{CredentialStore, Credentials, JsonFileStore};
pub use flow::{AuthFlow, AuthState, TokenEndpoints};

/// Supplies the authorization header for a request URL.
///
/// The returned string is sent as-is and must be a complete header
/// (`Authorization: ...`).
pub trait AuthProvider {
    /// Authorization header for `url`.
    fn authorization_header(&self, url: &str) -> String;
}

impl<F> AuthProvider for F
where
    F: Fn(&str) -> String,
{
    fn authorization_header(&self, url: &str) -> String {
        self(url)
    }
}

/// Provider returning the same pre-formatted header for every URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAuth {
    header: String,
}

impl StaticAuth {
    /// Create a provider from a complete header string.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl AuthProvider for StaticAuth {
    fn authorization_header(&self, _url: &str) -> String {
        self.header.clone()
    }
}
