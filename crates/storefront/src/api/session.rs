//! Explicit session credential for the API client.
//!
//! The token is handed to [`ApiClient::new`](super::ApiClient::new) by the
//! application instead of being read from ambient storage, so every request
//! a client sends carries exactly the credential it was built with.

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::api::ApiError;
use crate::config::ApiConfig;

/// The shopper's credential. Anonymous sessions can only browse the catalog.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<SecretString>,
}

impl Session {
    /// A session without a credential.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { token: None }
    }

    /// A session authenticated with a bearer token.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
        }
    }

    /// The session configured through `SHOPFRONT_API_TOKEN`, if any.
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            token: config.token.clone(),
        }
    }

    /// Whether requests will carry a credential.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// `Authorization` header value, marked sensitive so it never shows up
    /// in request debug output.
    pub(crate) fn authorization_header(&self) -> Result<Option<HeaderValue>, ApiError> {
        let Some(token) = &self.token else {
            return Ok(None);
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
        value.set_sensitive(true);
        Ok(Some(value))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_no_header() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert!(session.authorization_header().unwrap().is_none());
    }

    #[test]
    fn test_bearer_header() {
        let session = Session::bearer("abc123");
        let header = session.authorization_header().unwrap().unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer abc123");
        assert!(header.is_sensitive());
    }

    #[test]
    fn test_bearer_rejects_newlines() {
        let session = Session::bearer("abc\n123");
        assert!(matches!(
            session.authorization_header(),
            Err(ApiError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug_output = format!("{:?}", Session::bearer("super_secret_token"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token"));
    }
}
