//! Admin API client.

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use shopfront_storefront::api::{ApiClient, ApiError, Session};
use shopfront_storefront::config::ApiConfig;

/// Client for the admin endpoints.
///
/// Shares transport, envelope handling and the catalog cache with
/// [`ApiClient`]; catalog mutations invalidate that cache. Cheap to clone.
///
/// # Security
///
/// Requires a session belonging to an admin user. The backend answers 403
/// otherwise, which surfaces as [`ApiError::Unauthorized`].
#[derive(Clone)]
pub struct AdminClient {
    api: ApiClient,
}

impl AdminClient {
    /// Create a new admin client.
    ///
    /// # Errors
    ///
    /// Returns an error if the session token is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &ApiConfig, session: &Session) -> Result<Self, ApiError> {
        Ok(Self {
            api: ApiClient::new(config, session)?,
        })
    }

    /// Wrap an existing API client.
    #[must_use]
    pub const fn from_api(api: ApiClient) -> Self {
        Self { api }
    }

    /// The underlying API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.api.request(method, path)
    }

    pub(crate) async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &'static str,
    ) -> Result<T, ApiError> {
        self.api.send_data(request, what).await
    }

    pub(crate) async fn send_list<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, ApiError> {
        Ok(self
            .api
            .send::<Vec<T>>(request)
            .await?
            .data
            .unwrap_or_default())
    }

    pub(crate) async fn send_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.api.send_unit(request).await
    }
}
