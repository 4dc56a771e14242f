//! REST client for the storefront backend.
//!
//! Uses `reqwest` for HTTP and unwraps the `{ success, data, message }`
//! envelope. Catalog reads are cached using `moka`.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, instrument};
use url::Url;

use shopfront_core::{
    CartItem, CartLineId, Category, NewOrder, Order, OrderId, Payment, PaymentId, PaymentStatus,
    Product, ProductId,
};

use crate::api::cache::{CacheKey, CacheValue};
use crate::api::{ApiError, Envelope, FieldErrors, Session, StorefrontApi};
use crate::config::ApiConfig;

/// Message used when a 422 body carries none.
const DEFAULT_VALIDATION_MESSAGE: &str = "The given data was invalid.";

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront backend.
///
/// Cheap to clone; clones share the connection pool and the catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

/// Body of a 422 response.
#[derive(Debug, Default, Deserialize)]
struct ValidationBody {
    message: Option<String>,
    #[serde(default)]
    errors: FieldErrors,
}

/// `data` of a payment status check. Only the status is merged locally.
#[derive(Debug, Deserialize)]
struct PaymentStatusBody {
    status: PaymentStatus,
}

#[derive(Debug, serde::Serialize)]
struct AddToCartBody {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Debug, serde::Serialize)]
struct QuantityBody {
    quantity: u32,
}

impl ApiClient {
    /// Create a new API client bound to one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session token is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &ApiConfig, session: &Session) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(authorization) = session.authorization_header()? {
            headers.insert(AUTHORIZATION, authorization);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// The base URL endpoint paths are appended to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Start a request to `path` (relative to the base URL, may carry a query).
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.inner.client.request(method, url)
    }

    /// Send a request and unwrap the envelope.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Http`] when no response arrives
    /// - [`ApiError::Unauthorized`] on 401/403
    /// - [`ApiError::Validation`] on 422, with the field errors verbatim
    /// - [`ApiError::RateLimited`] on 429
    /// - [`ApiError::Rejected`] on any other non-2xx, or `success: false`
    /// - [`ApiError::Parse`] when a 2xx body is not a valid envelope
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(status.as_u16()));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let validation: ValidationBody = serde_json::from_str(&body).unwrap_or_default();
            return Err(ApiError::Validation {
                message: validation
                    .message
                    .unwrap_or_else(|| DEFAULT_VALIDATION_MESSAGE.to_string()),
                errors: validation.errors,
            });
        }

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<IgnoredAny>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| format!("HTTP {status}: {}", truncate(&body, 200)));

            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %truncate(&body, 500),
                    "Backend returned a server error"
                );
            }

            return Err(ApiError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Envelope::empty());
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body, 500),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })?;

        if !envelope.success {
            return Err(ApiError::Rejected {
                status: None,
                message: envelope
                    .message
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            });
        }

        Ok(envelope)
    }

    /// Send a request whose envelope must carry `data`.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`ApiError::MissingData`] when `data`
    /// is absent or null.
    pub async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &'static str,
    ) -> Result<T, ApiError> {
        self.send::<T>(request)
            .await?
            .data
            .ok_or(ApiError::MissingData(what))
    }

    /// Send a request whose response body is irrelevant beyond success.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    pub async fn send_unit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send::<IgnoredAny>(request).await.map(|_| ())
    }

    // =========================================================================
    // Catalog Methods (cached)
    // =========================================================================

    /// List all products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self) -> Result<Vec<Product>, ApiError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Vec<Product> = self
            .send::<Vec<Product>>(self.request(Method::GET, "products"))
            .await?
            .data
            .unwrap_or_default();

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(product_id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .send_data(
                self.request(Method::GET, &format!("products/{product_id}")),
                "product",
            )
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self
            .send::<Vec<Category>>(self.request(Method::GET, "categories"))
            .await?
            .data
            .unwrap_or_default();

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate a cached product and the product listing.
    pub async fn invalidate_product(&self, product_id: ProductId) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(product_id))
            .await;
        self.inner.cache.invalidate(&CacheKey::Products).await;
    }

    /// Invalidate the cached category listing.
    pub async fn invalidate_categories(&self) {
        self.inner.cache.invalidate(&CacheKey::Categories).await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

// =============================================================================
// Cart, Order and Payment Methods (not cached - mutable state)
// =============================================================================

impl StorefrontApi for ApiClient {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<Vec<CartItem>, ApiError> {
        let envelope = self
            .send::<Vec<CartItem>>(self.request(Method::GET, "cart"))
            .await?;
        Ok(envelope.data.unwrap_or_default())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        let body = AddToCartBody {
            product_id,
            quantity,
        };
        self.send_unit(self.request(Method::POST, "cart").json(&body))
            .await
    }

    #[instrument(skip(self), fields(line_id = %line_id))]
    async fn update_cart_line(&self, line_id: CartLineId, quantity: u32) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, &format!("cart/{line_id}"))
                .json(&QuantityBody { quantity }),
        )
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_cart_product(&self, product_id: ProductId) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::DELETE, &format!("cart/product/{product_id}")))
            .await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::DELETE, "cart/clear"))
            .await
    }

    #[instrument(skip(self))]
    async fn get_orders(&self) -> Result<Vec<Order>, ApiError> {
        let envelope = self
            .send::<Vec<Order>>(self.request(Method::GET, "orders"))
            .await?;
        Ok(envelope.data.unwrap_or_default())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: OrderId) -> Result<Order, ApiError> {
        self.send_data(
            self.request(Method::GET, &format!("orders/{order_id}")),
            "order",
        )
        .await
    }

    #[instrument(skip(self, order))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, ApiError> {
        self.send_data(self.request(Method::POST, "orders").json(&order), "order")
            .await
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn cancel_order(&self, order_id: OrderId) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::DELETE, &format!("orders/{order_id}")))
            .await
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn create_payment(&self, order_id: OrderId) -> Result<Payment, ApiError> {
        self.send_data(
            self.request(Method::POST, &format!("payment/{order_id}")),
            "payment",
        )
        .await
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn check_payment(&self, payment_id: PaymentId) -> Result<PaymentStatus, ApiError> {
        let body: PaymentStatusBody = self
            .send_data(
                self.request(Method::GET, &format!("payment/{payment_id}")),
                "payment",
            )
            .await?;
        Ok(body.status)
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn cancel_payment(&self, payment_id: PaymentId) -> Result<(), ApiError> {
        self.send_unit(self.request(Method::POST, &format!("payment/{payment_id}/cancel")))
            .await
    }
}

/// First `max` characters of a response body, for logs and messages.
fn truncate(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
