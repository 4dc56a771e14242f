//! Backend REST API access.
//!
//! # Architecture
//!
//! - The backend is the source of truth; stores only mirror it
//! - Every response is wrapped in `{ success, data, message }`
//! - Catalog reads are cached in-process via `moka`; cart, order and payment
//!   calls are never cached (mutable state)
//! - The stores talk to the backend through the [`StorefrontApi`] trait so
//!   they can be driven by a scripted fake in tests
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::api::{ApiClient, Session};
//!
//! let client = ApiClient::new(&config.api, &Session::bearer(token))?;
//! let products = client.get_products().await?;
//! ```

mod cache;
mod client;
mod session;

pub use client::ApiClient;
pub use session::Session;

use std::collections::BTreeMap;
use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use shopfront_core::{
    CartItem, CartLineId, NewOrder, Order, OrderId, Payment, PaymentId, PaymentStatus, ProductId,
};

/// Field name to messages, exactly as the backend reported them.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response: connection, TLS or timeout failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 422 with field-level messages.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: FieldErrors,
    },

    /// The backend answered but refused the operation.
    ///
    /// `status` is `None` when the HTTP call succeeded and the envelope
    /// carried `success: false`.
    #[error("Request rejected: {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    /// HTTP 401/403: the session is no longer valid.
    #[error("Session invalid (HTTP {0})")]
    Unauthorized(u16),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A successful envelope had no `data` where the endpoint must return some.
    #[error("No data in response: {0}")]
    MissingData(&'static str),

    /// The session token cannot be sent as a header.
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Failure categories the UI layer reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No usable response. Retry later.
    Network,
    /// Field errors to display next to the form.
    Validation,
    /// The backend refused the operation.
    Business,
    /// The session must be re-established.
    Auth,
}

impl ApiError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Http(_) | Self::RateLimited(_) | Self::Parse(_) | Self::MissingData(_) => {
                FailureKind::Network
            }
            Self::Validation { .. } => FailureKind::Validation,
            Self::Rejected { .. } => FailureKind::Business,
            Self::Unauthorized(_) | Self::InvalidHeader(_) => FailureKind::Auth,
        }
    }

    /// Whether the surrounding application should drop the session.
    #[must_use]
    pub const fn is_session_invalid(&self) -> bool {
        matches!(self.kind(), FailureKind::Auth)
    }

    /// Field errors of a validation failure.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Whether the error points at a backend or protocol defect rather than
    /// at the shopper's input or connectivity.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        match self {
            Self::Parse(_) | Self::MissingData(_) => true,
            Self::Rejected {
                status: Some(status),
                ..
            } => *status >= 500,
            _ => false,
        }
    }
}

/// The response envelope every endpoint uses.
///
/// Payment endpoints put the record under `payment` instead of `data`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(alias = "payment")]
    pub data: Option<T>,
    pub message: Option<String>,
}

const fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    /// Envelope for a successful response without a body.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
        }
    }
}

/// The backend operations the stores depend on.
///
/// Implemented by [`ApiClient`]; tests substitute an in-memory fake.
/// `success: false` envelopes surface as [`ApiError::Rejected`], so an `Ok`
/// always means the backend accepted the operation.
pub trait StorefrontApi: Send + Sync + 'static {
    /// `GET /cart`
    fn get_cart(&self) -> impl Future<Output = Result<Vec<CartItem>, ApiError>> + Send;

    /// `POST /cart`
    fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `PUT /cart/{cartLineId}`
    fn update_cart_line(
        &self,
        line_id: CartLineId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE /cart/product/{productId}`
    fn remove_cart_product(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE /cart/clear`
    fn clear_cart(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `GET /orders`
    fn get_orders(&self) -> impl Future<Output = Result<Vec<Order>, ApiError>> + Send;

    /// `GET /orders/{id}`
    fn get_order(&self, order_id: OrderId) -> impl Future<Output = Result<Order, ApiError>> + Send;

    /// `POST /orders`
    fn create_order(&self, order: NewOrder)
    -> impl Future<Output = Result<Order, ApiError>> + Send;

    /// `DELETE /orders/{id}`
    fn cancel_order(&self, order_id: OrderId) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /payment/{orderId}`
    fn create_payment(
        &self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Payment, ApiError>> + Send;

    /// `GET /payment/{paymentId}`
    fn check_payment(
        &self,
        payment_id: PaymentId,
    ) -> impl Future<Output = Result<PaymentStatus, ApiError>> + Send;

    /// `POST /payment/{paymentId}/cancel`
    fn cancel_payment(
        &self,
        payment_id: PaymentId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
