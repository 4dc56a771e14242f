//! Store-level error handling with Sentry integration.
//!
//! Every store, flow and service operation returns `Result<T, StoreError>`.
//! Backend failures are wrapped unchanged so callers can still classify them
//! with [`ApiError::kind`].

use thiserror::Error;

use shopfront_core::{CartLineId, OrderId, OrderStatus, PaymentId};

use crate::api::{ApiError, FailureKind, FieldErrors};

/// Errors returned by the cart, order and payment state owners.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The cart line is not in the local cart.
    #[error("Cart line {0} not found")]
    CartLineNotFound(CartLineId),

    /// Quantities must be at least 1.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// The order is not in the local order list.
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// Only pending orders can be cancelled.
    #[error("Order {id} cannot be cancelled while {status}")]
    OrderNotCancellable { id: OrderId, status: OrderStatus },

    /// A payment is already being created or awaiting confirmation.
    #[error("A payment for order {0} is already in progress")]
    PaymentInProgress(OrderId),

    /// The order has already been paid.
    #[error("Order {0} is already paid")]
    PaymentAlreadyPaid(OrderId),

    /// The payment view was closed; open a new flow to pay again.
    #[error("Payment view for order {0} is closed")]
    PaymentViewClosed(OrderId),

    /// No payment matches the requested id.
    #[error("No active payment {0}")]
    NoActivePayment(PaymentId),

    /// Payment is no longer pending.
    #[error("Payment {0} is not pending")]
    PaymentNotPending(PaymentId),

    /// Checkout requires at least one cart line.
    #[error("Cart is empty")]
    EmptyCart,

    /// Checkout form failed local validation.
    #[error("Invalid checkout details")]
    InvalidCheckout(FieldErrors),
}

impl StoreError {
    /// Classify the error for the UI layer.
    ///
    /// Local precondition failures are business failures; an invalid checkout
    /// form is a validation failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Api(err) => err.kind(),
            Self::InvalidCheckout(_) | Self::InvalidQuantity(_) => FailureKind::Validation,
            _ => FailureKind::Business,
        }
    }

    /// Whether the surrounding application should drop the session.
    #[must_use]
    pub const fn is_session_invalid(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_session_invalid())
    }

    /// Field errors to display next to a form, local or from the backend.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::InvalidCheckout(errors) => Some(errors),
            Self::Api(err) => err.field_errors(),
            _ => None,
        }
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Capture an unexpected backend failure to Sentry.
///
/// Shopper-caused and connectivity failures are only logged by the caller.
pub fn report(err: &ApiError) {
    if err.is_unexpected() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            sentry_event_id = %event_id,
            "Unexpected backend response"
        );
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
