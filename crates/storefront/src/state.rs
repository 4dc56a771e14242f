//! Application handle owning the stores.

use std::sync::Arc;

use shopfront_core::OrderId;

use crate::api::{ApiClient, ApiError, Session, StorefrontApi};
use crate::checkout::Checkout;
use crate::config::{PaymentSettings, StorefrontConfig};
use crate::error::add_breadcrumb;
use crate::payment::PaymentFlow;
use crate::store::{CartStore, OrderStore};

/// The storefront's client-side state.
///
/// Constructed once at application start and handed to every view. This
/// struct is cheaply cloneable via `Arc`; all clones see the same cart and
/// order list.
pub struct Storefront<A = ApiClient> {
    inner: Arc<StorefrontInner<A>>,
}

struct StorefrontInner<A> {
    api: Arc<A>,
    payment: PaymentSettings,
    cart: CartStore<A>,
    orders: OrderStore<A>,
}

impl<A> Clone for Storefront<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Storefront<ApiClient> {
    /// Create the storefront state for one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built for the session.
    pub fn new(config: &StorefrontConfig, session: &Session) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api, session)?;
        Ok(Self::with_api(Arc::new(api), config.payment))
    }
}

impl<A: StorefrontApi> Storefront<A> {
    /// Create the storefront state on top of any backend implementation.
    #[must_use]
    pub fn with_api(api: Arc<A>, payment: PaymentSettings) -> Self {
        let cart = CartStore::new(Arc::clone(&api));
        let orders = OrderStore::new(Arc::clone(&api));

        Self {
            inner: Arc::new(StorefrontInner {
                api,
                payment,
                cart,
                orders,
            }),
        }
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore<A> {
        &self.inner.cart
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn orders(&self) -> &OrderStore<A> {
        &self.inner.orders
    }

    /// Payment polling settings.
    #[must_use]
    pub fn payment_settings(&self) -> PaymentSettings {
        self.inner.payment
    }

    /// Open the payment view for an order.
    ///
    /// Polling stops when the returned flow is dropped.
    #[must_use]
    pub fn payment_flow(&self, order_id: OrderId) -> PaymentFlow<A> {
        PaymentFlow::new(
            Arc::clone(&self.inner.api),
            self.inner.orders.clone(),
            order_id,
            self.inner.payment,
        )
    }

    /// Checkout service over this storefront's cart and orders.
    #[must_use]
    pub fn checkout(&self) -> Checkout<A> {
        Checkout::new(
            Arc::clone(&self.inner.api),
            self.inner.cart.clone(),
            self.inner.orders.clone(),
        )
    }

    /// Drop local session state on logout. Does not call the backend.
    pub fn logout(&self) {
        add_breadcrumb("session", "Logged out", None);
        self.inner.cart.reset_cart();
    }
}
