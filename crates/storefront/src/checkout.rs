//! Turning the cart into an order.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use shopfront_core::{DeliveryAddress, NewOrder, Order, Phone};

use crate::api::{FieldErrors, StorefrontApi};
use crate::error::{Result, StoreError, add_breadcrumb, report};
use crate::store::{CartStore, OrderStore};

/// Contact details entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub phone: String,
    pub address: String,
}

impl CheckoutForm {
    /// Validate the form into the body of `POST /orders`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCheckout`] with one message per invalid field.
    pub fn validate(&self) -> Result<NewOrder> {
        let mut errors = FieldErrors::new();

        let phone = Phone::parse(&self.phone)
            .map_err(|err| errors.insert(err.field().to_string(), vec![err.to_string()]))
            .ok();
        let address = DeliveryAddress::parse(&self.address)
            .map_err(|err| errors.insert(err.field().to_string(), vec![err.to_string()]))
            .ok();

        match (phone, address) {
            (Some(phone), Some(address)) => Ok(NewOrder {
                phone: phone.into_inner(),
                address: address.into_inner(),
            }),
            _ => Err(StoreError::InvalidCheckout(errors)),
        }
    }
}

/// Places orders from the current cart.
pub struct Checkout<A> {
    cart: CartStore<A>,
    orders: OrderStore<A>,
    api: Arc<A>,
}

impl<A: StorefrontApi> Checkout<A> {
    #[must_use]
    pub const fn new(api: Arc<A>, cart: CartStore<A>, orders: OrderStore<A>) -> Self {
        Self { cart, orders, api }
    }

    /// Place an order for everything in the cart.
    ///
    /// The created order is listed immediately and the local cart is cleared.
    /// A failed cart clear is only logged: the backend already consumed the
    /// cart into the order.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidCheckout`] if the form is invalid
    /// - [`StoreError::EmptyCart`] if the local cart has no lines
    /// - the backend error of `POST /orders`
    #[instrument(skip(self, form))]
    pub async fn place_order(&self, form: &CheckoutForm) -> Result<Order> {
        let new_order = form.validate()?;

        if self.cart.snapshot().is_empty() {
            return Err(StoreError::EmptyCart);
        }

        add_breadcrumb("checkout", "Place order", None);

        let order = self
            .api
            .create_order(new_order)
            .await
            .inspect_err(|err| {
                warn!(error = %err, "Failed to create order");
                report(err);
            })?;

        info!(order_id = %order.id, order_number = %order.order_number, "Order placed");
        self.orders.add_order(order.clone());

        if let Err(err) = self.cart.clear_all().await {
            warn!(error = %err, "Order placed but cart clear failed");
        }

        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, cart_item, order, product};
    use shopfront_core::OrderStatus;

    fn form(phone: &str, address: &str) -> CheckoutForm {
        CheckoutForm {
            phone: phone.to_string(),
            address: address.to_string(),
        }
    }

    async fn checkout_with_cart(
        api: &Arc<FakeApi>,
    ) -> (Checkout<FakeApi>, CartStore<FakeApi>, OrderStore<FakeApi>) {
        api.set_cart(vec![cart_item(1, product(10, 500, 5), 2)]);
        let cart = CartStore::new(Arc::clone(api));
        cart.fetch().await.unwrap();
        let orders = OrderStore::new(Arc::clone(api));
        let checkout = Checkout::new(Arc::clone(api), cart.clone(), orders.clone());
        (checkout, cart, orders)
    }

    #[test]
    fn test_validate_reports_every_field() {
        let err = form("123", "abc").validate().unwrap_err();
        let errors = err.field_errors().unwrap();
        assert!(errors.contains_key("phone"));
        assert!(errors.contains_key("address"));
    }

    #[test]
    fn test_validate_trims() {
        let new_order = form("  012345678 ", " Street 5 ").validate().unwrap();
        assert_eq!(new_order.phone, "012345678");
        assert_eq!(new_order.address, "Street 5");
    }

    #[tokio::test]
    async fn test_place_order_lists_order_and_clears_cart() {
        let api = Arc::new(FakeApi::default());
        api.set_created_order(order(42, OrderStatus::Pending));
        let (checkout, cart, orders) = checkout_with_cart(&api).await;

        let placed = checkout
            .place_order(&form("012345678", "Street 5"))
            .await
            .unwrap();

        assert_eq!(placed.id, shopfront_core::OrderId::new(42));
        assert_eq!(orders.orders()[0].id, placed.id);
        assert!(cart.snapshot().is_empty());
        assert_eq!(api.calls("clear_cart"), 1);
    }

    #[tokio::test]
    async fn test_place_order_survives_clear_failure() {
        let api = Arc::new(FakeApi::default());
        api.set_created_order(order(42, OrderStatus::Pending));
        api.fail("clear_cart");
        let (checkout, cart, _orders) = checkout_with_cart(&api).await;

        assert!(checkout.place_order(&form("012345678", "Street 5")).await.is_ok());
        assert!(cart.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_and_invalid_form_skip_backend() {
        let api = Arc::new(FakeApi::default());
        let cart = CartStore::new(Arc::clone(&api));
        let orders = OrderStore::new(Arc::clone(&api));
        let checkout = Checkout::new(Arc::clone(&api), cart, orders);

        let err = checkout
            .place_order(&form("012345678", "Street 5"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyCart));

        let err = checkout.place_order(&form("1", "Street 5")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCheckout(_)));

        assert_eq!(api.calls("create_order"), 0);
    }

    #[tokio::test]
    async fn test_create_failure_keeps_cart() {
        let api = Arc::new(FakeApi::default());
        api.fail("create_order");
        let (checkout, cart, orders) = checkout_with_cart(&api).await;

        assert!(checkout.place_order(&form("012345678", "Street 5")).await.is_err());
        assert_eq!(cart.total_count(), 2);
        assert!(orders.orders().is_empty());
    }
}
