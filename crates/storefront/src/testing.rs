//! Scripted in-memory backend and fixtures for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::DateTime;

use shopfront_core::{
    CartItem, CartLineId, NewOrder, Order, OrderId, OrderStatus, Payment, PaymentId,
    PaymentStatus, Price, Product, ProductId,
};

use crate::api::{ApiError, StorefrontApi};

/// Backend double with per-operation failure switches, delays and a call log.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    cart: Vec<CartItem>,
    orders: Vec<Order>,
    created_order: Option<Order>,
    payment: Option<Payment>,
    payment_statuses: VecDeque<Result<PaymentStatus, ApiError>>,
    failing: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
    calls: Vec<String>,
}

impl FakeApi {
    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_cart(&self, items: Vec<CartItem>) {
        self.with_state(|state| state.cart = items);
    }

    pub fn set_orders(&self, orders: Vec<Order>) {
        self.with_state(|state| state.orders = orders);
    }

    pub fn set_created_order(&self, order: Order) {
        self.with_state(|state| state.created_order = Some(order));
    }

    pub fn set_payment(&self, payment: Payment) {
        self.with_state(|state| state.payment = Some(payment));
    }

    /// Queue the result of the next status check. Once drained, checks
    /// report `pending`.
    pub fn push_payment_status(&self, status: Result<PaymentStatus, ApiError>) {
        self.with_state(|state| state.payment_statuses.push_back(status));
    }

    /// Make every call to `op` answer `success: false`.
    pub fn fail(&self, op: &'static str) {
        self.with_state(|state| state.failing.insert(op));
    }

    /// Delay every call to `op`.
    pub fn delay(&self, op: &'static str, delay: Duration) {
        self.with_state(|state| state.delays.insert(op, delay));
    }

    /// Number of calls made to `op`.
    pub fn calls(&self, op: &str) -> usize {
        self.with_state(|state| {
            state
                .calls
                .iter()
                .filter(|call| call.split(' ').next() == Some(op))
                .count()
        })
    }

    /// Every call in issue order, with its arguments.
    pub fn call_log(&self) -> Vec<String> {
        self.with_state(|state| state.calls.clone())
    }

    async fn enter(&self, op: &'static str, call: String) -> Result<(), ApiError> {
        let (delay, failing) = self.with_state(|state| {
            state.calls.push(call);
            (state.delays.get(op).copied(), state.failing.contains(op))
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(ApiError::Rejected {
                status: None,
                message: format!("{op} failed"),
            });
        }
        Ok(())
    }
}

impl StorefrontApi for FakeApi {
    async fn get_cart(&self) -> Result<Vec<CartItem>, ApiError> {
        self.enter("get_cart", "get_cart".to_string()).await?;
        Ok(self.with_state(|state| state.cart.clone()))
    }

    async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        self.enter("add_to_cart", format!("add_to_cart {product_id} {quantity}"))
            .await
    }

    async fn update_cart_line(&self, line_id: CartLineId, quantity: u32) -> Result<(), ApiError> {
        self.enter(
            "update_cart_line",
            format!("update_cart_line {line_id} {quantity}"),
        )
        .await
    }

    async fn remove_cart_product(&self, product_id: ProductId) -> Result<(), ApiError> {
        self.enter(
            "remove_cart_product",
            format!("remove_cart_product {product_id}"),
        )
        .await
    }

    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.enter("clear_cart", "clear_cart".to_string()).await
    }

    async fn get_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.enter("get_orders", "get_orders".to_string()).await?;
        Ok(self.with_state(|state| state.orders.clone()))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order, ApiError> {
        self.enter("get_order", format!("get_order {order_id}"))
            .await?;
        self.with_state(|state| {
            state
                .orders
                .iter()
                .find(|order| order.id == order_id)
                .cloned()
                .ok_or_else(|| ApiError::Rejected {
                    status: Some(404),
                    message: "Order not found".to_string(),
                })
        })
    }

    async fn create_order(&self, new_order: NewOrder) -> Result<Order, ApiError> {
        self.enter(
            "create_order",
            format!("create_order {} {}", new_order.phone, new_order.address),
        )
        .await?;
        Ok(self.with_state(|state| {
            state
                .created_order
                .clone()
                .unwrap_or_else(|| order(1, OrderStatus::Pending))
        }))
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<(), ApiError> {
        self.enter("cancel_order", format!("cancel_order {order_id}"))
            .await
    }

    async fn create_payment(&self, order_id: OrderId) -> Result<Payment, ApiError> {
        self.enter("create_payment", format!("create_payment {order_id}"))
            .await?;
        Ok(self.with_state(|state| {
            state
                .payment
                .clone()
                .unwrap_or_else(|| payment(7, order_id.as_i64()))
        }))
    }

    async fn check_payment(&self, payment_id: PaymentId) -> Result<PaymentStatus, ApiError> {
        self.enter("check_payment", format!("check_payment {payment_id}"))
            .await?;
        self.with_state(|state| {
            state
                .payment_statuses
                .pop_front()
                .unwrap_or(Ok(PaymentStatus::Pending))
        })
    }

    async fn cancel_payment(&self, payment_id: PaymentId) -> Result<(), ApiError> {
        self.enter("cancel_payment", format!("cancel_payment {payment_id}"))
            .await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn product(id: i64, price_cents: i64, stock: u32) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Price::from_cents(price_cents),
        stock,
        description: None,
        image_url: None,
        category_id: None,
    }
}

pub fn cart_item(line_id: i64, product: Product, quantity: u32) -> CartItem {
    CartItem {
        id: CartLineId::new(line_id),
        product,
        quantity,
    }
}

pub fn order(id: i64, status: OrderStatus) -> Order {
    Order {
        id: OrderId::new(id),
        order_number: format!("ORD-{id:05}"),
        status,
        items: Vec::new(),
        total_price: Price::from_cents(1000),
        phone: "012345678".to_string(),
        address: "Street 5".to_string(),
        created_at: DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default(),
    }
}

pub fn payment(id: i64, order_id: i64) -> Payment {
    Payment {
        id: PaymentId::new(id),
        order_id: OrderId::new(order_id),
        status: PaymentStatus::Pending,
        qr_string: Some("00020101021229370016".to_string()),
    }
}
