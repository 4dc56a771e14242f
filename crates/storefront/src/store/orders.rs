//! Order list mirror with optimistic cancellation.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use shopfront_core::{Order, OrderId, OrderStatus};

use crate::api::StorefrontApi;
use crate::error::{Result, StoreError, add_breadcrumb, report};
use crate::store::KeyedLocks;

/// Snapshot of the shopper's orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrdersState {
    /// Newest first.
    pub orders: Vec<Order>,
    /// Whether a fetch is in flight.
    pub loading: bool,
}

impl OrdersState {
    /// Orders that are not cancelled.
    #[must_use]
    pub fn active_orders_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|order| order.status.is_active())
            .count()
    }

    /// The order with id `order_id`, if loaded.
    #[must_use]
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == order_id)
    }
}

/// Owner of the local order list.
///
/// Cheap to clone; clones share state.
pub struct OrderStore<A> {
    inner: Arc<OrderStoreInner<A>>,
}

struct OrderStoreInner<A> {
    api: Arc<A>,
    state: watch::Sender<OrdersState>,
    locks: KeyedLocks<OrderId>,
}

impl<A> Clone for OrderStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: StorefrontApi> OrderStore<A> {
    /// Create an empty order list.
    #[must_use]
    pub fn new(api: Arc<A>) -> Self {
        let (state, _) = watch::channel(OrdersState::default());
        Self {
            inner: Arc::new(OrderStoreInner {
                api,
                state,
                locks: KeyedLocks::new(),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> OrdersState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrdersState> {
        self.inner.state.subscribe()
    }

    /// Current orders, newest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.inner.state.borrow().orders.clone()
    }

    /// Number of orders that are not cancelled.
    #[must_use]
    pub fn active_orders_count(&self) -> usize {
        self.inner.state.borrow().active_orders_count()
    }

    /// Replace the order list from the backend.
    ///
    /// On failure the previous list is kept.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn fetch_orders(&self) -> Result<()> {
        self.inner.state.send_modify(|state| state.loading = true);

        let result = self.inner.api.get_orders().await;

        self.inner.state.send_modify(|state| {
            if let Ok(orders) = &result {
                state.orders.clone_from(orders);
            }
            state.loading = false;
        });

        match result {
            Ok(orders) => {
                debug!(count = orders.len(), "Orders fetched");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch orders, keeping previous list");
                report(&err);
                Err(err.into())
            }
        }
    }

    /// Show a just-created order without a round trip.
    ///
    /// Replaces an order with the same id if one is already listed.
    pub fn add_order(&self, order: Order) {
        self.inner.state.send_modify(|state| {
            state.orders.retain(|existing| existing.id != order.id);
            state.orders.insert(0, order);
        });
    }

    /// Cancel a pending order.
    ///
    /// The order reads `cancelled` immediately. If the backend fails or
    /// refuses, it reads `pending` again before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`StoreError::OrderNotFound`] if the order is not in the local list
    /// - [`StoreError::OrderNotCancellable`] if it is not pending
    /// - the backend error, after rollback
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order_by_id(&self, order_id: OrderId) -> Result<()> {
        let _guard = self.inner.locks.lock(order_id).await;
        add_breadcrumb(
            "orders",
            "Cancel order",
            Some(&[("order_id", order_id.to_string().as_str())]),
        );

        self.set_status(order_id, |status| match status {
            OrderStatus::Pending => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::OrderNotCancellable {
                id: order_id,
                status: other,
            }),
        })?;

        if let Err(err) = self.inner.api.cancel_order(order_id).await {
            warn!(error = %err, "Order cancellation failed, rolling back to pending");
            report(&err);
            // Nothing else moves the order while its key is held.
            let _ = self.set_status(order_id, |_| Ok(OrderStatus::Pending));
            return Err(err.into());
        }

        info!("Order cancelled");
        Ok(())
    }

    fn set_status(
        &self,
        order_id: OrderId,
        transition: impl FnOnce(OrderStatus) -> Result<OrderStatus>,
    ) -> Result<()> {
        let mut outcome = Err(StoreError::OrderNotFound(order_id));
        self.inner.state.send_if_modified(|state| {
            let Some(order) = state.orders.iter_mut().find(|order| order.id == order_id) else {
                return false;
            };
            match transition(order.status) {
                Ok(next) => {
                    order.status = next;
                    outcome = Ok(());
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });
        outcome
    }
}
