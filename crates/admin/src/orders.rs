//! All-orders view.

use reqwest::Method;
use tracing::{info, instrument};

use shopfront_core::{Order, OrderId, OrderItem};

use crate::AdminClient;
use crate::error::Result;

impl AdminClient {
    /// List every order the session can see.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.send_list(self.request(Method::GET, "orders")).await?)
    }

    /// Cancel a pending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses (the order is no longer
    /// pending) or the API request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: OrderId) -> Result<()> {
        self.send_unit(self.request(Method::DELETE, &format!("orders/{id}")))
            .await?;
        info!("Order cancelled by admin");
        Ok(())
    }
}

/// Combine order lines of the same product, summing quantities.
///
/// Lines whose product was deleted are kept as they are. First-seen order is
/// preserved.
#[must_use]
pub fn merge_order_items(items: &[OrderItem]) -> Vec<OrderItem> {
    let mut merged: Vec<OrderItem> = Vec::with_capacity(items.len());
    for item in items {
        let existing = item.product.as_ref().and_then(|product| {
            merged.iter().position(|line| {
                line.product.as_ref().map(|p| p.id) == Some(product.id) && line.price == item.price
            })
        });
        match existing.and_then(|index| merged.get_mut(index)) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => merged.push(item.clone()),
        }
    }
    merged
}

/// Orders whose number, phone or address contains `term` (case-insensitive).
#[must_use]
pub fn search_orders<'a>(orders: &'a [Order], term: &str) -> Vec<&'a Order> {
    let term = term.trim().to_lowercase();
    orders
        .iter()
        .filter(|order| {
            term.is_empty()
                || order.order_number.to_lowercase().contains(&term)
                || order.phone.to_lowercase().contains(&term)
                || order.address.to_lowercase().contains(&term)
        })
        .collect()
}
