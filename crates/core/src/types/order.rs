//! Order records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::catalog::Product;
use crate::types::id::OrderId;
use crate::types::price::Price;
use crate::types::status::OrderStatus;

/// An order placed by the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    /// Order endpoints name this `order_items`.
    #[serde(default, alias = "order_items")]
    pub items: Vec<OrderItem>,
    pub total_price: Price,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// One line of an order.
///
/// `price` is the unit price captured when the order was placed and never
/// changes afterwards, even if the product is repriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Denormalized snapshot; `None` when the product has since been deleted.
    #[serde(default)]
    pub product: Option<Product>,
    pub quantity: u32,
    pub price: Price,
}

impl OrderItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Body of `POST /orders`. The backend turns the current cart into the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub phone: String,
    pub address: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_accepts_order_items() {
        let json = r#"{
            "id": 5,
            "order_number": "ORD-0005",
            "status": "pending",
            "order_items": [
                {"product": {"id": 1, "name": "Pineapple", "price": "3.00"}, "quantity": 2, "price": "2.50"},
                {"product": null, "quantity": 1, "price": 4}
            ],
            "total_price": "9.00",
            "phone": "012345678",
            "address": "Street 1",
            "created_at": "2024-05-01T10:00:00.000000Z"
        }"#;

        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.item_count(), 3);
        assert!(order.items[1].product.is_none());
        // Unit price at order time, not the product's current price
        assert_eq!(order.items[0].line_total(), Price::from_cents(500));
    }
}
