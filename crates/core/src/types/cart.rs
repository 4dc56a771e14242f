//! Cart line record.

use serde::{Deserialize, Serialize};

use crate::types::catalog::Product;
use crate::types::id::CartLineId;
use crate::types::price::Price;

/// One line of the shopper's cart.
///
/// `id` is assigned by the backend when the line is created; a locally
/// merged line keeps the id it was fetched with. `quantity <= product.stock`
/// is enforced by whoever issues the mutation, not by the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartLineId,
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}
