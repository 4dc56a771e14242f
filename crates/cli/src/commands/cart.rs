//! Cart commands.
//!
//! Every command starts from a fresh `GET /cart` so the local mirror matches
//! the backend before it is changed.

use shopfront_core::{CartLineId, ProductId};
use shopfront_storefront::{StoreError, Storefront};

use super::CommandError;

/// Print the cart.
pub async fn show(storefront: &Storefront) -> Result<(), StoreError> {
    storefront.cart().fetch().await?;
    print_cart(storefront);
    Ok(())
}

/// Add units of a product, refusing more than the stock allows.
pub async fn add(
    storefront: &Storefront,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let cart = storefront.cart();
    cart.fetch().await?;

    let product = storefront.api().get_product(product_id).await?;
    let in_cart = cart
        .snapshot()
        .line_for_product(product_id)
        .map_or(0, |line| line.quantity);

    if in_cart.saturating_add(quantity) > product.stock {
        return Err(CommandError::OutOfStock {
            product_id,
            available: product.stock,
            in_cart,
        }
        .into());
    }

    cart.add_item(product_id, quantity).await?;
    tracing::info!("Added {quantity} x {}", product.name);
    print_cart(storefront);
    Ok(())
}

/// Set the quantity of a cart line.
pub async fn update(
    storefront: &Storefront,
    line_id: CartLineId,
    quantity: u32,
) -> Result<(), StoreError> {
    storefront.cart().fetch().await?;
    storefront.cart().update_item(line_id, quantity).await?;
    print_cart(storefront);
    Ok(())
}

/// Remove a product from the cart.
pub async fn remove(storefront: &Storefront, product_id: ProductId) -> Result<(), StoreError> {
    storefront.cart().fetch().await?;
    storefront.cart().remove_item(product_id).await?;
    print_cart(storefront);
    Ok(())
}

/// Empty the cart.
pub async fn clear(storefront: &Storefront) -> Result<(), StoreError> {
    storefront.cart().clear_all().await?;
    tracing::info!("Cart cleared");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(storefront: &Storefront) {
    let state = storefront.cart().snapshot();

    if state.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for line in &state.items {
        println!(
            "{:>5}  {:<40} {:>3} x {:>10} = {:>10}",
            line.id,
            line.product.name,
            line.quantity,
            line.product.price,
            line.line_total()
        );
    }
    let total: shopfront_core::Price = state.items.iter().map(|line| line.line_total()).sum();
    println!("{} item(s), total {total}", state.total_count);
}
