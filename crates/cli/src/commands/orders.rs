//! Order and checkout commands.

use shopfront_core::{Order, OrderId};
use shopfront_storefront::{CheckoutForm, StoreError, Storefront};

use super::print_field_errors;

/// List the shopper's orders, newest first.
#[allow(clippy::print_stdout)]
pub async fn list(storefront: &Storefront) -> Result<(), StoreError> {
    let orders = storefront.orders();
    orders.fetch_orders().await?;

    let state = orders.snapshot();
    if state.orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in &state.orders {
        print_order(order);
    }
    println!("{} active order(s)", state.active_orders_count());
    Ok(())
}

/// Cancel a pending order.
#[allow(clippy::print_stdout)]
pub async fn cancel(storefront: &Storefront, order_id: OrderId) -> Result<(), StoreError> {
    let orders = storefront.orders();
    orders.fetch_orders().await?;
    orders.cancel_order_by_id(order_id).await?;
    println!("Order {order_id} cancelled.");
    Ok(())
}

/// Place an order for the current cart.
#[allow(clippy::print_stdout)]
pub async fn checkout(
    storefront: &Storefront,
    phone: String,
    address: String,
) -> Result<(), StoreError> {
    storefront.cart().fetch().await?;

    let form = CheckoutForm { phone, address };
    let order = storefront
        .checkout()
        .place_order(&form)
        .await
        .inspect_err(|err| {
            if let Some(errors) = err.field_errors() {
                println!("Please fix the following:");
                print_field_errors(errors);
            }
        })?;

    print_order(&order);
    println!("Pay with: shopfront pay {}", order.id);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_order(order: &Order) {
    println!(
        "{:>5}  {}  {:<10} {:>3} item(s)  {:>10}  {}",
        order.id,
        order.order_number,
        order.status,
        order.item_count(),
        order.total_price,
        order.created_at.format("%Y-%m-%d %H:%M"),
    );
}
