//! Catalog and order management commands.
//!
//! # Usage
//!
//! ```bash
//! shopfront admin categories create --name Snacks --description "Dried fruit and nuts"
//! shopfront admin products update 12 --name "Dried Mango" --price 4.75 --stock 30 --category-id 3 --image mango.webp
//! shopfront admin orders list --search 0123
//! ```

use std::path::PathBuf;

use shopfront_admin::orders::{merge_order_items, search_orders};
use shopfront_admin::{AdminClient, AdminError, CategoryInput, ImageUpload, ProductInput};
use shopfront_core::{CategoryId, OrderId, ProductId};

use super::print_field_errors;

/// List categories.
#[allow(clippy::print_stdout)]
pub async fn list_categories(admin: &AdminClient) -> Result<(), AdminError> {
    for category in admin.list_categories().await? {
        println!("{:>5}  {}", category.id, category.name);
    }
    Ok(())
}

/// Create a category.
#[allow(clippy::print_stdout)]
pub async fn create_category(
    admin: &AdminClient,
    name: String,
    description: Option<String>,
) -> Result<(), AdminError> {
    let input = CategoryInput { name, description };
    let category = admin
        .create_category(&input)
        .await
        .inspect_err(show_field_errors)?;
    println!("Created category {} ({})", category.name, category.id);
    Ok(())
}

/// Update a category.
#[allow(clippy::print_stdout)]
pub async fn update_category(
    admin: &AdminClient,
    id: CategoryId,
    name: String,
    description: Option<String>,
) -> Result<(), AdminError> {
    let input = CategoryInput { name, description };
    let category = admin
        .update_category(id, &input)
        .await
        .inspect_err(show_field_errors)?;
    println!("Updated category {} ({})", category.name, category.id);
    Ok(())
}

/// Delete a category.
#[allow(clippy::print_stdout)]
pub async fn delete_category(admin: &AdminClient, id: CategoryId) -> Result<(), AdminError> {
    admin.delete_category(id).await?;
    println!("Deleted category {id}");
    Ok(())
}

/// List products, including out-of-stock ones.
#[allow(clippy::print_stdout)]
pub async fn list_products(admin: &AdminClient) -> Result<(), AdminError> {
    for product in admin.list_products().await? {
        println!(
            "{:>5}  {:<40} {:>10}  stock {}",
            product.id, product.name, product.price, product.stock
        );
    }
    Ok(())
}

/// Create a product, or update it when `id` is given.
#[allow(clippy::print_stdout)]
pub async fn save_product(
    admin: &AdminClient,
    id: Option<ProductId>,
    (input, image): (ProductInput, Option<PathBuf>),
) -> Result<(), AdminError> {
    let image = match image {
        Some(path) => Some(ImageUpload::from_path(path).await?),
        None => None,
    };

    let product = match id {
        Some(id) => admin.update_product(id, &input, image).await,
        None => admin.create_product(&input, image).await,
    }
    .inspect_err(show_field_errors)?;

    println!("Saved product {} ({})", product.name, product.id);
    Ok(())
}

/// Delete a product.
#[allow(clippy::print_stdout)]
pub async fn delete_product(admin: &AdminClient, id: ProductId) -> Result<(), AdminError> {
    admin.delete_product(id).await?;
    println!("Deleted product {id}");
    Ok(())
}

/// List all orders, optionally filtered.
#[allow(clippy::print_stdout)]
pub async fn list_orders(admin: &AdminClient, search: Option<&str>) -> Result<(), AdminError> {
    let orders = admin.list_orders().await?;
    let shown = search_orders(&orders, search.unwrap_or_default());

    for order in shown {
        println!(
            "{:>5}  {}  {:<10} {:>10}  {}  {}",
            order.id, order.order_number, order.status, order.total_price, order.phone, order.address
        );
        for item in merge_order_items(&order.items) {
            let name = item
                .product
                .as_ref()
                .map_or("(deleted product)", |product| product.name.as_str());
            println!("         {:>3} x {name} @ {}", item.quantity, item.price);
        }
    }
    Ok(())
}

/// Cancel any order.
#[allow(clippy::print_stdout)]
pub async fn cancel_order(admin: &AdminClient, order_id: OrderId) -> Result<(), AdminError> {
    admin.cancel_order(order_id).await?;
    println!("Order {order_id} cancelled.");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn show_field_errors(err: &AdminError) {
    if let Some(errors) = err.field_errors() {
        println!("The backend rejected the input:");
        print_field_errors(errors);
    }
}
