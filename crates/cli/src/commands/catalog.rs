//! Catalog browsing commands.

use shopfront_core::ProductId;
use shopfront_storefront::{ApiError, Storefront};

/// List every product.
#[allow(clippy::print_stdout)]
pub async fn list_products(storefront: &Storefront) -> Result<(), ApiError> {
    let products = storefront.api().get_products().await?;

    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }

    for product in &products {
        let stock = if product.in_stock() {
            format!("{} in stock", product.stock)
        } else {
            "out of stock".to_string()
        };
        println!(
            "{:>5}  {:<40} {:>10}  {stock}",
            product.id, product.name, product.price
        );
    }
    Ok(())
}

/// Show one product.
#[allow(clippy::print_stdout)]
pub async fn show_product(storefront: &Storefront, id: ProductId) -> Result<(), ApiError> {
    let product = storefront.api().get_product(id).await?;

    println!("{} (#{})", product.name, product.id);
    println!("  Price:    {}", product.price);
    println!("  Stock:    {}", product.stock);
    if let Some(category_id) = product.category_id {
        println!("  Category: {category_id}");
    }
    if let Some(description) = &product.description {
        println!();
        println!("{description}");
    }
    Ok(())
}

/// List every category.
#[allow(clippy::print_stdout)]
pub async fn list_categories(storefront: &Storefront) -> Result<(), ApiError> {
    for category in storefront.api().get_categories().await? {
        match &category.description {
            Some(description) => println!("{:>5}  {}  - {description}", category.id, category.name),
            None => println!("{:>5}  {}", category.id, category.name),
        }
    }
    Ok(())
}
