//! CLI command implementations.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod pay;

use shopfront_core::ProductId;
use shopfront_storefront::api::FieldErrors;
use thiserror::Error;

/// Errors raised by the CLI itself, before anything reaches the backend.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The requested quantity exceeds what is left in stock.
    #[error("Only {available} of product {product_id} left in stock ({in_cart} already in cart)")]
    OutOfStock {
        product_id: ProductId,
        available: u32,
        in_cart: u32,
    },

    /// The payment ended without being paid.
    #[error("Payment {0}")]
    PaymentNotCompleted(String),
}

/// Print validation errors one field per line.
#[allow(clippy::print_stdout)]
pub fn print_field_errors(errors: &FieldErrors) {
    for (field, messages) in errors {
        for message in messages {
            println!("  {field}: {message}");
        }
    }
}
