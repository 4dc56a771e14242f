//! Shopfront admin library.
//!
//! Thin form-to-endpoint wrappers for catalog and order management. Nothing
//! here is optimistic: each call goes to the backend and its answer is
//! returned as-is, including HTTP 422 field errors.
//!
//! # Modules
//!
//! - [`categories`] - Category CRUD
//! - [`products`] - Product CRUD with multipart image upload
//! - [`orders`] - All-orders view and cancellation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod categories;
mod client;
pub mod error;
pub mod orders;
pub mod products;

pub use categories::CategoryInput;
pub use client::AdminClient;
pub use error::AdminError;
pub use products::{ImageUpload, ProductInput};
