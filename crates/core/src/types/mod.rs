//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts and
//! the records exchanged with the backend.

pub mod cart;
pub mod catalog;
pub mod contact;
pub mod id;
pub mod order;
pub mod payment;
pub mod price;
pub mod status;

pub use cart::CartItem;
pub use catalog::{Category, Product};
pub use contact::{ContactError, DeliveryAddress, Phone};
pub use id::*;
pub use order::{NewOrder, Order, OrderItem};
pub use payment::Payment;
pub use price::Price;
pub use status::*;
