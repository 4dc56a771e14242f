//! Shopfront Core - Shared types library.
//!
//! This crate provides common types used across all Shopfront components:
//! - `storefront` - Shopper-facing state synchronization (cart, orders, payments)
//! - `admin` - Catalog and order management wrappers
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. The backend
//! is the source of truth; these are the shapes it sends and accepts.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, statuses, contact fields and wire records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
