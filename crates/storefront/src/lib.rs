//! Shopfront storefront library.
//!
//! Client-side state synchronization for the shopper: a local, optimistically
//! updated mirror of the backend's cart and orders, and the payment
//! confirmation flow.
//!
//! # Modules
//!
//! - [`api`] - REST client, session credential, response envelope
//! - [`store`] - [`CartStore`] and [`OrderStore`]
//! - [`payment`] - [`PaymentFlow`] state machine with owned polling task
//! - [`checkout`] - Turning the cart into an order
//! - [`state`] - [`Storefront`], the handle owning all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::{Session, Storefront, StorefrontConfig};
//!
//! let config = StorefrontConfig::from_env()?;
//! let storefront = Storefront::new(&config, &Session::from_config(&config.api))?;
//!
//! storefront.cart().fetch().await?;
//! storefront.cart().add_item(product_id, 1).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod error;
pub mod payment;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, FailureKind, Session, StorefrontApi};
pub use checkout::{Checkout, CheckoutForm};
pub use config::{ApiConfig, ConfigError, PaymentSettings, StorefrontConfig};
pub use error::StoreError;
pub use payment::{PaymentFlow, PaymentPhase, PaymentState};
pub use state::Storefront;
pub use store::{CartState, CartStore, OrderStore, OrdersState};
