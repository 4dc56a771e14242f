//! Local mirrors of backend-owned state.
//!
//! # Architecture
//!
//! - One store per entity collection, constructed once by
//!   [`Storefront`](crate::Storefront) and handed out as cheap clones
//! - State lives in a `tokio::sync::watch` channel: only the store writes,
//!   consumers read snapshots or subscribe to changes
//! - Mutations are optimistic: local state changes first, the backend call
//!   follows, and a failed call reverts the change before the error is
//!   returned
//! - Mutations against one entity are serialized through [`KeyedLocks`]

mod cart;
mod orders;
mod single_flight;

pub use cart::{CartState, CartStore};
pub use orders::{OrderStore, OrdersState};
pub use single_flight::{KeyGuard, KeyedLocks};
