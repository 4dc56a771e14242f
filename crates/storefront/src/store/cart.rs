//! Shopping cart mirror.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use shopfront_core::{CartItem, CartLineId, ProductId};

use crate::api::{ApiError, StorefrontApi};
use crate::error::{Result, StoreError, add_breadcrumb, report};
use crate::store::KeyedLocks;

/// Snapshot of the cart as the UI renders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Lines in backend order.
    pub items: Vec<CartItem>,
    /// Sum of all line quantities.
    pub total_count: u32,
    /// Whether a fetch is in flight.
    pub loading: bool,
}

impl CartState {
    /// The line holding `product_id`, if any.
    #[must_use]
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product.id == product_id)
    }

    /// The line with id `line_id`, if any.
    #[must_use]
    pub fn line(&self, line_id: CartLineId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == line_id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Owner of the local cart.
///
/// Cheap to clone; clones share state.
pub struct CartStore<A> {
    inner: Arc<CartStoreInner<A>>,
}

struct CartStoreInner<A> {
    api: Arc<A>,
    state: watch::Sender<CartState>,
    /// Mutations are keyed by product so that an update and a removal of the
    /// same product are ordered.
    locks: KeyedLocks<ProductId>,
}

impl<A> Clone for CartStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn sum_quantities(items: &[CartItem]) -> u32 {
    items
        .iter()
        .fold(0, |total, item| total.saturating_add(item.quantity))
}

/// Move a count by a signed amount, clamped to the `u32` range.
fn shift_count(count: u32, delta: i64) -> u32 {
    let shifted = i64::from(count).saturating_add(delta);
    u32::try_from(shifted.max(0)).unwrap_or(u32::MAX)
}

impl<A: StorefrontApi> CartStore<A> {
    /// Create an empty cart.
    #[must_use]
    pub fn new(api: Arc<A>) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                state,
                locks: KeyedLocks::new(),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Current cart lines.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.state.borrow().items.clone()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.inner.state.borrow().total_count
    }

    /// Whether a mutation against `product_id` is in flight.
    #[must_use]
    pub fn is_busy(&self, product_id: ProductId) -> bool {
        self.inner.locks.is_busy(&product_id)
    }

    /// Load the authoritative cart.
    ///
    /// On failure the local cart is reset to empty. `loading` is false once
    /// this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<()> {
        self.inner.state.send_modify(|state| state.loading = true);

        let result = self.inner.api.get_cart().await;

        match result {
            Ok(items) => {
                debug!(lines = items.len(), "Cart fetched");
                self.inner.state.send_modify(|state| {
                    state.total_count = sum_quantities(&items);
                    state.items = items;
                    state.loading = false;
                });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch cart, resetting");
                report(&err);
                self.inner.state.send_modify(|state| *state = CartState::default());
                Err(err.into())
            }
        }
    }

    /// Add `quantity` units of a product.
    ///
    /// A line already holding the product is incremented in place. Otherwise
    /// the cart is refetched after the backend accepts the add, to pick up
    /// the server-assigned line id. The total count moves immediately in
    /// both cases and is reverted if the backend refuses.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidQuantity`] for a quantity of 0
    /// - the backend error of the add, after rollback
    /// - the error of the follow-up fetch
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        let _guard = self.inner.locks.lock(product_id).await;
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[
                ("product_id", product_id.to_string().as_str()),
                ("quantity", quantity.to_string().as_str()),
            ]),
        );

        let mut merged = false;
        self.inner.state.send_modify(|state| {
            if let Some(line) = state
                .items
                .iter_mut()
                .find(|item| item.product.id == product_id)
            {
                line.quantity = line.quantity.saturating_add(quantity);
                merged = true;
            }
            state.total_count = state.total_count.saturating_add(quantity);
        });

        if let Err(err) = self.inner.api.add_to_cart(product_id, quantity).await {
            warn!(error = %err, merged, "Add to cart failed, rolling back");
            self.inner.state.send_modify(|state| {
                if merged {
                    if let Some(line) = state
                        .items
                        .iter_mut()
                        .find(|item| item.product.id == product_id)
                    {
                        line.quantity = line.quantity.saturating_sub(quantity);
                    }
                }
                state.total_count = state.total_count.saturating_sub(quantity);
            });
            return Err(self.failed(err));
        }

        if !merged {
            debug!("Product not in local cart, refetching for line id");
            self.fetch().await?;
        }

        Ok(())
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidQuantity`] for a quantity of 0
    /// - [`StoreError::CartLineNotFound`] if the line is not in the local cart
    /// - the backend error, after the previous quantity is restored
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn update_item(&self, line_id: CartLineId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        let product_id = self.product_of_line(line_id)?;
        let _guard = self.inner.locks.lock(product_id).await;

        // Re-resolve: the line may have gone while we waited.
        // (previous quantity, change actually applied to the total)
        let mut applied = None;
        self.inner.state.send_if_modified(|state| {
            let before = state.total_count;
            let Some(line) = state.items.iter_mut().find(|item| item.id == line_id) else {
                return false;
            };
            let delta = i64::from(quantity) - i64::from(line.quantity);
            state.total_count = shift_count(before, delta);
            applied = Some((
                line.quantity,
                i64::from(state.total_count) - i64::from(before),
            ));
            line.quantity = quantity;
            true
        });
        let Some((previous, total_delta)) = applied else {
            return Err(StoreError::CartLineNotFound(line_id));
        };

        if let Err(err) = self.inner.api.update_cart_line(line_id, quantity).await {
            warn!(error = %err, previous, "Cart update failed, rolling back");
            self.inner.state.send_if_modified(|state| {
                let Some(line) = state.items.iter_mut().find(|item| item.id == line_id) else {
                    return false;
                };
                state.total_count = shift_count(state.total_count, -total_delta);
                line.quantity = previous;
                true
            });
            return Err(self.failed(err));
        }

        Ok(())
    }

    /// Remove every line holding a product.
    ///
    /// # Errors
    ///
    /// Returns the backend error, after the removed lines are restored at
    /// their former positions.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_item(&self, product_id: ProductId) -> Result<()> {
        let _guard = self.inner.locks.lock(product_id).await;

        let mut removed: Vec<(usize, CartItem)> = Vec::new();
        self.inner.state.send_modify(|state| {
            let mut index = 0;
            state.items.retain(|item| {
                let keep = item.product.id != product_id;
                if !keep {
                    removed.push((index, item.clone()));
                }
                index += 1;
                keep
            });
            let removed_count: u32 = removed.iter().map(|(_, item)| item.quantity).sum();
            state.total_count = state.total_count.saturating_sub(removed_count);
        });

        if let Err(err) = self.inner.api.remove_cart_product(product_id).await {
            warn!(error = %err, lines = removed.len(), "Cart removal failed, rolling back");
            self.inner.state.send_modify(|state| {
                for (index, item) in removed {
                    state.total_count = state.total_count.saturating_add(item.quantity);
                    let index = index.min(state.items.len());
                    state.items.insert(index, item);
                }
            });
            return Err(self.failed(err));
        }

        Ok(())
    }

    /// Clear the cart on the backend, then locally.
    ///
    /// The local cart is empty once this returns, whatever the backend said.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        let result = self.inner.api.clear_cart().await;
        self.reset_cart();
        result.map_err(|err| {
            warn!(error = %err, "Failed to clear cart on backend");
            self.failed(err)
        })
    }

    /// Empty the local cart without calling the backend (logout).
    pub fn reset_cart(&self) {
        self.inner
            .state
            .send_modify(|state| *state = CartState::default());
    }

    fn product_of_line(&self, line_id: CartLineId) -> Result<ProductId> {
        self.inner
            .state
            .borrow()
            .line(line_id)
            .map(|line| line.product.id)
            .ok_or(StoreError::CartLineNotFound(line_id))
    }

    fn failed(&self, err: ApiError) -> StoreError {
        report(&err);
        err.into()
    }
}
