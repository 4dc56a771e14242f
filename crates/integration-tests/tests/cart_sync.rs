//! Integration tests for the cart store against the backend.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use shopfront_integration_tests::{Failure, TestContext};
use shopfront_storefront::{FailureKind, StoreError};

#[tokio::test]
async fn test_fetch_mirrors_backend() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&mango, 3);
    let storefront = ctx.storefront().unwrap();

    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    assert_eq!(cart.total_count(), 3);
    assert_eq!(cart.items(), ctx.backend.cart());
    assert!(!cart.snapshot().loading);
}

#[tokio::test]
async fn test_fetch_failure_resets_cart() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&mango, 3);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    ctx.backend.fail("get_cart", Failure::Status(503));
    assert!(cart.fetch().await.is_err());

    let state = cart.snapshot();
    assert!(state.is_empty());
    assert_eq!(state.total_count, 0);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_add_new_product_refetches_for_line_id() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    cart.add_item(mango.id, 2).await.unwrap();

    assert_eq!(ctx.backend.hits("get_cart"), 2);
    let backend_line = ctx.backend.cart().into_iter().next().unwrap();
    let local_line = cart.snapshot().line_for_product(mango.id).cloned().unwrap();
    assert_eq!(local_line.id, backend_line.id);
    assert_eq!(local_line.quantity, 2);
    assert_eq!(cart.total_count(), 2);
}

#[tokio::test]
async fn test_add_existing_product_merges_without_refetch() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&mango, 1);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    cart.add_item(mango.id, 2).await.unwrap();

    assert_eq!(ctx.backend.hits("get_cart"), 1);
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.total_count(), 3);
    assert_eq!(ctx.backend.cart().first().unwrap().quantity, 3);
}

#[tokio::test]
async fn test_add_beyond_stock_rolls_back() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 3);
    ctx.backend.seed_cart_line(&mango, 2);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    let err = cart.add_item(mango.id, 5).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Business);
    assert_eq!(cart.total_count(), 2);
    assert_eq!(cart.items().first().unwrap().quantity, 2);
}

#[tokio::test]
async fn test_concurrent_adds_on_one_product_are_serialized() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&mango, 1);
    ctx.backend.delay("add_to_cart", Duration::from_millis(50));
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart().clone();
    cart.fetch().await.unwrap();

    let other = cart.clone();
    let product_id = mango.id;
    let first = tokio::spawn(async move { other.add_item(product_id, 1).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(cart.is_busy(mango.id));
    cart.add_item(mango.id, 1).await.unwrap();
    first.await.unwrap().unwrap();

    assert!(!cart.is_busy(mango.id));
    assert_eq!(cart.total_count(), 3);
    assert_eq!(ctx.backend.cart().first().unwrap().quantity, 3);
    assert_eq!(ctx.backend.hits("add_to_cart"), 2);
}

#[tokio::test]
async fn test_update_line_quantity() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    let cashews = ctx.backend.seed_product("Cashews", 700, 10);
    let line = ctx.backend.seed_cart_line(&mango, 1);
    ctx.backend.seed_cart_line(&cashews, 2);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    cart.update_item(line.id, 4).await.unwrap();

    assert_eq!(cart.total_count(), 6);
    assert_eq!(cart.snapshot().line(line.id).unwrap().quantity, 4);
    assert_eq!(ctx.backend.cart().first().unwrap().quantity, 4);
}

#[tokio::test]
async fn test_update_failure_restores_quantity() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 3);
    let line = ctx.backend.seed_cart_line(&mango, 1);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    assert!(cart.update_item(line.id, 9).await.is_err());

    assert_eq!(cart.total_count(), 1);
    assert_eq!(cart.snapshot().line(line.id).unwrap().quantity, 1);
}

#[tokio::test]
async fn test_update_unknown_line_skips_backend() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    let err = cart
        .update_item(shopfront_core::CartLineId::new(99), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::CartLineNotFound(_)));
    assert_eq!(ctx.backend.hits("update_cart_line"), 0);
}

#[tokio::test]
async fn test_remove_product() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    let cashews = ctx.backend.seed_product("Cashews", 700, 10);
    ctx.backend.seed_cart_line(&mango, 1);
    ctx.backend.seed_cart_line(&cashews, 2);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    cart.remove_item(mango.id).await.unwrap();

    assert_eq!(cart.total_count(), 2);
    assert!(cart.snapshot().line_for_product(mango.id).is_none());
    assert_eq!(ctx.backend.cart().len(), 1);
}

#[tokio::test]
async fn test_remove_failure_restores_line_position() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    let cashews = ctx.backend.seed_product("Cashews", 700, 10);
    ctx.backend.seed_cart_line(&mango, 1);
    ctx.backend.seed_cart_line(&cashews, 2);
    ctx.backend.fail("remove_cart_product", Failure::Rejected);
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();
    let before = cart.items();

    assert!(cart.remove_item(mango.id).await.is_err());

    assert_eq!(cart.items(), before);
    assert_eq!(cart.total_count(), 3);
}

#[tokio::test]
async fn test_clear_empties_local_cart_even_on_failure() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&mango, 2);
    ctx.backend.fail("clear_cart", Failure::Status(500));
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart();
    cart.fetch().await.unwrap();

    assert!(cart.clear_all().await.is_err());

    assert!(cart.snapshot().is_empty());
    assert_eq!(cart.total_count(), 0);
    assert_eq!(ctx.backend.cart().len(), 1);
}

#[tokio::test]
async fn test_subscribers_see_optimistic_count() {
    let ctx = TestContext::start().await.unwrap();
    let mango = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&mango, 1);
    ctx.backend.delay("add_to_cart", Duration::from_millis(100));
    let storefront = ctx.storefront().unwrap();
    let cart = storefront.cart().clone();
    cart.fetch().await.unwrap();
    let mut updates = cart.subscribe();
    updates.borrow_and_update();

    let adding = cart.clone();
    let product_id = mango.id;
    let task = tokio::spawn(async move { adding.add_item(product_id, 2).await });

    updates.changed().await.unwrap();
    assert_eq!(updates.borrow().total_count, 3);
    assert_eq!(ctx.backend.cart().first().unwrap().quantity, 1);

    task.await.unwrap().unwrap();
    assert_eq!(ctx.backend.cart().first().unwrap().quantity, 3);
}
