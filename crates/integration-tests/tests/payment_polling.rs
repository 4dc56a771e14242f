//! Integration tests for the payment flow, polling a live backend on short
//! real-time intervals (40ms, 10 attempts, 80ms close delay).

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use shopfront_core::{Order, OrderStatus, PaymentStatus};
use shopfront_integration_tests::{Failure, QR_PREFIX, TestContext};
use shopfront_storefront::{
    ApiClient, CheckoutForm, PaymentFlow, PaymentPhase, PaymentState, StoreError, Storefront,
};

async fn place_order(ctx: &TestContext, storefront: &Storefront) -> Order {
    let product = ctx.backend.seed_product("Dried Mango", 450, 10);
    ctx.backend.seed_cart_line(&product, 1);
    storefront.cart().fetch().await.unwrap();

    storefront
        .checkout()
        .place_order(&CheckoutForm {
            phone: "012345678".to_string(),
            address: "Street 5, Phnom Penh".to_string(),
        })
        .await
        .unwrap()
}

async fn wait_until(
    flow: &PaymentFlow<ApiClient>,
    done: impl Fn(&PaymentState) -> bool,
) -> PaymentState {
    let mut updates = flow.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|state| done(state)))
        .await
        .unwrap()
        .unwrap()
        .clone();
    state
}

/// Wait for the poll task to finish.
async fn wait_stopped(flow: &PaymentFlow<ApiClient>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while flow.is_polling() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_paid_payment_refreshes_orders_and_closes() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;
    ctx.backend
        .script_payment([PaymentStatus::Pending, PaymentStatus::Paid]);

    let flow = storefront.payment_flow(order.id);
    flow.load_order().await.unwrap();
    let payment = flow.create_payment().await.unwrap();

    let awaiting = flow.snapshot();
    assert_eq!(awaiting.phase, PaymentPhase::AwaitingConfirmation);
    assert!(awaiting.qr_string().unwrap().starts_with(QR_PREFIX));

    let state = wait_until(&flow, |state| state.closed).await;
    assert_eq!(state.phase, PaymentPhase::Paid);
    assert_eq!(state.attempts, 2);
    assert!(state.qr_string().is_none());
    assert_eq!(
        ctx.backend.payment(payment.id).unwrap().status,
        PaymentStatus::Paid
    );

    let mut orders = storefront.orders().subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        orders.wait_for(|state| {
            state
                .get(order.id)
                .is_some_and(|order| order.status == OrderStatus::Completed)
        }),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn test_failed_payment_stops_polling() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;
    ctx.backend.script_payment([PaymentStatus::Failed]);

    let flow = storefront.payment_flow(order.id);
    flow.create_payment().await.unwrap();

    let state = wait_until(&flow, |state| state.phase.is_terminal()).await;
    assert_eq!(state.phase, PaymentPhase::Failed);
    assert!(!state.closed);

    wait_stopped(&flow).await;
    assert_eq!(ctx.backend.hits("check_payment"), 1);
    assert_eq!(ctx.backend.hits("get_orders"), 0);
}

#[tokio::test]
async fn test_unconfirmed_payment_expires() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;

    let flow = storefront.payment_flow(order.id);
    flow.create_payment().await.unwrap();

    let state = wait_until(&flow, |state| state.phase.is_terminal()).await;
    assert_eq!(state.phase, PaymentPhase::Expired);
    assert_eq!(state.attempts, 10);
    assert_eq!(ctx.backend.hits("check_payment"), 10);

    // A fresh payment may be requested after giving up.
    let retry = flow.create_payment().await.unwrap();
    assert_eq!(flow.phase(), PaymentPhase::AwaitingConfirmation);
    assert_eq!(flow.snapshot().payment.unwrap().id, retry.id);
}

#[tokio::test]
async fn test_check_errors_keep_polling() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;
    ctx.backend.fail("check_payment", Failure::Status(500));

    let flow = storefront.payment_flow(order.id);
    flow.create_payment().await.unwrap();

    let state = wait_until(&flow, |state| state.attempts >= 2).await;
    assert_eq!(state.phase, PaymentPhase::AwaitingConfirmation);
    assert!(state.last_error.is_some());

    ctx.backend.recover("check_payment");
    ctx.backend.script_payment([PaymentStatus::Paid]);
    let state = wait_until(&flow, |state| state.phase == PaymentPhase::Paid).await;
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_cancel_payment() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;

    let flow = storefront.payment_flow(order.id);
    let payment = flow.create_payment().await.unwrap();
    flow.cancel_payment(payment.id).await.unwrap();

    assert_eq!(flow.phase(), PaymentPhase::Cancelled);
    assert!(!flow.is_polling());
    assert_eq!(
        ctx.backend.payment(payment.id).unwrap().status,
        PaymentStatus::Cancelled
    );

    // No further check ever lands in the state.
    let mut updates = flow.subscribe();
    let checks = ctx.backend.hits("check_payment");
    assert!(
        tokio::time::timeout(Duration::from_millis(200), updates.changed())
            .await
            .is_err()
    );
    assert_eq!(usize::try_from(flow.snapshot().attempts).unwrap(), checks);
}

#[tokio::test]
async fn test_cancel_refused_keeps_polling() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;
    ctx.backend.fail("cancel_payment", Failure::Rejected);

    let flow = storefront.payment_flow(order.id);
    let payment = flow.create_payment().await.unwrap();

    assert!(flow.cancel_payment(payment.id).await.is_err());
    assert_eq!(flow.phase(), PaymentPhase::AwaitingConfirmation);
    assert!(flow.is_polling());
}

#[tokio::test]
async fn test_second_create_while_awaiting_is_refused() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;

    let flow = storefront.payment_flow(order.id);
    flow.create_payment().await.unwrap();

    let err = flow.create_payment().await.unwrap_err();
    assert!(matches!(err, StoreError::PaymentInProgress(_)));
    assert_eq!(ctx.backend.hits("create_payment"), 1);
}

#[tokio::test]
async fn test_paid_order_cannot_be_paid_again() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;
    ctx.backend.complete_order(order.id);

    let flow = storefront.payment_flow(order.id);
    let err = flow.create_payment().await.unwrap_err();

    assert!(matches!(err, StoreError::Api(_)));
    let state = flow.snapshot();
    assert_eq!(state.phase, PaymentPhase::None);
    assert!(state.last_error.unwrap().contains("Order already paid"));
}

#[tokio::test]
async fn test_dropping_flow_stops_polling() {
    let ctx = TestContext::start().await.unwrap();
    let storefront = ctx.storefront().unwrap();
    let order = place_order(&ctx, &storefront).await;

    let flow = storefront.payment_flow(order.id);
    flow.create_payment().await.unwrap();
    wait_until(&flow, |state| state.attempts >= 1).await;
    let mut updates = flow.subscribe();
    drop(flow);

    // The sender goes away with the aborted task.
    tokio::time::timeout(Duration::from_secs(5), async {
        while updates.changed().await.is_ok() {}
    })
    .await
    .unwrap();

    let attempts = usize::try_from(updates.borrow().attempts).unwrap();
    assert!(ctx.backend.hits("check_payment") <= attempts + 1);
}
