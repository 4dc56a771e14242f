//! Payment command: show the QR payload and wait for confirmation.

use shopfront_core::OrderId;
use shopfront_storefront::{PaymentPhase, PaymentState, Storefront};

use super::CommandError;

/// Pay an order.
///
/// Follows the payment until the view closes. Ctrl-C cancels a payment that
/// is still pending.
#[allow(clippy::print_stdout)]
pub async fn pay(
    storefront: &Storefront,
    order_id: OrderId,
) -> Result<(), Box<dyn std::error::Error>> {
    let flow = storefront.payment_flow(order_id);

    let order = flow.load_order().await?;
    println!(
        "Order {} - {} ({})",
        order.order_number, order.total_price, order.status
    );

    let payment = flow.create_payment().await?;
    if let Some(qr) = flow.snapshot().qr_string() {
        println!("Scan to pay:");
        println!("{qr}");
    }

    let mut updates = flow.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut reported_attempts = 0;

    loop {
        let state = updates.borrow_and_update().clone();

        if state.attempts != reported_attempts {
            reported_attempts = state.attempts;
            print_progress(&state);
        }

        match state.phase {
            PaymentPhase::Paid if state.closed => {
                println!("Payment received. Thank you!");
                return Ok(());
            }
            PaymentPhase::Paid | PaymentPhase::AwaitingConfirmation => {}
            phase => return Err(CommandError::PaymentNotCompleted(phase.to_string()).into()),
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = &mut ctrl_c => {
                println!();
                flow.cancel_payment(payment.id).await?;
                println!("Payment cancelled.");
                return Ok(());
            }
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_progress(state: &PaymentState) {
    match &state.last_error {
        Some(error) => println!("  check {} failed: {error}", state.attempts),
        None => println!("  check {}: {}", state.attempts, state.phase),
    }
}
