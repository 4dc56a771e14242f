//! Payment confirmation flow for one order.
//!
//! # States
//!
//! ```text
//! None -> Creating -> AwaitingConfirmation -> Paid
//!            |                 |          -> Cancelled
//!            v                 |          -> Failed
//!          None                +--------> -> Expired (checks exhausted)
//! ```
//!
//! While `AwaitingConfirmation`, a task owned by the flow checks the payment
//! status every `poll_interval`. The task is aborted when a terminal phase is
//! reached, when the view is closed, and when the flow is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

use shopfront_core::{Order, OrderId, Payment, PaymentId, PaymentStatus};

use crate::api::StorefrontApi;
use crate::clock::{Clock, SystemClock};
use crate::config::PaymentSettings;
use crate::error::{Result, StoreError, add_breadcrumb, report};
use crate::store::{KeyedLocks, OrderStore};

/// Where the flow is in the payment protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaymentPhase {
    /// No payment requested yet, or the last request failed.
    #[default]
    None,
    /// Waiting for the backend to create the payment.
    Creating,
    /// The QR payload is shown; polling for provider confirmation.
    AwaitingConfirmation,
    Paid,
    Cancelled,
    Failed,
    /// Polling gave up before the provider confirmed the payment.
    Expired,
}

impl PaymentPhase {
    /// Whether polling is over for the current payment.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Cancelled | Self::Failed | Self::Expired
        )
    }

    const fn from_status(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => Self::AwaitingConfirmation,
            PaymentStatus::Paid => Self::Paid,
            PaymentStatus::Cancelled => Self::Cancelled,
            PaymentStatus::Failed => Self::Failed,
        }
    }
}

impl std::fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Creating => write!(f, "creating"),
            Self::AwaitingConfirmation => write!(f, "awaiting confirmation"),
            Self::Paid => write!(f, "paid"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "not confirmed"),
        }
    }
}

/// Snapshot of the payment view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentState {
    pub phase: PaymentPhase,
    /// The current payment, with the last status the provider reported.
    pub payment: Option<Payment>,
    /// The order being paid, once loaded.
    pub order: Option<Order>,
    /// Status checks issued for the current payment.
    pub attempts: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Message of the last failed check or create, cleared by a successful check.
    pub last_error: Option<String>,
    /// Set once the view should close (after `paid`, or on [`PaymentFlow::close`]).
    pub closed: bool,
}

impl PaymentState {
    /// The QR payload to render while awaiting confirmation.
    #[must_use]
    pub fn qr_string(&self) -> Option<&str> {
        self.payment
            .as_ref()
            .filter(|_| self.phase == PaymentPhase::AwaitingConfirmation)
            .and_then(|payment| payment.qr_string.as_deref())
    }
}

/// State shared with the polling task.
struct FlowShared<A> {
    api: Arc<A>,
    orders: OrderStore<A>,
    order_id: OrderId,
    settings: PaymentSettings,
    clock: Arc<dyn Clock>,
    state: watch::Sender<PaymentState>,
    locks: KeyedLocks<PaymentId>,
}

/// Drives one order's payment to a terminal state.
///
/// At most one payment is active per flow. Dropping the flow stops polling.
pub struct PaymentFlow<A: StorefrontApi> {
    shared: Arc<FlowShared<A>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<A: StorefrontApi> PaymentFlow<A> {
    /// Create a flow for `order_id` using the system clock.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        orders: OrderStore<A>,
        order_id: OrderId,
        settings: PaymentSettings,
    ) -> Self {
        Self::with_clock(api, orders, order_id, settings, Arc::new(SystemClock))
    }

    /// Create a flow with an explicit clock for recorded timestamps.
    #[must_use]
    pub fn with_clock(
        api: Arc<A>,
        orders: OrderStore<A>,
        order_id: OrderId,
        settings: PaymentSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(PaymentState::default());
        Self {
            shared: Arc::new(FlowShared {
                api,
                orders,
                order_id,
                settings,
                clock,
                state,
                locks: KeyedLocks::new(),
            }),
            poller: Mutex::new(None),
        }
    }

    /// The order this flow pays.
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        self.shared.order_id
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> PaymentState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PaymentState> {
        self.shared.state.subscribe()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> PaymentPhase {
        self.shared.state.borrow().phase
    }

    /// Whether the polling task is alive.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Load the order being paid and keep it in the state.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self), fields(order_id = %self.shared.order_id))]
    pub async fn load_order(&self) -> Result<Order> {
        let order = self
            .shared
            .api
            .get_order(self.shared.order_id)
            .await
            .inspect_err(|err| {
                warn!(error = %err, "Failed to load order for payment");
                report(err);
            })?;

        self.shared
            .state
            .send_modify(|state| state.order = Some(order.clone()));
        Ok(order)
    }

    /// Create a payment for the order and start polling for confirmation.
    ///
    /// Allowed when no payment is active or the previous one ended without
    /// being paid. On failure the flow returns to [`PaymentPhase::None`].
    ///
    /// # Errors
    ///
    /// - [`StoreError::PaymentInProgress`] while a payment is being created or
    ///   awaits confirmation
    /// - [`StoreError::PaymentAlreadyPaid`] once the order is paid
    /// - [`StoreError::PaymentViewClosed`] after [`close`](Self::close)
    /// - the backend error
    ///
    /// If the view is closed while the backend creates the payment, the
    /// payment is recorded and returned but not polled.
    #[instrument(skip(self), fields(order_id = %self.shared.order_id))]
    pub async fn create_payment(&self) -> Result<Payment> {
        let order_id = self.shared.order_id;

        let mut rejection = None;
        self.shared.state.send_if_modified(|state| match state.phase {
            _ if state.closed => {
                rejection = Some(StoreError::PaymentViewClosed(order_id));
                false
            }
            PaymentPhase::Creating | PaymentPhase::AwaitingConfirmation => {
                rejection = Some(StoreError::PaymentInProgress(order_id));
                false
            }
            PaymentPhase::Paid => {
                rejection = Some(StoreError::PaymentAlreadyPaid(order_id));
                false
            }
            PaymentPhase::None
            | PaymentPhase::Cancelled
            | PaymentPhase::Failed
            | PaymentPhase::Expired => {
                *state = PaymentState {
                    phase: PaymentPhase::Creating,
                    order: state.order.take(),
                    ..PaymentState::default()
                };
                true
            }
        });
        if let Some(err) = rejection {
            return Err(err);
        }

        add_breadcrumb(
            "payment",
            "Create payment",
            Some(&[("order_id", order_id.to_string().as_str())]),
        );

        let payment = match self.shared.api.create_payment(order_id).await {
            Ok(payment) => payment,
            Err(err) => {
                warn!(error = %err, "Failed to create payment");
                report(&err);
                self.shared.state.send_modify(|state| {
                    state.phase = PaymentPhase::None;
                    state.last_error = Some(err.to_string());
                });
                return Err(err.into());
            }
        };

        let phase = PaymentPhase::from_status(payment.status);
        info!(payment_id = %payment.id, %phase, "Payment created");
        self.shared.state.send_modify(|state| {
            state.phase = phase;
            state.payment = Some(payment.clone());
        });

        if phase == PaymentPhase::AwaitingConfirmation || phase == PaymentPhase::Paid {
            let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
            // `close` sets the flag while holding this lock.
            if self.shared.state.borrow().closed {
                debug!(payment_id = %payment.id, "View closed during create, not polling");
            } else {
                let task = tokio::spawn(Arc::clone(&self.shared).run(payment.id));
                if let Some(previous) = poller.replace(task) {
                    previous.abort();
                }
            }
        }

        Ok(payment)
    }

    /// Cancel the active payment.
    ///
    /// Only a payment that is still pending can be cancelled. On failure the
    /// status is left as it was and polling continues.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NoActivePayment`] if `payment_id` is not this flow's payment
    /// - [`StoreError::PaymentNotPending`] once the payment left `pending`
    /// - the backend error
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn cancel_payment(&self, payment_id: PaymentId) -> Result<()> {
        let _guard = self.shared.locks.lock(payment_id).await;

        {
            let state = self.shared.state.borrow();
            match &state.payment {
                Some(payment) if payment.id == payment_id => {
                    if state.phase != PaymentPhase::AwaitingConfirmation {
                        return Err(StoreError::PaymentNotPending(payment_id));
                    }
                }
                _ => return Err(StoreError::NoActivePayment(payment_id)),
            }
        }

        add_breadcrumb(
            "payment",
            "Cancel payment",
            Some(&[("payment_id", payment_id.to_string().as_str())]),
        );

        self.shared
            .api
            .cancel_payment(payment_id)
            .await
            .inspect_err(|err| {
                warn!(error = %err, "Failed to cancel payment");
                report(err);
            })?;

        self.shared.state.send_modify(|state| {
            state.phase = PaymentPhase::Cancelled;
            if let Some(payment) = state.payment.as_mut() {
                payment.status = PaymentStatus::Cancelled;
            }
        });
        self.stop_polling();

        info!("Payment cancelled");
        Ok(())
    }

    /// Close the payment view: stop polling and mark the state closed.
    ///
    /// The payment itself is left as it is on the backend.
    pub fn close(&self) {
        let previous = {
            let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
            self.shared.state.send_if_modified(|state| {
                let changed = !state.closed;
                state.closed = true;
                changed
            });
            poller.take()
        };
        if let Some(handle) = previous {
            handle.abort();
        }
    }

    fn stop_polling(&self) {
        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = previous {
            handle.abort();
        }
    }
}

impl<A: StorefrontApi> Drop for PaymentFlow<A> {
    fn drop(&mut self) {
        let poller = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = poller.take() {
            handle.abort();
        }
    }
}

/// What the poll loop does after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Continue,
    Stop(PaymentPhase),
}

impl<A: StorefrontApi> FlowShared<A> {
    /// Poll until a terminal phase, then run the completion hook on `paid`.
    async fn run(self: Arc<Self>, payment_id: PaymentId) {
        let mut phase = self.state.borrow().phase;

        if phase == PaymentPhase::AwaitingConfirmation {
            let period = self.settings.poll_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            phase = loop {
                ticker.tick().await;
                if let Tick::Stop(phase) = self.check_once(payment_id).await {
                    break phase;
                }
            };
            debug!(payment_id = %payment_id, %phase, "Polling stopped");
        }

        if phase == PaymentPhase::Paid {
            self.complete().await;
        }
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn check_once(&self, payment_id: PaymentId) -> Tick {
        let _guard = self.locks.lock(payment_id).await;

        // A cancel may have landed while this tick waited for the key.
        {
            let state = self.state.borrow();
            let current = state.payment.as_ref().map(|payment| payment.id);
            if state.phase != PaymentPhase::AwaitingConfirmation || current != Some(payment_id) {
                return Tick::Stop(state.phase);
            }
        }

        let result = self.api.check_payment(payment_id).await;
        let now = self.clock.now();
        let max_attempts = self.settings.max_poll_attempts;

        if let Err(err) = &result {
            warn!(error = %err, "Payment status check failed, will retry");
            report(err);
        }

        let mut tick = Tick::Continue;
        self.state.send_modify(|state| {
            state.attempts = state.attempts.saturating_add(1);
            state.last_checked_at = Some(now);

            match &result {
                Ok(status) => {
                    state.last_error = None;
                    if let Some(payment) = state.payment.as_mut() {
                        payment.status = *status;
                    }
                    if status.is_terminal() {
                        state.phase = PaymentPhase::from_status(*status);
                        tick = Tick::Stop(state.phase);
                    }
                }
                Err(err) => state.last_error = Some(err.to_string()),
            }

            if tick == Tick::Continue && state.attempts >= max_attempts {
                state.phase = PaymentPhase::Expired;
                tick = Tick::Stop(PaymentPhase::Expired);
            }
        });

        match tick {
            Tick::Continue => debug!("Payment still pending"),
            Tick::Stop(PaymentPhase::Expired) => {
                warn!(attempts = max_attempts, "Payment not confirmed, giving up");
            }
            Tick::Stop(phase) => info!(%phase, "Payment reached terminal status"),
        }

        tick
    }

    /// Refresh the orders once, then close the view after the delay.
    async fn complete(&self) {
        let orders = self.orders.clone();
        tokio::spawn(async move {
            if let Err(err) = orders.fetch_orders().await {
                warn!(error = %err, "Failed to refresh orders after payment");
            }
        });

        tokio::time::sleep(self.settings.close_delay).await;
        self.state.send_modify(|state| state.closed = true);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::ApiError;
    use crate::clock::FixedClock;
    use crate::testing::{FakeApi, payment};

    fn settings() -> PaymentSettings {
        PaymentSettings {
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 100,
            close_delay: Duration::from_secs(2),
        }
    }

    fn flow_with(api: &Arc<FakeApi>, settings: PaymentSettings) -> PaymentFlow<FakeApi> {
        let orders = OrderStore::new(Arc::clone(api));
        let clock = FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap());
        PaymentFlow::with_clock(
            Arc::clone(api),
            orders,
            OrderId::new(42),
            settings,
            Arc::new(clock),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_paid_stops_refreshes_and_closes() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.push_payment_status(Ok(PaymentStatus::Pending));
        api.push_payment_status(Ok(PaymentStatus::Paid));
        let flow = flow_with(&api, settings());

        let created = flow.create_payment().await.unwrap();
        assert_eq!(created.id, PaymentId::new(7));
        assert_eq!(flow.phase(), PaymentPhase::AwaitingConfirmation);
        assert_eq!(flow.snapshot().qr_string(), Some("00020101021229370016"));

        // First tick: still pending, only the check bookkeeping moves.
        tokio::time::sleep(Duration::from_millis(3100)).await;
        let state = flow.snapshot();
        assert_eq!(state.phase, PaymentPhase::AwaitingConfirmation);
        assert_eq!(state.attempts, 1);
        assert!(state.last_checked_at.is_some());
        assert_eq!(api.calls("check_payment"), 1);

        // Second tick: paid.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(flow.phase(), PaymentPhase::Paid);
        assert!(!flow.snapshot().closed);
        assert_eq!(api.calls("get_orders"), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(flow.snapshot().closed);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.calls("check_payment"), 2);
        assert_eq!(api.calls("get_orders"), 1);
        assert!(!flow.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_stops_without_refresh() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.push_payment_status(Ok(PaymentStatus::Failed));
        let flow = flow_with(&api, settings());

        flow.create_payment().await.unwrap();
        let mut rx = flow.subscribe();
        rx.wait_for(|state| state.phase.is_terminal()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(flow.phase(), PaymentPhase::Failed);
        assert_eq!(api.calls("check_payment"), 1);
        assert_eq!(api.calls("get_orders"), 0);
        assert!(!flow.snapshot().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_failure_keeps_status_and_continues() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.push_payment_status(Err(ApiError::RateLimited(1)));
        api.push_payment_status(Ok(PaymentStatus::Pending));
        let flow = flow_with(&api, settings());

        flow.create_payment().await.unwrap();

        tokio::time::sleep(Duration::from_millis(3100)).await;
        let state = flow.snapshot();
        assert_eq!(state.phase, PaymentPhase::AwaitingConfirmation);
        assert_eq!(state.payment.unwrap().status, PaymentStatus::Pending);
        assert!(state.last_error.is_some());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(flow.snapshot().last_error.is_none());
        assert_eq!(api.calls("check_payment"), 2);
        assert!(flow.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_expires_after_max_attempts() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        let flow = flow_with(
            &api,
            PaymentSettings {
                max_poll_attempts: 3,
                ..settings()
            },
        );

        flow.create_payment().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(flow.phase(), PaymentPhase::Expired);
        assert_eq!(api.calls("check_payment"), 3);

        // A new payment may be requested after expiry.
        flow.create_payment().await.unwrap();
        assert_eq!(flow.phase(), PaymentPhase::AwaitingConfirmation);
        assert_eq!(flow.snapshot().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        let flow = flow_with(&api, settings());

        flow.create_payment().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3100)).await;
        flow.cancel_payment(PaymentId::new(7)).await.unwrap();

        let state = flow.snapshot();
        assert_eq!(state.phase, PaymentPhase::Cancelled);
        assert_eq!(state.payment.unwrap().status, PaymentStatus::Cancelled);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls("check_payment"), 1);
        assert!(!flow.is_polling());

        let err = flow.cancel_payment(PaymentId::new(7)).await.unwrap_err();
        assert!(matches!(err, StoreError::PaymentNotPending(_)));
        assert_eq!(api.calls("cancel_payment"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_failure_leaves_status() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.fail("cancel_payment");
        let flow = flow_with(&api, settings());

        flow.create_payment().await.unwrap();
        assert!(flow.cancel_payment(PaymentId::new(7)).await.is_err());

        assert_eq!(flow.phase(), PaymentPhase::AwaitingConfirmation);
        assert!(flow.is_polling());

        let err = flow.cancel_payment(PaymentId::new(8)).await.unwrap_err();
        assert!(matches!(err, StoreError::NoActivePayment(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_is_single_flight() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.delay("create_payment", Duration::from_secs(1));
        let flow = Arc::new(flow_with(&api, settings()));

        let first = {
            let flow = Arc::clone(&flow);
            tokio::spawn(async move { flow.create_payment().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(flow.phase(), PaymentPhase::Creating);

        let err = flow.create_payment().await.unwrap_err();
        assert!(matches!(err, StoreError::PaymentInProgress(_)));

        first.await.unwrap().unwrap();
        let err = flow.create_payment().await.unwrap_err();
        assert!(matches!(err, StoreError::PaymentInProgress(_)));
        assert_eq!(api.calls("create_payment"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_returns_to_none() {
        let api = Arc::new(FakeApi::default());
        api.fail("create_payment");
        let flow = flow_with(&api, settings());

        assert!(flow.create_payment().await.is_err());

        let state = flow.snapshot();
        assert_eq!(state.phase, PaymentPhase::None);
        assert!(state.payment.is_none());
        assert!(state.last_error.is_some());
        assert!(!flow.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_and_drop_abort_polling() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        let flow = flow_with(&api, settings());

        flow.create_payment().await.unwrap();
        flow.close();
        assert!(flow.snapshot().closed);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls("check_payment"), 0);

        let flow = flow_with(&api, settings());
        flow.create_payment().await.unwrap();
        drop(flow);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls("check_payment"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_create_never_polls() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.delay("create_payment", Duration::from_secs(1));
        let flow = Arc::new(flow_with(&api, settings()));

        let creating = {
            let flow = Arc::clone(&flow);
            tokio::spawn(async move { flow.create_payment().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(flow.phase(), PaymentPhase::Creating);
        flow.close();

        let created = creating.await.unwrap().unwrap();
        assert_eq!(created.id, PaymentId::new(7));
        assert!(!flow.is_polling());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.calls("check_payment"), 0);
        assert!(flow.snapshot().closed);

        // A closed view takes no new payments.
        let err = flow.create_payment().await.unwrap_err();
        assert!(matches!(err, StoreError::PaymentViewClosed(_)));
        assert_eq!(api.calls("create_payment"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_waits_for_in_flight_check() {
        let api = Arc::new(FakeApi::default());
        api.set_payment(payment(7, 42));
        api.delay("check_payment", Duration::from_secs(1));
        api.push_payment_status(Ok(PaymentStatus::Paid));
        let flow = flow_with(&api, settings());

        flow.create_payment().await.unwrap();
        // The first check starts at 3s and answers at 4s.
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(api.calls("check_payment"), 1);
        assert_eq!(flow.phase(), PaymentPhase::AwaitingConfirmation);

        let err = flow.cancel_payment(PaymentId::new(7)).await.unwrap_err();

        assert!(matches!(err, StoreError::PaymentNotPending(_)));
        assert_eq!(flow.phase(), PaymentPhase::Paid);
        assert_eq!(api.calls("cancel_payment"), 0);
    }

    #[tokio::test]
    async fn test_load_order_keeps_back_reference() {
        let api = Arc::new(FakeApi::default());
        api.set_orders(vec![crate::testing::order(42, shopfront_core::OrderStatus::Pending)]);
        let flow = flow_with(&api, settings());

        let order = flow.load_order().await.unwrap();

        assert_eq!(order.id, OrderId::new(42));
        assert_eq!(flow.snapshot().order.unwrap().id, OrderId::new(42));
    }
}
