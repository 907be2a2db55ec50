//! Saga coordinator for the order-creation flow.

use std::collections::HashSet;

use common::{BreakId, CartId, OrderId, ProductItemId, UserId};
use domain::{Checkout, Money, Order, ProductItem};
use serde::Serialize;
use store::MarketplaceStore;

use crate::context::SagaContext;
use crate::error::CheckoutError;
use crate::services::commerce::CommercePlatform;
use crate::services::payment::{AuthorizationRequest, PaymentGateway};
use crate::state::CheckoutStep;

/// Successful checkout result returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub grand_total: Money,
}

/// Orchestrates the order-creation saga.
///
/// The saga is linear: fetch checkout → resolve spots → reserve → authorize
/// → create platform order → mark pending → settle → commit, with
/// compensation of inventory and payment on any step failure. Reservation
/// is the single serialization point between concurrent attempts; every
/// step after it must be undone if a later step fails.
pub struct SagaCoordinator<S, P, C>
where
    S: MarketplaceStore,
    P: PaymentGateway,
    C: CommercePlatform,
{
    store: S,
    payment: P,
    commerce: C,
}

impl<S, P, C> SagaCoordinator<S, P, C>
where
    S: MarketplaceStore + Clone + 'static,
    P: PaymentGateway,
    C: CommercePlatform,
{
    /// Creates a new saga coordinator.
    pub fn new(store: S, payment: P, commerce: C) -> Self {
        Self {
            store,
            payment,
            commerce,
        }
    }

    /// Executes the order-creation saga for one checkout attempt.
    ///
    /// On success the durable order exists, its spots are finalized, and the
    /// payment is settled. On failure every reserved spot is back on the
    /// shelf, any unsettled authorization is voided, and the caller receives
    /// one terminal [`CheckoutError`].
    #[tracing::instrument(skip(self, payment_token), fields(user_id = %user_id, cart_id = %cart_id))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        cart_id: CartId,
        payment_token: String,
    ) -> Result<OrderConfirmation, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        // Generated before any side effect; doubles as the payment merchant
        // reference for the whole attempt. A caller retry gets a fresh id,
        // so it can never re-capture a stale authorization.
        let order_id = OrderId::new();
        let mut ctx = SagaContext::new(order_id, user_id);
        ctx.start();

        let result = self.run(&mut ctx, &cart_id, &payment_token).await;

        match &result {
            Ok(confirmation) => {
                metrics::counter!("checkout_completed").increment(1);
                tracing::info!(
                    order_id = %confirmation.order_id,
                    grand_total = confirmation.grand_total.cents(),
                    "checkout completed"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failed", "code" => err.code()).increment(1);
            }
        }
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn run(
        &self,
        ctx: &mut SagaContext,
        cart_id: &CartId,
        payment_token: &str,
    ) -> Result<OrderConfirmation, CheckoutError> {
        // 1. Fetch the checkout. No side effects yet, so failure is terminal
        // without compensation.
        ctx.begin_step(CheckoutStep::FetchCheckout);
        let checkout = match self.commerce.get_checkout(cart_id).await {
            Ok(checkout) => {
                ctx.complete_step(CheckoutStep::FetchCheckout);
                checkout
            }
            Err(err) => {
                self.log_step_failure(ctx, CheckoutStep::FetchCheckout, &err);
                ctx.fail_step(CheckoutStep::FetchCheckout, &err);
                ctx.finish_failed();
                return Err(CheckoutError::CheckoutUnavailable(err));
            }
        };

        // 2. Resolve cart line items to spots.
        ctx.begin_step(CheckoutStep::ResolveSpots);
        let keys = checkout.line_item_keys();
        let spots = match self.store.find_spots(&keys).await {
            Ok(spots) => spots,
            Err(err) => {
                self.log_step_failure(ctx, CheckoutStep::ResolveSpots, &err);
                ctx.fail_step(CheckoutStep::ResolveSpots, &err);
                ctx.finish_failed();
                return Err(CheckoutError::ItemLookupFailed(Some(err)));
            }
        };
        if spots.len() != keys.len() {
            tracing::warn!(
                user_id = %ctx.user_id(),
                order_id = %ctx.order_id(),
                cart_items = keys.len(),
                resolved = spots.len(),
                "checkout items do not match break spots"
            );
            ctx.fail_step(CheckoutStep::ResolveSpots, "line item count mismatch");
            ctx.finish_failed();
            return Err(CheckoutError::ItemLookupFailed(None));
        }
        ctx.complete_step(CheckoutStep::ResolveSpots);

        // 3. Validate sellability before touching anything.
        let unsellable = spots
            .iter()
            .find(|spot| spot.is_sold() || !spot.break_status.is_sellable());
        if let Some(spot) = unsellable {
            tracing::info!(
                user_id = %ctx.user_id(),
                order_id = %ctx.order_id(),
                spot_id = %spot.id,
                break_status = %spot.break_status,
                sold = spot.is_sold(),
                "spot is not sellable"
            );
            ctx.fail_step(CheckoutStep::ResolveSpots, "spot not sellable");
            ctx.finish_failed();
            return Err(CheckoutError::SpotNoLongerAvailable);
        }

        // 4. Reserve. The conditional decrement plus the ledger's uniqueness
        // constraint decide every race; the ledger is then queried for the
        // attempts that actually landed. Holding only part of the cart is
        // not a valid outcome, so siblings are released on any shortfall.
        ctx.begin_step(CheckoutStep::ReserveSpots);
        let spot_ids: Vec<ProductItemId> = spots.iter().map(|spot| spot.id).collect();
        let reserve_result = self
            .store
            .reserve_spots(ctx.order_id(), ctx.user_id(), &spot_ids)
            .await;

        match self.store.reserved_spots(ctx.order_id()).await {
            Ok(held) => ctx.record_reserved(held),
            Err(err) => {
                tracing::error!(
                    user_id = %ctx.user_id(),
                    order_id = %ctx.order_id(),
                    error = %err,
                    "could not read back reservations; compensating blind"
                );
            }
        }

        let requested: HashSet<ProductItemId> = spot_ids.iter().copied().collect();
        let held: HashSet<ProductItemId> = ctx.reserved_spots().iter().copied().collect();
        if let Err(err) = reserve_result {
            self.log_step_failure(ctx, CheckoutStep::ReserveSpots, &err);
            ctx.fail_step(CheckoutStep::ReserveSpots, &err);
            self.compensate(ctx).await;
            return Err(CheckoutError::SpotNoLongerAvailable);
        }
        if held != requested {
            tracing::info!(
                user_id = %ctx.user_id(),
                order_id = %ctx.order_id(),
                requested = requested.len(),
                held = held.len(),
                "lost the reservation race"
            );
            ctx.fail_step(CheckoutStep::ReserveSpots, "reservation race lost");
            self.compensate(ctx).await;
            return Err(CheckoutError::SpotNoLongerAvailable);
        }
        ctx.complete_step(CheckoutStep::ReserveSpots);

        // 5. Authorize payment. Zero-total checkouts never touch the
        // gateway.
        if !checkout.grand_total.is_zero() {
            ctx.begin_step(CheckoutStep::AuthorizePayment);
            let request = AuthorizationRequest {
                payment_token: payment_token.to_string(),
                merchant_ref: ctx.order_id(),
                amount: checkout.grand_total,
            };
            match self.payment.authorize(&request).await {
                Ok(auth) => {
                    ctx.record_authorization(auth.id, checkout.grand_total);
                    ctx.complete_step(CheckoutStep::AuthorizePayment);
                }
                Err(err) => {
                    self.log_step_failure(ctx, CheckoutStep::AuthorizePayment, &err);
                    ctx.fail_step(CheckoutStep::AuthorizePayment, &err);
                    self.compensate(ctx).await;
                    return Err(if err.is_insufficient_funds() {
                        CheckoutError::InsufficientFunds
                    } else {
                        CheckoutError::PaymentAuthorizationFailed(err)
                    });
                }
            }
        }

        // 6. Create the platform order from the cart.
        ctx.begin_step(CheckoutStep::CreatePlatformOrder);
        let platform_order_id = match self.commerce.create_order(cart_id).await {
            Ok(platform_order_id) => {
                ctx.record_platform_order(platform_order_id);
                ctx.complete_step(CheckoutStep::CreatePlatformOrder);
                platform_order_id
            }
            Err(err) => {
                self.log_step_failure(ctx, CheckoutStep::CreatePlatformOrder, &err);
                ctx.fail_step(CheckoutStep::CreatePlatformOrder, &err);
                self.compensate(ctx).await;
                return Err(CheckoutError::OrderCreationFailed(err));
            }
        };

        // 7. Transition the platform order to pending/external payment. On
        // failure the platform order is left orphaned; compensation targets
        // money and inventory only.
        ctx.begin_step(CheckoutStep::MarkOrderPending);
        if let Err(err) = self.commerce.mark_order_pending(platform_order_id).await {
            self.log_step_failure(ctx, CheckoutStep::MarkOrderPending, &err);
            ctx.fail_step(CheckoutStep::MarkOrderPending, &err);
            self.compensate(ctx).await;
            return Err(CheckoutError::OrderUpdateFailed(err));
        }
        ctx.complete_step(CheckoutStep::MarkOrderPending);

        // 8. Settle. A failed settlement is NOT voided: the authorization
        // may still settle later, so it is left for manual reconciliation.
        if let Some(auth_id) = ctx.authorization_id().cloned() {
            ctx.begin_step(CheckoutStep::SettlePayment);
            if let Err(err) = self.payment.settle(&auth_id, ctx.order_id()).await {
                self.log_step_failure(ctx, CheckoutStep::SettlePayment, &err);
                tracing::error!(
                    user_id = %ctx.user_id(),
                    order_id = %ctx.order_id(),
                    payment_id = %auth_id,
                    "settlement failed; authorization left for manual reconciliation"
                );
                ctx.fail_step(CheckoutStep::SettlePayment, &err);
                ctx.forbid_void();
                self.compensate(ctx).await;
                return Err(CheckoutError::PaymentSettlementFailed(err));
            }
            ctx.record_settled();
            ctx.complete_step(CheckoutStep::SettlePayment);
        }

        // 9. Commit the durable order: one atomic write for the order row
        // and every spot finalization.
        ctx.begin_step(CheckoutStep::CommitOrder);
        let order = Order::from_checkout(
            ctx.order_id(),
            ctx.user_id().clone(),
            platform_order_id,
            ctx.authorization_id().cloned(),
            &checkout,
        );
        if let Err(err) = self.store.commit_order(&order, &spot_ids).await {
            self.log_step_failure(ctx, CheckoutStep::CommitOrder, &err);
            if ctx.is_settled() {
                // Money was captured but no local order exists. The one case
                // that cannot be compensated automatically.
                metrics::counter!("reconciliation_required_total").increment(1);
                tracing::error!(
                    user_id = %ctx.user_id(),
                    order_id = %ctx.order_id(),
                    payment_id = ?ctx.authorization_id(),
                    platform_order_id = %platform_order_id,
                    "order persistence failed after settlement; financial reconciliation required"
                );
            }
            ctx.fail_step(CheckoutStep::CommitOrder, &err);
            self.compensate(ctx).await;
            return Err(CheckoutError::OrderPersistenceFailed(err));
        }
        ctx.complete_step(CheckoutStep::CommitOrder);
        ctx.finish_completed();

        // 10. Best-effort follow-ups, detached from the response path.
        let break_ids: HashSet<BreakId> = spots.iter().map(|spot| spot.break_id).collect();
        self.spawn_follow_up(ctx, break_ids.into_iter().collect(), &spots);

        Ok(OrderConfirmation {
            order_id: ctx.order_id(),
            grand_total: checkout.grand_total,
        })
    }

    /// Undoes the side effects accumulated so far: voids the authorization
    /// (unless settled or settlement was attempted), restores reserved
    /// spots, and clears this attempt's ledger rows. Failures here are
    /// logged for manual reconciliation and never surfaced; the caller
    /// already has a terminal error.
    async fn compensate(&self, ctx: &mut SagaContext) {
        ctx.begin_compensation();

        if ctx.must_void_authorization()
            && let Some(auth_id) = ctx.authorization_id().cloned()
        {
            let amount = ctx.authorized_amount().unwrap_or_else(Money::zero);
            if let Err(err) = self.payment.void(&auth_id, amount).await {
                metrics::counter!("compensation_failures_total").increment(1);
                tracing::error!(
                    user_id = %ctx.user_id(),
                    order_id = %ctx.order_id(),
                    payment_id = %auth_id,
                    error = %err,
                    "could not void payment authorization"
                );
            }
        }

        if !ctx.reserved_spots().is_empty() {
            match self
                .store
                .release_spots(ctx.order_id(), ctx.reserved_spots())
                .await
            {
                Ok(restored) => {
                    tracing::info!(
                        user_id = %ctx.user_id(),
                        order_id = %ctx.order_id(),
                        restored,
                        "released spot reservations"
                    );
                }
                Err(err) => {
                    metrics::counter!("compensation_failures_total").increment(1);
                    tracing::error!(
                        user_id = %ctx.user_id(),
                        order_id = %ctx.order_id(),
                        payment_id = ?ctx.authorization_id(),
                        error = %err,
                        "could not release spot reservations; sweeper will reclaim"
                    );
                }
            }
        }

        ctx.finish_failed();
        tracing::warn!(
            user_id = %ctx.user_id(),
            order_id = %ctx.order_id(),
            reason = ctx.failure_reason().unwrap_or("unknown"),
            "checkout failed"
        );
    }

    /// Registers the purchaser as a follower of each purchased break and
    /// deletes this attempt's ledger rows. Runs detached; failures are
    /// logged only and never affect the already-returned confirmation.
    fn spawn_follow_up(&self, ctx: &SagaContext, break_ids: Vec<BreakId>, spots: &[ProductItem]) {
        let store = self.store.clone();
        let user_id = ctx.user_id().clone();
        let order_id = ctx.order_id();
        let spot_count = spots.len();

        tokio::spawn(async move {
            let follows = store.record_follows(&user_id, &break_ids);
            let cleanup = store.clear_reservations(order_id);
            let (follows, cleanup) = futures_util::future::join(follows, cleanup).await;

            if let Err(err) = follows {
                tracing::warn!(
                    user_id = %user_id,
                    order_id = %order_id,
                    error = %err,
                    "could not record break follows"
                );
            }
            match cleanup {
                Ok(removed) => {
                    tracing::debug!(order_id = %order_id, removed, spot_count, "ledger cleaned");
                }
                Err(err) => {
                    tracing::warn!(
                        user_id = %user_id,
                        order_id = %order_id,
                        error = %err,
                        "could not clean reservation ledger"
                    );
                }
            }
        });
    }

    fn log_step_failure(
        &self,
        ctx: &SagaContext,
        step: CheckoutStep,
        err: &impl std::fmt::Display,
    ) {
        tracing::warn!(
            user_id = %ctx.user_id(),
            order_id = %ctx.order_id(),
            payment_id = ?ctx.authorization_id(),
            step = %step,
            error = %err,
            "checkout step failed"
        );
    }
}
