//! Per-attempt saga bookkeeping.

use common::{AuthorizationId, OrderId, PlatformOrderId, ProductItemId, UserId};
use domain::Money;

use crate::state::{CheckoutStep, SagaState};

/// Everything a single checkout attempt accumulates while it runs: the
/// reservation set, the payment authorization and whether it settled, and
/// the platform order. Compensation reads this to decide what to undo.
///
/// The order id is generated once, before any side effect, and reused as
/// the payment merchant reference for the whole attempt.
#[derive(Debug, Clone)]
pub struct SagaContext {
    order_id: OrderId,
    user_id: UserId,
    state: SagaState,
    current_step: Option<CheckoutStep>,
    completed_steps: Vec<CheckoutStep>,
    reserved_spots: Vec<ProductItemId>,
    authorization: Option<AuthorizationId>,
    authorized_amount: Option<Money>,
    settled: bool,
    /// Cleared when a settlement attempt fails: an authorization that
    /// failed to settle may still be settleable later and must be left for
    /// manual reconciliation, never auto-voided.
    void_allowed: bool,
    platform_order_id: Option<PlatformOrderId>,
    failure_reason: Option<String>,
}

impl SagaContext {
    /// Creates the context for a new checkout attempt.
    pub fn new(order_id: OrderId, user_id: UserId) -> Self {
        Self {
            order_id,
            user_id,
            state: SagaState::NotStarted,
            current_step: None,
            completed_steps: Vec::new(),
            reserved_spots: Vec::new(),
            authorization: None,
            authorized_amount: None,
            settled: false,
            void_allowed: true,
            platform_order_id: None,
            failure_reason: None,
        }
    }

    /// Marks the saga as running.
    pub fn start(&mut self) {
        debug_assert!(self.state.can_run());
        self.state = SagaState::Running;
    }

    /// Marks a step as the one currently executing.
    pub fn begin_step(&mut self, step: CheckoutStep) {
        self.current_step = Some(step);
    }

    /// Marks the current step as completed.
    pub fn complete_step(&mut self, step: CheckoutStep) {
        self.completed_steps.push(step);
    }

    /// Records why the current step failed.
    pub fn fail_step(&mut self, step: CheckoutStep, reason: impl std::fmt::Display) {
        self.failure_reason = Some(format!("{}: {}", step.as_str(), reason));
    }

    /// Records the set of spots this attempt holds per the ledger.
    pub fn record_reserved(&mut self, spots: Vec<ProductItemId>) {
        self.reserved_spots = spots;
    }

    /// Records the payment authorization placed for this attempt.
    pub fn record_authorization(&mut self, id: AuthorizationId, amount: Money) {
        self.authorization = Some(id);
        self.authorized_amount = Some(amount);
    }

    /// Records that the authorization settled.
    pub fn record_settled(&mut self) {
        self.settled = true;
    }

    /// Marks the authorization as off-limits for compensation.
    pub fn forbid_void(&mut self) {
        self.void_allowed = false;
    }

    /// Records the order created on the commerce platform.
    pub fn record_platform_order(&mut self, id: PlatformOrderId) {
        self.platform_order_id = Some(id);
    }

    /// Transitions to compensating.
    pub fn begin_compensation(&mut self) {
        debug_assert!(self.state.can_compensate());
        self.state = SagaState::Compensating;
    }

    /// Terminal success.
    pub fn finish_completed(&mut self) {
        self.state = SagaState::Completed;
    }

    /// Terminal failure (after compensation, or with nothing to compensate).
    pub fn finish_failed(&mut self) {
        self.state = SagaState::Failed;
    }

    // Query methods

    /// Returns the order id generated for this attempt.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Returns the purchasing user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the saga state.
    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Returns the step currently executing.
    pub fn current_step(&self) -> Option<CheckoutStep> {
        self.current_step
    }

    /// Returns the completed steps in order.
    pub fn completed_steps(&self) -> &[CheckoutStep] {
        &self.completed_steps
    }

    /// Returns the spots this attempt holds.
    pub fn reserved_spots(&self) -> &[ProductItemId] {
        &self.reserved_spots
    }

    /// Returns the authorization id, if one was placed.
    pub fn authorization_id(&self) -> Option<&AuthorizationId> {
        self.authorization.as_ref()
    }

    /// Returns the authorized amount, if an authorization was placed.
    pub fn authorized_amount(&self) -> Option<Money> {
        self.authorized_amount
    }

    /// Returns true once the authorization has settled.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Returns the platform order id, if one was created.
    pub fn platform_order_id(&self) -> Option<PlatformOrderId> {
        self.platform_order_id
    }

    /// Returns the recorded failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns true if compensation must void the payment authorization:
    /// one exists, it has not settled, and no settlement attempt failed.
    pub fn must_void_authorization(&self) -> bool {
        self.authorization.is_some() && !self.settled && self.void_allowed
    }
}
