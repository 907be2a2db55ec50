//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Saga has not started yet.
    #[default]
    NotStarted,

    /// Saga steps are being executed.
    Running,

    /// A step failed and compensating transactions are in progress.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if the saga can begin running.
    pub fn can_run(&self) -> bool {
        matches!(self, SagaState::NotStarted)
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of the order-creation saga, in execution order.
///
/// Reservation is the serialization point: everything before it is free of
/// side effects, everything after it must be compensated on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckoutStep {
    FetchCheckout,
    ResolveSpots,
    ReserveSpots,
    AuthorizePayment,
    CreatePlatformOrder,
    MarkOrderPending,
    SettlePayment,
    CommitOrder,
}

impl CheckoutStep {
    /// Every step in execution order.
    pub const ALL: [CheckoutStep; 8] = [
        CheckoutStep::FetchCheckout,
        CheckoutStep::ResolveSpots,
        CheckoutStep::ReserveSpots,
        CheckoutStep::AuthorizePayment,
        CheckoutStep::CreatePlatformOrder,
        CheckoutStep::MarkOrderPending,
        CheckoutStep::SettlePayment,
        CheckoutStep::CommitOrder,
    ];

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::FetchCheckout => "fetch_checkout",
            CheckoutStep::ResolveSpots => "resolve_spots",
            CheckoutStep::ReserveSpots => "reserve_spots",
            CheckoutStep::AuthorizePayment => "authorize_payment",
            CheckoutStep::CreatePlatformOrder => "create_platform_order",
            CheckoutStep::MarkOrderPending => "mark_order_pending",
            CheckoutStep::SettlePayment => "settle_payment",
            CheckoutStep::CommitOrder => "commit_order",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
