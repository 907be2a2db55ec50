//! Order-creation saga for the break marketplace.
//!
//! The saga drives a checkout through its external collaborators (the
//! marketplace store, the payment gateway, and the commerce platform)
//! with compensating actions on failure:
//!
//! 1. Fetch the checkout and resolve its line items to spots
//! 2. Reserve every spot (conditional decrement + ledger entry)
//! 3. Authorize the payment under the generated order id
//! 4. Create the platform order and mark it pending
//! 5. Settle the payment
//! 6. Commit the durable order, finalizing the spots
//!
//! Any step failure releases the reservations and voids the authorization
//! when that is still safe. The companion [`ReservationSweeper`] reclaims
//! reservations abandoned by crashed attempts.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod services;
pub mod state;
pub mod sweeper;

pub use context::SagaContext;
pub use coordinator::{OrderConfirmation, SagaCoordinator};
pub use error::CheckoutError;
pub use services::{
    AuthState, AuthorizationRequest, CommerceConfig, CommerceError, CommercePlatform,
    HttpCommercePlatform, HttpPaymentGateway, InMemoryCommercePlatform, InMemoryPaymentGateway,
    PaymentAuthorization, PaymentError, PaymentGateway, PaymentGatewayConfig,
};
pub use state::{CheckoutStep, SagaState};
pub use sweeper::{ReservationSweeper, SweeperConfig};
