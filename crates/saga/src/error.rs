//! Checkout error taxonomy.

use store::StoreError;
use thiserror::Error;

use crate::services::commerce::CommerceError;
use crate::services::payment::PaymentError;

/// Terminal, user-facing checkout failures.
///
/// Each variant maps to a stable machine-readable code via
/// [`code`](CheckoutError::code). Display messages are safe to show to the
/// caller; collaborator detail rides along as `#[source]` for logs only.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The checkout could not be loaded from the commerce platform.
    #[error("could not load the checkout")]
    CheckoutUnavailable(#[source] CommerceError),

    /// Cart line items could not be matched to spots in the marketplace.
    #[error("checkout items do not match available break spots")]
    ItemLookupFailed(#[source] Option<StoreError>),

    /// A requested spot is sold, held by another purchase, or its break is
    /// no longer open for sale.
    #[error("one or more spots are no longer available")]
    SpotNoLongerAvailable,

    /// The payment gateway declined or failed the authorization.
    #[error("payment could not be authorized")]
    PaymentAuthorizationFailed(#[source] PaymentError),

    /// The payment was declined for insufficient funds.
    #[error("payment declined: insufficient funds")]
    InsufficientFunds,

    /// The commerce platform could not create the order.
    #[error("order could not be created")]
    OrderCreationFailed(#[source] CommerceError),

    /// The commerce platform order could not be transitioned to pending.
    #[error("order could not be updated")]
    OrderUpdateFailed(#[source] CommerceError),

    /// The authorized payment could not be settled.
    #[error("payment could not be completed")]
    PaymentSettlementFailed(#[source] PaymentError),

    /// The durable order record could not be written.
    #[error("order could not be saved")]
    OrderPersistenceFailed(#[source] StoreError),
}

impl CheckoutError {
    /// Returns the stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::CheckoutUnavailable(_) => "checkout_unavailable",
            CheckoutError::ItemLookupFailed(_) => "item_lookup_failed",
            CheckoutError::SpotNoLongerAvailable => "spot_no_longer_available",
            CheckoutError::PaymentAuthorizationFailed(_) => "payment_authorization_failed",
            CheckoutError::InsufficientFunds => "insufficient_funds",
            CheckoutError::OrderCreationFailed(_) => "order_creation_failed",
            CheckoutError::OrderUpdateFailed(_) => "order_update_failed",
            CheckoutError::PaymentSettlementFailed(_) => "payment_settlement_failed",
            CheckoutError::OrderPersistenceFailed(_) => "order_persistence_failed",
        }
    }
}
