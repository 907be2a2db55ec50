//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{AuthorizationId, OrderId};
use domain::Money;
use thiserror::Error;

/// Gateway decline code for insufficient funds.
pub const INSUFFICIENT_FUNDS_CODE: &str = "3022";

/// Errors returned by the payment gateway.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// The gateway declined the payment.
    #[error("payment declined (code {code})")]
    Declined { code: String },

    /// The gateway declined the payment for insufficient funds.
    #[error("payment declined: insufficient funds")]
    InsufficientFunds,

    /// The gateway could not be reached.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway did not answer within the request timeout.
    #[error("payment gateway request timed out")]
    Timeout,
}

impl PaymentError {
    /// Returns true for the insufficient-funds decline.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, PaymentError::InsufficientFunds)
    }
}

/// Request to place an authorization hold.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Single-use card token supplied by the client.
    pub payment_token: String,
    /// Merchant reference; the order id generated for this attempt. The
    /// gateway deduplicates by this value, so internal retries of the same
    /// attempt cannot double-authorize.
    pub merchant_ref: OrderId,
    pub amount: Money,
}

/// A hold placed on the customer's card.
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    pub id: AuthorizationId,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Places an authorization hold (no funds move yet).
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PaymentAuthorization, PaymentError>;

    /// Settles a previously placed authorization, transferring funds.
    async fn settle(
        &self,
        auth_id: &AuthorizationId,
        merchant_ref: OrderId,
    ) -> Result<(), PaymentError>;

    /// Voids an unsettled authorization, releasing the hold.
    async fn void(&self, auth_id: &AuthorizationId, amount: Money) -> Result<(), PaymentError>;
}

/// Lifecycle of an authorization on the in-memory gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authorized,
    Settled,
    Voided,
}

#[derive(Debug)]
struct AuthRecord {
    merchant_ref: OrderId,
    #[allow(dead_code)]
    amount: Money,
    state: AuthState,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    auths: HashMap<AuthorizationId, AuthRecord>,
    merchant_refs: Vec<OrderId>,
    next_id: u32,
    fail_on_authorize: bool,
    decline_insufficient_funds: bool,
    fail_on_settle: bool,
    fail_on_void: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline the next authorize call.
    pub fn set_fail_on_authorize(&self, fail: bool) {
        self.state.write().unwrap().fail_on_authorize = fail;
    }

    /// Configures the gateway to decline for insufficient funds.
    pub fn set_decline_insufficient_funds(&self, decline: bool) {
        self.state.write().unwrap().decline_insufficient_funds = decline;
    }

    /// Configures the gateway to fail settlement calls.
    pub fn set_fail_on_settle(&self, fail: bool) {
        self.state.write().unwrap().fail_on_settle = fail;
    }

    /// Configures the gateway to fail void calls.
    pub fn set_fail_on_void(&self, fail: bool) {
        self.state.write().unwrap().fail_on_void = fail;
    }

    /// Returns the number of authorizations placed.
    pub fn authorization_count(&self) -> usize {
        self.state.read().unwrap().auths.len()
    }

    /// Returns the state of an authorization, if it exists.
    pub fn auth_state(&self, auth_id: &AuthorizationId) -> Option<AuthState> {
        self.state
            .read()
            .unwrap()
            .auths
            .get(auth_id)
            .map(|a| a.state)
    }

    /// Returns the state of the authorization placed for a merchant ref.
    pub fn auth_state_for_ref(&self, merchant_ref: OrderId) -> Option<AuthState> {
        self.state
            .read()
            .unwrap()
            .auths
            .values()
            .find(|a| a.merchant_ref == merchant_ref)
            .map(|a| a.state)
    }

    /// Returns every merchant reference the gateway has seen, in call order.
    pub fn merchant_refs(&self) -> Vec<OrderId> {
        self.state.read().unwrap().merchant_refs.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PaymentAuthorization, PaymentError> {
        let mut state = self.state.write().unwrap();
        state.merchant_refs.push(request.merchant_ref);

        if state.decline_insufficient_funds {
            return Err(PaymentError::InsufficientFunds);
        }
        if state.fail_on_authorize {
            return Err(PaymentError::Declined {
                code: "5000".to_string(),
            });
        }

        state.next_id += 1;
        let id = AuthorizationId::new(format!("AUTH-{:04}", state.next_id));
        state.auths.insert(
            id.clone(),
            AuthRecord {
                merchant_ref: request.merchant_ref,
                amount: request.amount,
                state: AuthState::Authorized,
            },
        );

        Ok(PaymentAuthorization { id })
    }

    async fn settle(
        &self,
        auth_id: &AuthorizationId,
        _merchant_ref: OrderId,
    ) -> Result<(), PaymentError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_settle {
            return Err(PaymentError::Unavailable("settlements".to_string()));
        }

        match state.auths.get_mut(auth_id) {
            Some(auth) if auth.state == AuthState::Authorized => {
                auth.state = AuthState::Settled;
                Ok(())
            }
            Some(_) => Err(PaymentError::Declined {
                code: "5031".to_string(),
            }),
            None => Err(PaymentError::Declined {
                code: "3201".to_string(),
            }),
        }
    }

    async fn void(&self, auth_id: &AuthorizationId, _amount: Money) -> Result<(), PaymentError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_void {
            return Err(PaymentError::Unavailable("voidauths".to_string()));
        }

        match state.auths.get_mut(auth_id) {
            Some(auth) if auth.state == AuthState::Authorized => {
                auth.state = AuthState::Voided;
                Ok(())
            }
            Some(_) => Err(PaymentError::Declined {
                code: "5031".to_string(),
            }),
            None => Err(PaymentError::Declined {
                code: "3201".to_string(),
            }),
        }
    }
}
