//! Commerce platform trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CartId, PlatformOrderId};
use domain::Checkout;
use thiserror::Error;

/// Payment method recorded on platform orders paid through the app.
pub const EXTERNAL_PAYMENT_METHOD: &str = "Cards & Treasure App";

/// Platform status id for an order awaiting external payment confirmation.
pub const ORDER_STATUS_PENDING: i32 = 11;

/// Errors returned by the commerce platform.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// The platform answered with a non-success HTTP status.
    #[error("commerce platform returned status {status}")]
    Status { status: u16 },

    /// The platform could not be reached.
    #[error("commerce platform unavailable: {0}")]
    Unavailable(String),

    /// The platform did not answer within the request timeout.
    #[error("commerce platform request timed out")]
    Timeout,

    /// The platform answered with a payload we could not decode.
    #[error("unexpected response from commerce platform: {0}")]
    Decode(String),

    /// The cart does not exist on the platform.
    #[error("cart {0} not found")]
    CartNotFound(CartId),
}

/// Trait for commerce platform operations.
#[async_trait]
pub trait CommercePlatform: Send + Sync {
    /// Fetches a checkout (cart plus computed totals).
    async fn get_checkout(&self, cart_id: &CartId) -> Result<Checkout, CommerceError>;

    /// Creates an order from the cart's current contents.
    async fn create_order(&self, cart_id: &CartId) -> Result<PlatformOrderId, CommerceError>;

    /// Marks the order as externally paid and pending fulfillment.
    async fn mark_order_pending(&self, order_id: PlatformOrderId) -> Result<(), CommerceError>;
}

#[derive(Debug, Default)]
struct InMemoryCommerceState {
    checkouts: HashMap<CartId, Checkout>,
    orders: Vec<(PlatformOrderId, CartId)>,
    pending: HashSet<PlatformOrderId>,
    next_order_id: i64,
    fail_on_get_checkout: bool,
    fail_on_create_order: bool,
    fail_on_mark_pending: bool,
}

/// In-memory commerce platform for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommercePlatform {
    state: Arc<RwLock<InMemoryCommerceState>>,
}

impl InMemoryCommercePlatform {
    /// Creates a new in-memory commerce platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a checkout the platform will serve.
    pub fn insert_checkout(&self, checkout: Checkout) {
        let mut state = self.state.write().unwrap();
        state
            .checkouts
            .insert(checkout.cart_id.clone(), checkout);
    }

    /// Configures `get_checkout` to fail.
    pub fn set_fail_on_get_checkout(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get_checkout = fail;
    }

    /// Configures `create_order` to fail.
    pub fn set_fail_on_create_order(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create_order = fail;
    }

    /// Configures `mark_order_pending` to fail.
    pub fn set_fail_on_mark_pending(&self, fail: bool) {
        self.state.write().unwrap().fail_on_mark_pending = fail;
    }

    /// Returns the number of platform orders created.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns true if the platform order was marked pending.
    pub fn is_pending(&self, order_id: PlatformOrderId) -> bool {
        self.state.read().unwrap().pending.contains(&order_id)
    }
}

#[async_trait]
impl CommercePlatform for InMemoryCommercePlatform {
    async fn get_checkout(&self, cart_id: &CartId) -> Result<Checkout, CommerceError> {
        let state = self.state.read().unwrap();
        if state.fail_on_get_checkout {
            return Err(CommerceError::Unavailable("checkouts".to_string()));
        }
        state
            .checkouts
            .get(cart_id)
            .cloned()
            .ok_or_else(|| CommerceError::CartNotFound(cart_id.clone()))
    }

    async fn create_order(&self, cart_id: &CartId) -> Result<PlatformOrderId, CommerceError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_create_order {
            return Err(CommerceError::Status { status: 500 });
        }
        if !state.checkouts.contains_key(cart_id) {
            return Err(CommerceError::CartNotFound(cart_id.clone()));
        }

        state.next_order_id += 1;
        let order_id = PlatformOrderId::new(state.next_order_id);
        state.orders.push((order_id, cart_id.clone()));
        Ok(order_id)
    }

    async fn mark_order_pending(&self, order_id: PlatformOrderId) -> Result<(), CommerceError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_mark_pending {
            return Err(CommerceError::Status { status: 500 });
        }
        if !state.orders.iter().any(|(id, _)| *id == order_id) {
            return Err(CommerceError::Status { status: 404 });
        }
        state.pending.insert(order_id);
        Ok(())
    }
}
