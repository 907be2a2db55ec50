//! Durable order record.

use chrono::{DateTime, Utc};
use common::{AuthorizationId, OrderId, PlatformOrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::checkout::Checkout;
use crate::money::Money;

/// Record of a completed purchase. Created exactly once, atomically with the
/// finalization of its spots, and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Order record on the commerce platform.
    pub platform_order_id: PlatformOrderId,
    /// Payment authorization that was settled for this order. None for
    /// zero-total orders, which skip the gateway entirely.
    pub payment_id: Option<AuthorizationId>,
    pub subtotal: Money,
    pub tax_total: Money,
    pub shipping_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds the order row for a checkout, copying its monetary breakdown.
    pub fn from_checkout(
        id: OrderId,
        user_id: UserId,
        platform_order_id: PlatformOrderId,
        payment_id: Option<AuthorizationId>,
        checkout: &Checkout,
    ) -> Self {
        Self {
            id,
            user_id,
            platform_order_id,
            payment_id,
            subtotal: checkout.subtotal,
            tax_total: checkout.tax_total,
            shipping_total: checkout.shipping_total,
            discount_total: checkout.discount_total,
            grand_total: checkout.grand_total,
            created_at: Utc::now(),
        }
    }
}
