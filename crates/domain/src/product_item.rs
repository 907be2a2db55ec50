//! Sellable spots.

use chrono::{DateTime, Utc};
use common::{BreakId, OrderId, ProductItemId};
use serde::{Deserialize, Serialize};

use crate::breaks::BreakStatus;

/// One sellable spot within a break.
///
/// `quantity` is the sellability bit: 1 means the spot is on the shelf,
/// 0 means it is held by an in-flight purchase or sold. `order_id` is set
/// exactly once, when a purchase commits; a spot with `quantity == 0` and no
/// `order_id` is a live reservation, reclaimable by the expiry sweeper once
/// `updated_at` falls outside the grace window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductItem {
    pub id: ProductItemId,
    pub break_id: BreakId,
    pub title: String,
    pub quantity: i32,
    pub order_id: Option<OrderId>,
    /// Status of the owning break, joined in when items are resolved for a
    /// purchase so sellability can be checked without a second query.
    pub break_status: BreakStatus,
    pub updated_at: DateTime<Utc>,
}

impl ProductItem {
    /// Returns true if the spot is on the shelf and purchasable.
    pub fn is_available(&self) -> bool {
        self.quantity == 1 && self.order_id.is_none()
    }

    /// Returns true if the spot is held by an in-flight purchase.
    pub fn is_reserved(&self) -> bool {
        self.quantity == 0 && self.order_id.is_none()
    }

    /// Returns true if the spot has been sold.
    pub fn is_sold(&self) -> bool {
        self.order_id.is_some()
    }
}
