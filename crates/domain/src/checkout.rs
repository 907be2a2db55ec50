//! Checkout representation returned by the commerce platform.

use common::CartId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One physical line item in the platform cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Catalog product ID on the commerce platform.
    pub product_id: i64,
    /// Variant ID on the commerce platform; each spot is one variant.
    pub variant_id: i64,
    pub quantity: u32,
}

/// Key used to match a cart line item to a spot in the marketplace store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemKey {
    pub product_id: i64,
    pub variant_id: i64,
}

impl From<&CartLineItem> for LineItemKey {
    fn from(item: &CartLineItem) -> Self {
        Self {
            product_id: item.product_id,
            variant_id: item.variant_id,
        }
    }
}

/// A cart with its computed totals, as fetched from the commerce platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub cart_id: CartId,
    pub line_items: Vec<CartLineItem>,
    /// Subtotal excluding tax.
    pub subtotal: Money,
    pub tax_total: Money,
    /// Shipping cost excluding tax.
    pub shipping_total: Money,
    pub discount_total: Money,
    pub grand_total: Money,
}

impl Checkout {
    /// Returns the match keys for every line item in the cart.
    pub fn line_item_keys(&self) -> Vec<LineItemKey> {
        self.line_items.iter().map(LineItemKey::from).collect()
    }
}
