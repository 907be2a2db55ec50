//! Domain layer for the break marketplace.
//!
//! A break is a live-sale event with a fixed set of individually numbered
//! spots. Each spot is a [`ProductItem`] that can be sold exactly once; the
//! purchase flow holds spots through an optimistic reservation (quantity
//! decrement plus a ledger entry) before the durable [`Order`] is committed.

pub mod breaks;
pub mod checkout;
pub mod money;
pub mod order;
pub mod product_item;

pub use breaks::{BreakStatus, ParseBreakStatusError};
pub use checkout::{CartLineItem, Checkout, LineItemKey};
pub use money::Money;
pub use order::Order;
pub use product_item::ProductItem;
