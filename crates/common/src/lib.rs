//! Shared identifier types used across the marketplace crates.

pub mod types;

pub use types::{
    AuthorizationId, BreakId, CartId, OrderId, PlatformOrderId, ProductItemId, UserId,
};
