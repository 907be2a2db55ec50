//! Data store boundary for the break marketplace.
//!
//! Every mutation that participates in the purchase flow is a conditional
//! single-statement update returning an affected-row count; the store's
//! atomicity guarantee for those statements is the only serialization
//! primitive the system relies on. The one multi-row write is
//! [`MarketplaceStore::commit_order`], which must apply the order row and
//! its spot finalizations as a single request.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::MarketplaceStore;
