//! The `MarketplaceStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BreakId, OrderId, ProductItemId, UserId};
use domain::{LineItemKey, Order, ProductItem};

use crate::error::Result;

/// Access to the inventory, reservation ledger, order, and follow tables.
///
/// Reservation contract: [`reserve_spots`](MarketplaceStore::reserve_spots)
/// attempts, for each spot, one logical operation combining the conditional
/// quantity decrement (`quantity == 1` and unsold) with the ledger insert
/// (unique on the spot id). A spot where either half loses the race is left
/// untouched. [`reserved_spots`](MarketplaceStore::reserved_spots) is the
/// authority on which attempts landed: callers must compare it against the
/// requested set rather than trust their own bookkeeping.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Resolves cart line items to spots, including the owning break's
    /// status. Spots are returned regardless of availability so callers can
    /// distinguish "already sold" from "does not exist".
    async fn find_spots(&self, keys: &[LineItemKey]) -> Result<Vec<ProductItem>>;

    /// Attempts to reserve each spot for the given order.
    async fn reserve_spots(
        &self,
        order_id: OrderId,
        user_id: &UserId,
        spot_ids: &[ProductItemId],
    ) -> Result<()>;

    /// Returns the spot ids whose ledger entries belong to the given order.
    async fn reserved_spots(&self, order_id: OrderId) -> Result<Vec<ProductItemId>>;

    /// Restores `quantity = 1` on the given spots where the order's ledger
    /// entry is present and the spot is still unsold, then deletes the
    /// order's ledger rows. Returns the number of spots restored. Never
    /// touches a spot another process has finalized.
    async fn release_spots(&self, order_id: OrderId, spot_ids: &[ProductItemId]) -> Result<u64>;

    /// Inserts the order row and finalizes its spots (`order_id` set,
    /// `quantity = 0`) in one atomic request.
    async fn commit_order(&self, order: &Order, spot_ids: &[ProductItemId]) -> Result<()>;

    /// Deletes the ledger rows of a finished saga. Returns rows removed.
    async fn clear_reservations(&self, order_id: OrderId) -> Result<u64>;

    /// Reclaims reservations older than the cutoff: resets `quantity = 1`
    /// where the spot is unsold and stale, and clears the matching ledger
    /// rows. Returns the number of spots reclaimed. Idempotent and
    /// one-directional, so it is safe to run concurrently with live sagas.
    async fn release_expired_reservations(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Records the user as a follower of each break. Idempotent.
    async fn record_follows(&self, user_id: &UserId, break_ids: &[BreakId]) -> Result<()>;
}
