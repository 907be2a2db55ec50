//! Reservation-expiry sweeper.

use std::time::Duration;

use chrono::Utc;
use store::{MarketplaceStore, StoreError};

/// Sweeper schedule and grace window.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// How long a reservation may live before it is considered abandoned.
    pub grace: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            grace: Duration::from_secs(300),
        }
    }
}

/// Periodic job that reclaims spots left reserved by sagas that crashed
/// before compensating.
///
/// The reclaim is a single conditional update guarded by `order_id IS NULL`,
/// so it can never touch a finalized sale, and it only ever grants quantity
/// back. At worst it falsely reclaims a spot held by a slow-but-alive saga,
/// whose commit then fails the affected-row check. That rare failure mode is
/// accepted; no distributed lock is needed.
pub struct ReservationSweeper<S: MarketplaceStore> {
    store: S,
    config: SweeperConfig,
}

impl<S: MarketplaceStore> ReservationSweeper<S> {
    /// Creates a new sweeper.
    pub fn new(store: S, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    /// Runs one sweep, returning the number of spots reclaimed.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        let grace = chrono::Duration::from_std(self.config.grace)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let cutoff = Utc::now() - grace;

        let reclaimed = self.store.release_expired_reservations(cutoff).await?;
        metrics::counter!("reservations_reclaimed_total").increment(reclaimed);
        if reclaimed > 0 {
            tracing::info!(reclaimed, %cutoff, "reclaimed expired spot reservations");
        }
        Ok(reclaimed)
    }

    /// Runs the sweep on its configured interval, forever.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep_once().await {
                tracing::error!(error = %err, "reservation sweep failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use common::{OrderId, UserId};
    use domain::{BreakStatus, LineItemKey};
    use store::InMemoryStore;

    fn sweeper(store: &InMemoryStore) -> ReservationSweeper<InMemoryStore> {
        ReservationSweeper::new(store.clone(), SweeperConfig::default())
    }

    async fn reserve_spot(store: &InMemoryStore) -> common::ProductItemId {
        let break_id = store.insert_break(BreakStatus::Upcoming);
        let spot = store.insert_spot(
            break_id,
            "Spot 1",
            LineItemKey {
                product_id: 100,
                variant_id: 1,
            },
        );
        store
            .reserve_spots(OrderId::new(), &UserId::new("u1"), &[spot])
            .await
            .unwrap();
        spot
    }

    #[tokio::test]
    async fn reclaims_reservations_older_than_the_grace_window() {
        let store = InMemoryStore::new();
        let spot = reserve_spot(&store).await;
        store.backdate_reservation(spot, Utc::now() - ChronoDuration::minutes(10));

        let reclaimed = sweeper(&store).sweep_once().await.unwrap();

        assert_eq!(reclaimed, 1);
        assert!(store.spot(spot).unwrap().is_available());
        assert_eq!(store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn leaves_recent_reservations_alone() {
        let store = InMemoryStore::new();
        let spot = reserve_spot(&store).await;

        let reclaimed = sweeper(&store).sweep_once().await.unwrap();

        assert_eq!(reclaimed, 0);
        assert!(store.spot(spot).unwrap().is_reserved());
        assert_eq!(store.reservation_count(), 1);
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let store = InMemoryStore::new();
        let spot = reserve_spot(&store).await;
        store.backdate_reservation(spot, Utc::now() - ChronoDuration::minutes(10));

        let sweeper = sweeper(&store);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }
}
