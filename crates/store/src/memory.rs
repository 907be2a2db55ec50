//! In-memory store for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BreakId, OrderId, ProductItemId, UserId};
use domain::{BreakStatus, LineItemKey, Order, ProductItem};

use crate::error::{Result, StoreError};
use crate::store::MarketplaceStore;

#[derive(Debug, Clone)]
struct ItemRow {
    break_id: BreakId,
    title: String,
    quantity: i32,
    order_id: Option<OrderId>,
    bc_product_id: i64,
    bc_variant_id: i64,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ReservationRow {
    order_id: OrderId,
    #[allow(dead_code)]
    user_id: UserId,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    breaks: HashMap<BreakId, BreakStatus>,
    items: HashMap<ProductItemId, ItemRow>,
    reservations: HashMap<ProductItemId, ReservationRow>,
    orders: HashMap<OrderId, Order>,
    follows: HashSet<(UserId, BreakId)>,
    fail_on_find: bool,
    fail_on_reserve: bool,
    fail_on_commit: bool,
    fail_on_release: bool,
    fail_on_follows: bool,
}

/// In-memory [`MarketplaceStore`] with the same conditional-update semantics
/// as the Postgres implementation, plus seeding and failure toggles for
/// tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a break with the given status.
    pub fn insert_break(&self, status: BreakStatus) -> BreakId {
        let id = BreakId::new();
        self.state.write().unwrap().breaks.insert(id, status);
        id
    }

    /// Seeds one available spot under the break.
    pub fn insert_spot(&self, break_id: BreakId, title: &str, key: LineItemKey) -> ProductItemId {
        let id = ProductItemId::new();
        self.state.write().unwrap().items.insert(
            id,
            ItemRow {
                break_id,
                title: title.to_string(),
                quantity: 1,
                order_id: None,
                bc_product_id: key.product_id,
                bc_variant_id: key.variant_id,
                updated_at: Utc::now(),
            },
        );
        id
    }

    /// Returns the current state of a spot.
    pub fn spot(&self, id: ProductItemId) -> Option<ProductItem> {
        let state = self.state.read().unwrap();
        let row = state.items.get(&id)?;
        Some(Self::to_product_item(&state, id, row))
    }

    /// Returns the stored order, if committed.
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.state.read().unwrap().orders.get(&id).cloned()
    }

    /// Returns the number of committed orders.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns the number of live ledger entries.
    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }

    /// Returns true if the user follows the break.
    pub fn has_follow(&self, user_id: &UserId, break_id: BreakId) -> bool {
        self.state
            .read()
            .unwrap()
            .follows
            .contains(&(user_id.clone(), break_id))
    }

    /// Returns the number of follow rows.
    pub fn follow_count(&self) -> usize {
        self.state.read().unwrap().follows.len()
    }

    /// Rewrites a reservation's timestamps, for expiry tests.
    pub fn backdate_reservation(&self, spot_id: ProductItemId, when: DateTime<Utc>) {
        let mut state = self.state.write().unwrap();
        if let Some(item) = state.items.get_mut(&spot_id) {
            item.updated_at = when;
        }
        if let Some(res) = state.reservations.get_mut(&spot_id) {
            res.created_at = when;
        }
    }

    /// Configures `find_spots` to fail.
    pub fn set_fail_on_find(&self, fail: bool) {
        self.state.write().unwrap().fail_on_find = fail;
    }

    /// Configures `reserve_spots` to fail.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_reserve = fail;
    }

    /// Configures `commit_order` to fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().unwrap().fail_on_commit = fail;
    }

    /// Configures `release_spots` to fail.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.state.write().unwrap().fail_on_release = fail;
    }

    /// Configures `record_follows` to fail.
    pub fn set_fail_on_follows(&self, fail: bool) {
        self.state.write().unwrap().fail_on_follows = fail;
    }

    fn to_product_item(state: &State, id: ProductItemId, row: &ItemRow) -> ProductItem {
        let break_status = state
            .breaks
            .get(&row.break_id)
            .copied()
            .unwrap_or(BreakStatus::Draft);
        ProductItem {
            id,
            break_id: row.break_id,
            title: row.title.clone(),
            quantity: row.quantity,
            order_id: row.order_id,
            break_status,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn find_spots(&self, keys: &[LineItemKey]) -> Result<Vec<ProductItem>> {
        let state = self.state.read().unwrap();
        if state.fail_on_find {
            return Err(StoreError::Unavailable("find_spots".to_string()));
        }

        let wanted: HashSet<LineItemKey> = keys.iter().copied().collect();
        let found = state
            .items
            .iter()
            .filter(|(_, row)| {
                wanted.contains(&LineItemKey {
                    product_id: row.bc_product_id,
                    variant_id: row.bc_variant_id,
                })
            })
            .map(|(id, row)| Self::to_product_item(&state, *id, row))
            .collect();
        Ok(found)
    }

    async fn reserve_spots(
        &self,
        order_id: OrderId,
        user_id: &UserId,
        spot_ids: &[ProductItemId],
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_reserve {
            return Err(StoreError::Unavailable("reserve_spots".to_string()));
        }

        for &id in spot_ids {
            // Both halves of the reservation must land: the conditional
            // decrement and the unique ledger insert. A spot losing either
            // race is skipped, not stolen.
            if state.reservations.contains_key(&id) {
                continue;
            }
            let Some(item) = state.items.get_mut(&id) else {
                continue;
            };
            if item.quantity != 1 || item.order_id.is_some() {
                continue;
            }
            item.quantity = 0;
            item.updated_at = Utc::now();
            state.reservations.insert(
                id,
                ReservationRow {
                    order_id,
                    user_id: user_id.clone(),
                    created_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    async fn reserved_spots(&self, order_id: OrderId) -> Result<Vec<ProductItemId>> {
        let state = self.state.read().unwrap();
        Ok(state
            .reservations
            .iter()
            .filter(|(_, row)| row.order_id == order_id)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn release_spots(&self, order_id: OrderId, spot_ids: &[ProductItemId]) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_release {
            return Err(StoreError::Unavailable("release_spots".to_string()));
        }

        let mut restored = 0;
        for &id in spot_ids {
            let held = state
                .reservations
                .get(&id)
                .is_some_and(|row| row.order_id == order_id);
            if !held {
                continue;
            }
            if let Some(item) = state.items.get_mut(&id)
                && item.order_id.is_none()
                && item.quantity == 0
            {
                item.quantity = 1;
                item.updated_at = Utc::now();
                restored += 1;
            }
        }
        state.reservations.retain(|_, row| row.order_id != order_id);
        Ok(restored)
    }

    async fn commit_order(&self, order: &Order, spot_ids: &[ProductItemId]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_commit {
            return Err(StoreError::Unavailable("commit_order".to_string()));
        }

        let expected = spot_ids.len() as u64;
        let affected = spot_ids
            .iter()
            .filter(|id| state.items.contains_key(*id))
            .count() as u64;
        if affected != expected {
            return Err(StoreError::RowCountMismatch { expected, affected });
        }

        state.orders.insert(order.id, order.clone());
        for id in spot_ids {
            if let Some(item) = state.items.get_mut(id) {
                item.order_id = Some(order.id);
                item.quantity = 0;
                item.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn clear_reservations(&self, order_id: OrderId) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let before = state.reservations.len();
        state.reservations.retain(|_, row| row.order_id != order_id);
        Ok((before - state.reservations.len()) as u64)
    }

    async fn release_expired_reservations(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().unwrap();

        let mut reclaimed = Vec::new();
        for (id, item) in state.items.iter_mut() {
            if item.quantity == 0 && item.order_id.is_none() && item.updated_at < cutoff {
                item.quantity = 1;
                item.updated_at = Utc::now();
                reclaimed.push(*id);
            }
        }
        for id in &reclaimed {
            state.reservations.remove(id);
        }
        Ok(reclaimed.len() as u64)
    }

    async fn record_follows(&self, user_id: &UserId, break_ids: &[BreakId]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_follows {
            return Err(StoreError::Unavailable("record_follows".to_string()));
        }
        for &break_id in break_ids {
            state.follows.insert((user_id.clone(), break_id));
        }
        Ok(())
    }
}
