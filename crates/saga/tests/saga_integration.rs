//! Integration tests for the order-creation saga.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use common::{CartId, ProductItemId, UserId};
use domain::{BreakStatus, CartLineItem, Checkout, LineItemKey, Money};
use saga::{
    AuthState, InMemoryCommercePlatform, InMemoryPaymentGateway, ReservationSweeper,
    SagaCoordinator, SweeperConfig,
};
use store::{InMemoryStore, MarketplaceStore};

type TestCoordinator =
    SagaCoordinator<InMemoryStore, InMemoryPaymentGateway, InMemoryCommercePlatform>;

struct TestHarness {
    coordinator: TestCoordinator,
    store: InMemoryStore,
    payment: InMemoryPaymentGateway,
    commerce: InMemoryCommercePlatform,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let payment = InMemoryPaymentGateway::new();
        let commerce = InMemoryCommercePlatform::new();
        let coordinator = SagaCoordinator::new(store.clone(), payment.clone(), commerce.clone());

        Self {
            coordinator,
            store,
            payment,
            commerce,
        }
    }

    /// Seeds a break with `spots` available spots and a matching checkout.
    fn seed_cart(&self, cart_id: &str, spots: usize, status: BreakStatus) -> Vec<ProductItemId> {
        let break_id = self.store.insert_break(status);
        let mut spot_ids = Vec::new();
        let mut line_items = Vec::new();

        for n in 0..spots {
            let key = LineItemKey {
                product_id: 112,
                variant_id: 86 + n as i64,
            };
            spot_ids.push(
                self.store
                    .insert_spot(break_id, &format!("Spot {}", n + 1), key),
            );
            line_items.push(CartLineItem {
                product_id: key.product_id,
                variant_id: key.variant_id,
                quantity: 1,
            });
        }

        self.commerce.insert_checkout(Checkout {
            cart_id: CartId::new(cart_id),
            line_items,
            subtotal: Money::from_cents(5000),
            tax_total: Money::from_cents(400),
            shipping_total: Money::from_cents(599),
            discount_total: Money::zero(),
            grand_total: Money::from_cents(5999),
        });

        spot_ids
    }

    async fn create_order(&self, cart_id: &str) -> Result<saga::OrderConfirmation, saga::CheckoutError> {
        self.coordinator
            .create_order(
                UserId::new("buyer-1"),
                CartId::new(cart_id),
                "tok_visa".to_string(),
            )
            .await
    }

    fn assert_all_available(&self, spot_ids: &[ProductItemId]) {
        for id in spot_ids {
            let spot = self.store.spot(*id).unwrap();
            assert!(
                spot.is_available(),
                "spot {} should be back on the shelf",
                id
            );
        }
    }
}

#[tokio::test]
async fn test_happy_path_two_spots() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 2, BreakStatus::Upcoming);

    let confirmation = h.create_order("cart-1").await.unwrap();

    assert_eq!(confirmation.grand_total, Money::from_cents(5999));
    for id in &spots {
        let spot = h.store.spot(*id).unwrap();
        assert_eq!(spot.order_id, Some(confirmation.order_id));
        assert_eq!(spot.quantity, 0);
    }

    let order = h.store.order(confirmation.order_id).unwrap();
    assert_eq!(order.grand_total, Money::from_cents(5999));
    assert!(order.payment_id.is_some());

    assert_eq!(
        h.payment.auth_state_for_ref(confirmation.order_id),
        Some(AuthState::Settled)
    );
    assert_eq!(h.commerce.order_count(), 1);
}

#[tokio::test]
async fn test_checkout_unavailable_is_terminal_without_side_effects() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);
    h.commerce.set_fail_on_get_checkout(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "checkout_unavailable");
    h.assert_all_available(&spots);
    assert_eq!(h.payment.authorization_count(), 0);
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn test_lookup_mismatch_is_item_lookup_failed() {
    let h = TestHarness::new();
    // Checkout has two line items but only one resolvable spot.
    let break_id = h.store.insert_break(BreakStatus::Upcoming);
    h.store.insert_spot(
        break_id,
        "Spot 1",
        LineItemKey {
            product_id: 112,
            variant_id: 86,
        },
    );
    h.commerce.insert_checkout(Checkout {
        cart_id: CartId::new("cart-1"),
        line_items: vec![
            CartLineItem {
                product_id: 112,
                variant_id: 86,
                quantity: 1,
            },
            CartLineItem {
                product_id: 112,
                variant_id: 999,
                quantity: 1,
            },
        ],
        subtotal: Money::from_cents(5000),
        tax_total: Money::zero(),
        shipping_total: Money::zero(),
        discount_total: Money::zero(),
        grand_total: Money::from_cents(5000),
    });

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "item_lookup_failed");
    assert_eq!(h.store.reservation_count(), 0);
}

#[tokio::test]
async fn test_sold_spot_rejected_without_mutating_siblings() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 2, BreakStatus::Upcoming);

    // Sell the second spot through a competing checkout first.
    let other = TestHarness {
        coordinator: SagaCoordinator::new(
            h.store.clone(),
            h.payment.clone(),
            h.commerce.clone(),
        ),
        store: h.store.clone(),
        payment: h.payment.clone(),
        commerce: h.commerce.clone(),
    };
    other.commerce.insert_checkout(Checkout {
        cart_id: CartId::new("cart-2"),
        line_items: vec![CartLineItem {
            product_id: 112,
            variant_id: 87,
            quantity: 1,
        }],
        subtotal: Money::from_cents(2500),
        tax_total: Money::zero(),
        shipping_total: Money::zero(),
        discount_total: Money::zero(),
        grand_total: Money::from_cents(2500),
    });
    other.create_order("cart-2").await.unwrap();

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "spot_no_longer_available");
    // The first spot was never reserved.
    assert!(h.store.spot(spots[0]).unwrap().is_available());
    assert!(h.store.spot(spots[1]).unwrap().is_sold());
    assert_eq!(h.store.order_count(), 1);
}

#[tokio::test]
async fn test_live_break_is_not_sellable() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Live);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "spot_no_longer_available");
    h.assert_all_available(&spots);
    assert_eq!(h.payment.authorization_count(), 0);
}

#[tokio::test]
async fn test_partial_reservation_releases_siblings() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 2, BreakStatus::Upcoming);

    // A competing attempt already holds the second spot.
    let rival_order = common::OrderId::new();
    h.store
        .reserve_spots(rival_order, &UserId::new("rival"), &[spots[1]])
        .await
        .unwrap();

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "spot_no_longer_available");
    // The sibling reservation this saga won was released...
    assert!(h.store.spot(spots[0]).unwrap().is_available());
    // ...while the rival's hold is untouched.
    assert!(h.store.spot(spots[1]).unwrap().is_reserved());
    assert_eq!(
        h.store.reserved_spots(rival_order).await.unwrap(),
        vec![spots[1]]
    );
    assert_eq!(h.payment.authorization_count(), 0);
    assert_eq!(h.store.order_count(), 0);
}

#[tokio::test]
async fn test_authorization_failure_releases_inventory() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 2, BreakStatus::Upcoming);
    h.payment.set_fail_on_authorize(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "payment_authorization_failed");
    h.assert_all_available(&spots);
    assert_eq!(h.store.reservation_count(), 0);
    assert_eq!(h.store.order_count(), 0);
    assert_eq!(h.commerce.order_count(), 0);
}

#[tokio::test]
async fn test_insufficient_funds_has_its_own_code() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);
    h.payment.set_decline_insufficient_funds(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "insufficient_funds");
    h.assert_all_available(&spots);
}

#[tokio::test]
async fn test_platform_order_failure_voids_authorization() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);
    h.commerce.set_fail_on_create_order(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "order_creation_failed");
    h.assert_all_available(&spots);

    let refs = h.payment.merchant_refs();
    assert_eq!(refs.len(), 1);
    assert_eq!(h.payment.auth_state_for_ref(refs[0]), Some(AuthState::Voided));
}

#[tokio::test]
async fn test_pending_transition_failure_voids_authorization() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);
    h.commerce.set_fail_on_mark_pending(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "order_update_failed");
    h.assert_all_available(&spots);
    // The platform order is left orphaned; compensation targets money and
    // inventory only.
    assert_eq!(h.commerce.order_count(), 1);

    let refs = h.payment.merchant_refs();
    assert_eq!(h.payment.auth_state_for_ref(refs[0]), Some(AuthState::Voided));
}

#[tokio::test]
async fn test_settlement_failure_releases_inventory_but_never_voids() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);
    h.payment.set_fail_on_settle(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "payment_settlement_failed");
    h.assert_all_available(&spots);
    assert_eq!(h.store.order_count(), 0);

    // The authorization may still settle later; it is left authorized for
    // manual reconciliation.
    let refs = h.payment.merchant_refs();
    assert_eq!(
        h.payment.auth_state_for_ref(refs[0]),
        Some(AuthState::Authorized)
    );
}

#[tokio::test]
async fn test_persistence_failure_after_settlement_keeps_the_capture() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);
    h.store.set_fail_on_commit(true);

    let err = h.create_order("cart-1").await.unwrap_err();

    assert_eq!(err.code(), "order_persistence_failed");
    h.assert_all_available(&spots);
    assert_eq!(h.store.order_count(), 0);

    // Money was captured; the settled payment is never auto-refunded.
    let refs = h.payment.merchant_refs();
    assert_eq!(h.payment.auth_state_for_ref(refs[0]), Some(AuthState::Settled));
}

#[tokio::test]
async fn test_concurrent_sagas_cannot_double_sell() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);

    // Two buyers race for the same single-spot cart.
    let first = h.coordinator.create_order(
        UserId::new("buyer-1"),
        CartId::new("cart-1"),
        "tok_a".to_string(),
    );
    let second = h.coordinator.create_order(
        UserId::new("buyer-2"),
        CartId::new("cart-1"),
        "tok_b".to_string(),
    );
    let (first, second) = tokio::join!(first, second);

    let outcomes = [first, second];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one saga may finalize the spot");

    let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
    assert_eq!(
        loser.as_ref().unwrap_err().code(),
        "spot_no_longer_available"
    );

    let winner = outcomes.iter().find(|r| r.is_ok()).unwrap();
    let confirmation = winner.as_ref().unwrap();
    let spot = h.store.spot(spots[0]).unwrap();
    assert_eq!(spot.order_id, Some(confirmation.order_id));
    assert_eq!(h.store.order_count(), 1);
}

#[tokio::test]
async fn test_distinct_carts_complete_independently() {
    let h = TestHarness::new();
    h.seed_cart("cart-1", 1, BreakStatus::Upcoming);

    // A second break and cart, disjoint from the first.
    let break_id = h.store.insert_break(BreakStatus::Upcoming);
    let key = LineItemKey {
        product_id: 200,
        variant_id: 1,
    };
    h.store.insert_spot(break_id, "Spot 1", key);
    h.commerce.insert_checkout(Checkout {
        cart_id: CartId::new("cart-2"),
        line_items: vec![CartLineItem {
            product_id: key.product_id,
            variant_id: key.variant_id,
            quantity: 1,
        }],
        subtotal: Money::from_cents(2500),
        tax_total: Money::zero(),
        shipping_total: Money::zero(),
        discount_total: Money::zero(),
        grand_total: Money::from_cents(2500),
    });

    let (a, b) = tokio::join!(h.create_order("cart-1"), h.create_order("cart-2"));
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.order_id, b.order_id);
    assert_eq!(h.store.order_count(), 2);

    let ids: HashSet<_> = [a.order_id, b.order_id].into_iter().collect();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_abandoned_reservation_is_reclaimed_by_the_sweeper() {
    let h = TestHarness::new();
    let spots = h.seed_cart("cart-1", 1, BreakStatus::Upcoming);

    // A saga reserved and then died without compensating.
    let crashed_order = common::OrderId::new();
    h.store
        .reserve_spots(crashed_order, &UserId::new("ghost"), &[spots[0]])
        .await
        .unwrap();
    h.store
        .backdate_reservation(spots[0], Utc::now() - Duration::minutes(10));

    let sweeper = ReservationSweeper::new(h.store.clone(), SweeperConfig::default());
    let reclaimed = sweeper.sweep_once().await.unwrap();
    assert_eq!(reclaimed, 1);

    // The spot is sellable again end to end.
    let confirmation = h.create_order("cart-1").await.unwrap();
    assert_eq!(
        h.store.spot(spots[0]).unwrap().order_id,
        Some(confirmation.order_id)
    );
}
