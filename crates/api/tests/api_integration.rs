//! Integration tests for the API server.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{BreakStatus, CartLineItem, Checkout, LineItemKey, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryCommercePlatform, InMemoryPaymentGateway};
use store::InMemoryStore;
use tower::ServiceExt;

use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (
    axum::Router,
    InMemoryStore,
    InMemoryPaymentGateway,
    InMemoryCommercePlatform,
) {
    let store = InMemoryStore::new();
    let payment = InMemoryPaymentGateway::new();
    let commerce = InMemoryCommercePlatform::new();
    let state = api::create_state(store.clone(), payment.clone(), commerce.clone());
    let app = api::create_app(state, get_metrics_handle());
    (app, store, payment, commerce)
}

/// Seeds one available spot and a matching single-item checkout.
fn seed_cart(store: &InMemoryStore, commerce: &InMemoryCommercePlatform, cart_id: &str) {
    let break_id = store.insert_break(BreakStatus::Upcoming);
    let key = LineItemKey {
        product_id: 112,
        variant_id: 86,
    };
    store.insert_spot(break_id, "Spot 1", key);

    commerce.insert_checkout(Checkout {
        cart_id: common::CartId::new(cart_id),
        line_items: vec![CartLineItem {
            product_id: key.product_id,
            variant_id: key.variant_id,
            quantity: 1,
        }],
        subtotal: Money::from_cents(5000),
        tax_total: Money::from_cents(400),
        shipping_total: Money::from_cents(599),
        discount_total: Money::zero(),
        grand_total: Money::from_cents(5999),
    });
}

fn order_request(cart_id: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder
        .body(Body::from(
            serde_json::to_string(&serde_json::json!({
                "cart_id": cart_id,
                "payment_token": "tok_visa"
            }))
            .unwrap(),
        ))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order_success() {
    let (app, store, _, commerce) = setup();
    seed_cart(&store, &commerce, "cart-1");

    let response = app
        .oneshot(order_request("cart-1", Some("buyer-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["grand_total_cents"], 5999);
    assert!(json["order_id"].as_str().is_some());
    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn test_create_order_requires_a_user() {
    let (app, store, _, commerce) = setup();
    seed_cart(&store, &commerce, "cart-1");

    let response = app.oneshot(order_request("cart-1", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "not_logged_in");
    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn test_sold_out_cart_maps_to_conflict() {
    let (app, store, _, commerce) = setup();
    seed_cart(&store, &commerce, "cart-1");

    // First buyer takes the spot.
    let response = app
        .clone()
        .oneshot(order_request("cart-1", Some("buyer-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Second buyer gets a typed conflict.
    let response = app
        .oneshot(order_request("cart-1", Some("buyer-2")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "spot_no_longer_available");
    assert!(
        json["error"]["message"].as_str().unwrap().len() > 0,
        "error carries a human message"
    );
    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn test_payment_decline_maps_to_payment_required() {
    let (app, store, payment, commerce) = setup();
    seed_cart(&store, &commerce, "cart-1");
    payment.set_decline_insufficient_funds(true);

    let response = app
        .oneshot(order_request("cart-1", Some("buyer-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "insufficient_funds");
}

#[tokio::test]
async fn test_commerce_outage_maps_to_bad_gateway() {
    let (app, store, _, commerce) = setup();
    seed_cart(&store, &commerce, "cart-1");
    commerce.set_fail_on_get_checkout(true);

    let response = app
        .oneshot(order_request("cart-1", Some("buyer-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "checkout_unavailable");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let (app, _, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
