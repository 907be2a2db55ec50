//! HTTP API server for the break marketplace order coordinator.
//!
//! Exposes the single caller-facing operation (`POST /orders`) plus health
//! and Prometheus metrics endpoints, with structured logging (tracing) on
//! every request.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{CommercePlatform, PaymentGateway, SagaCoordinator};
use store::MarketplaceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P, C>(
    state: Arc<AppState<S, P, C>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: MarketplaceStore + Clone + 'static,
    P: PaymentGateway + 'static,
    C: CommercePlatform + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, P, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state for the given backends.
pub fn create_state<S, P, C>(store: S, payment: P, commerce: C) -> Arc<AppState<S, P, C>>
where
    S: MarketplaceStore + Clone + 'static,
    P: PaymentGateway,
    C: CommercePlatform,
{
    Arc::new(AppState {
        coordinator: SagaCoordinator::new(store, payment, commerce),
    })
}
