//! Order creation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use common::{CartId, UserId};
use saga::{CommercePlatform, PaymentGateway, SagaCoordinator};
use serde::{Deserialize, Serialize};
use store::MarketplaceStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, P, C>
where
    S: MarketplaceStore,
    P: PaymentGateway,
    C: CommercePlatform,
{
    pub coordinator: SagaCoordinator<S, P, C>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub cart_id: String,
    pub payment_token: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub grand_total_cents: i64,
}

/// POST /orders — run the order-creation saga for the caller's cart.
///
/// The authenticated user id arrives in the `x-user-id` header, placed
/// there by the gateway that terminated authentication.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S, P, C>(
    State(state): State<Arc<AppState<S, P, C>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateOrderResponse>), ApiError>
where
    S: MarketplaceStore + Clone + 'static,
    P: PaymentGateway,
    C: CommercePlatform,
{
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(UserId::new)
        .ok_or(ApiError::Unauthorized)?;

    if req.cart_id.is_empty() {
        return Err(ApiError::BadRequest("cart_id is required".to_string()));
    }
    if req.payment_token.is_empty() {
        return Err(ApiError::BadRequest(
            "payment_token is required".to_string(),
        ));
    }

    let confirmation = state
        .coordinator
        .create_order(user_id, CartId::new(req.cart_id), req.payment_token)
        .await?;

    let response = CreateOrderResponse {
        order_id: confirmation.order_id.to_string(),
        grand_total_cents: confirmation.grand_total.cents(),
    };

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}
