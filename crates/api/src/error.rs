//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::CheckoutError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body carries a stable machine-readable code next to the
/// human message; collaborator detail stays in the logs.
#[derive(Debug)]
pub enum ApiError {
    /// The request carried no authenticated user.
    Unauthorized,
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout saga failure.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "not_logged_in",
                "Must be logged in.".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Checkout(err) => {
                let status = checkout_status(&err);
                if status.is_server_error() {
                    tracing::error!(code = err.code(), error = %err, "checkout error");
                }
                (status, err.code(), err.to_string())
            }
        };

        let body = serde_json::json!({ "error": { "code": code, "message": message } });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::CheckoutUnavailable(_) => StatusCode::BAD_GATEWAY,
        CheckoutError::ItemLookupFailed(Some(_)) => StatusCode::BAD_GATEWAY,
        CheckoutError::ItemLookupFailed(None) => StatusCode::CONFLICT,
        CheckoutError::SpotNoLongerAvailable => StatusCode::CONFLICT,
        CheckoutError::PaymentAuthorizationFailed(_)
        | CheckoutError::InsufficientFunds
        | CheckoutError::PaymentSettlementFailed(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::OrderCreationFailed(_) | CheckoutError::OrderUpdateFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        CheckoutError::OrderPersistenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contested_spot_maps_to_conflict() {
        assert_eq!(
            checkout_status(&CheckoutError::SpotNoLongerAvailable),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn payment_failures_map_to_payment_required() {
        assert_eq!(
            checkout_status(&CheckoutError::InsufficientFunds),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn persistence_failure_is_internal() {
        let err = CheckoutError::OrderPersistenceFailed(store::StoreError::Unavailable(
            "commit_order".to_string(),
        ));
        assert_eq!(checkout_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
