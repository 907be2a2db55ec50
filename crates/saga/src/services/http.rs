//! HTTP-backed collaborator implementations.
//!
//! Both clients carry a bounded per-request timeout; a timed-out call is
//! reported as that collaborator's failure and triggers the same
//! compensation branch as an error response.

use std::time::Duration;

use async_trait::async_trait;
use common::{AuthorizationId, CartId, PlatformOrderId};
use domain::{CartLineItem, Checkout, Money};
use serde::{Deserialize, Serialize};

use super::commerce::{
    CommerceError, CommercePlatform, EXTERNAL_PAYMENT_METHOD, ORDER_STATUS_PENDING,
};
use super::payment::{
    AuthorizationRequest, INSUFFICIENT_FUNDS_CODE, PaymentAuthorization, PaymentError,
    PaymentGateway,
};

/// Connection settings for the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentGatewayConfig {
    pub base_url: String,
    pub account_id: String,
    /// Server-to-server API key, sent as HTTP basic auth.
    pub api_key: String,
    pub timeout: Duration,
}

/// Connection settings for the commerce platform.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    pub base_url: String,
    pub client_id: String,
    pub access_token: String,
    pub timeout: Duration,
}

fn transport_error_payment(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::Timeout
    } else {
        PaymentError::Unavailable(err.to_string())
    }
}

fn transport_error_commerce(err: reqwest::Error) -> CommerceError {
    if err.is_timeout() {
        CommerceError::Timeout
    } else {
        CommerceError::Unavailable(err.to_string())
    }
}

// -- Payment gateway --

#[derive(Serialize)]
struct CardPayload<'a> {
    #[serde(rename = "paymentToken")]
    payment_token: &'a str,
}

#[derive(Serialize)]
struct AuthPayload<'a> {
    card: CardPayload<'a>,
    #[serde(rename = "merchantRefNum")]
    merchant_ref_num: String,
    /// Amount in minor units (cents).
    amount: i64,
    #[serde(rename = "settleWithAuth")]
    settle_with_auth: bool,
}

#[derive(Serialize)]
struct SettlementPayload {
    #[serde(rename = "merchantRefNum")]
    merchant_ref_num: String,
}

#[derive(Serialize)]
struct VoidPayload {
    amount: i64,
}

#[derive(Deserialize)]
struct AuthResponse {
    id: String,
}

#[derive(Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Deserialize)]
struct GatewayErrorDetail {
    code: String,
}

/// Payment gateway client speaking the card-payments REST API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: PaymentGatewayConfig,
}

impl HttpPaymentGateway {
    /// Creates a gateway client with the configured request timeout.
    pub fn new(config: PaymentGatewayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn auths_url(&self) -> String {
        format!(
            "{}/cardpayments/v1/accounts/{}/auths",
            self.config.base_url, self.config.account_id
        )
    }

    /// Decodes a non-success gateway response into a typed decline.
    async fn decline_from_response(response: reqwest::Response) -> PaymentError {
        match response.json::<GatewayErrorBody>().await {
            Ok(body) if body.error.code == INSUFFICIENT_FUNDS_CODE => {
                PaymentError::InsufficientFunds
            }
            Ok(body) => PaymentError::Declined {
                code: body.error.code,
            },
            Err(err) => PaymentError::Unavailable(err.to_string()),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<PaymentAuthorization, PaymentError> {
        let payload = AuthPayload {
            card: CardPayload {
                payment_token: &request.payment_token,
            },
            merchant_ref_num: request.merchant_ref.to_string(),
            amount: request.amount.cents(),
            settle_with_auth: false,
        };

        let response = self
            .client
            .post(self.auths_url())
            .basic_auth(&self.config.api_key, None::<&str>)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error_payment)?;

        if !response.status().is_success() {
            return Err(Self::decline_from_response(response).await);
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        Ok(PaymentAuthorization {
            id: AuthorizationId::new(auth.id),
        })
    }

    async fn settle(
        &self,
        auth_id: &AuthorizationId,
        merchant_ref: common::OrderId,
    ) -> Result<(), PaymentError> {
        let payload = SettlementPayload {
            merchant_ref_num: merchant_ref.to_string(),
        };

        let response = self
            .client
            .post(format!(
                "{}/{}/settlements",
                self.auths_url(),
                auth_id.as_str()
            ))
            .basic_auth(&self.config.api_key, None::<&str>)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error_payment)?;

        if !response.status().is_success() {
            return Err(Self::decline_from_response(response).await);
        }
        Ok(())
    }

    async fn void(&self, auth_id: &AuthorizationId, amount: Money) -> Result<(), PaymentError> {
        let payload = VoidPayload {
            amount: amount.cents(),
        };

        let response = self
            .client
            .post(format!(
                "{}/{}/voidauths",
                self.auths_url(),
                auth_id.as_str()
            ))
            .basic_auth(&self.config.api_key, None::<&str>)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error_payment)?;

        if !response.status().is_success() {
            return Err(Self::decline_from_response(response).await);
        }
        Ok(())
    }
}

// -- Commerce platform --

#[derive(Deserialize)]
struct CheckoutEnvelope {
    data: CheckoutData,
}

#[derive(Deserialize)]
struct CheckoutData {
    cart: CartData,
    subtotal_ex_tax: f64,
    tax_total: f64,
    shipping_cost_total_ex_tax: f64,
    #[serde(default)]
    discount_total: f64,
    grand_total: f64,
}

#[derive(Deserialize)]
struct CartData {
    line_items: LineItemsData,
}

#[derive(Deserialize)]
struct LineItemsData {
    physical_items: Vec<PhysicalItemData>,
}

#[derive(Deserialize)]
struct PhysicalItemData {
    product_id: i64,
    variant_id: i64,
    quantity: u32,
}

#[derive(Deserialize)]
struct CreatedOrderEnvelope {
    data: CreatedOrderData,
}

#[derive(Deserialize)]
struct CreatedOrderData {
    id: i64,
}

#[derive(Serialize)]
struct OrderPendingPayload {
    payment_method: &'static str,
    status_id: i32,
}

fn checkout_from_envelope(cart_id: &CartId, envelope: CheckoutEnvelope) -> Checkout {
    let data = envelope.data;
    Checkout {
        cart_id: cart_id.clone(),
        line_items: data
            .cart
            .line_items
            .physical_items
            .into_iter()
            .map(|item| CartLineItem {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
            })
            .collect(),
        subtotal: Money::from_decimal(data.subtotal_ex_tax),
        tax_total: Money::from_decimal(data.tax_total),
        shipping_total: Money::from_decimal(data.shipping_cost_total_ex_tax),
        discount_total: Money::from_decimal(data.discount_total),
        grand_total: Money::from_decimal(data.grand_total),
    }
}

/// Commerce platform client speaking the storefront management REST API.
#[derive(Clone)]
pub struct HttpCommercePlatform {
    client: reqwest::Client,
    config: CommerceConfig,
}

impl HttpCommercePlatform {
    /// Creates a platform client with the configured request timeout.
    pub fn new(config: CommerceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/json")
            .header("X-Auth-Client", &self.config.client_id)
            .header("X-Auth-Token", &self.config.access_token)
    }
}

#[async_trait]
impl CommercePlatform for HttpCommercePlatform {
    async fn get_checkout(&self, cart_id: &CartId) -> Result<Checkout, CommerceError> {
        let url = format!("{}/v3/checkouts/{}", self.config.base_url, cart_id);
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(transport_error_commerce)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CommerceError::CartNotFound(cart_id.clone()));
        }
        if !status.is_success() {
            return Err(CommerceError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: CheckoutEnvelope = response
            .json()
            .await
            .map_err(|e| CommerceError::Decode(e.to_string()))?;
        Ok(checkout_from_envelope(cart_id, envelope))
    }

    async fn create_order(&self, cart_id: &CartId) -> Result<PlatformOrderId, CommerceError> {
        let url = format!("{}/v3/checkouts/{}/orders", self.config.base_url, cart_id);
        let response = self
            .request(reqwest::Method::POST, url)
            .send()
            .await
            .map_err(transport_error_commerce)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommerceError::Status {
                status: status.as_u16(),
            });
        }

        let envelope: CreatedOrderEnvelope = response
            .json()
            .await
            .map_err(|e| CommerceError::Decode(e.to_string()))?;
        Ok(PlatformOrderId::new(envelope.data.id))
    }

    async fn mark_order_pending(&self, order_id: PlatformOrderId) -> Result<(), CommerceError> {
        let url = format!("{}/v2/orders/{}", self.config.base_url, order_id);
        let payload = OrderPendingPayload {
            payment_method: EXTERNAL_PAYMENT_METHOD,
            status_id: ORDER_STATUS_PENDING,
        };

        let response = self
            .request(reqwest::Method::PUT, url)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error_commerce)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommerceError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_checkout_envelope() {
        let body = r#"{
            "data": {
                "cart": {
                    "line_items": {
                        "physical_items": [
                            { "product_id": 112, "variant_id": 86, "quantity": 1 },
                            { "product_id": 112, "variant_id": 87, "quantity": 1 }
                        ]
                    }
                },
                "subtotal_ex_tax": 50.0,
                "tax_total": 4.0,
                "shipping_cost_total_ex_tax": 5.99,
                "grand_total": 59.99
            }
        }"#;

        let envelope: CheckoutEnvelope = serde_json::from_str(body).unwrap();
        let checkout = checkout_from_envelope(&CartId::new("cart-1"), envelope);

        assert_eq!(checkout.line_items.len(), 2);
        assert_eq!(checkout.line_items[1].variant_id, 87);
        assert_eq!(checkout.subtotal, Money::from_cents(5000));
        assert_eq!(checkout.tax_total, Money::from_cents(400));
        assert_eq!(checkout.shipping_total, Money::from_cents(599));
        assert_eq!(checkout.discount_total, Money::zero());
        assert_eq!(checkout.grand_total, Money::from_cents(5999));
    }

    #[test]
    fn decodes_created_order_envelope() {
        let body = r#"{ "data": { "id": 118 } }"#;
        let envelope: CreatedOrderEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.id, 118);
    }

    #[test]
    fn auth_payload_uses_gateway_field_names() {
        let payload = AuthPayload {
            card: CardPayload {
                payment_token: "tok_abc",
            },
            merchant_ref_num: "ref-1".to_string(),
            amount: 5999,
            settle_with_auth: false,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["card"]["paymentToken"], "tok_abc");
        assert_eq!(json["merchantRefNum"], "ref-1");
        assert_eq!(json["amount"], 5999);
        assert_eq!(json["settleWithAuth"], false);
    }

    #[test]
    fn gateway_error_body_decodes_code() {
        let body = r#"{ "error": { "code": "3022", "message": "insufficient funds" } }"#;
        let decoded: GatewayErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.error.code, INSUFFICIENT_FUNDS_CODE);
    }
}
