//! External collaborator traits and implementations.

pub mod commerce;
pub mod http;
pub mod payment;

pub use commerce::{CommerceError, CommercePlatform, InMemoryCommercePlatform};
pub use http::{CommerceConfig, HttpCommercePlatform, HttpPaymentGateway, PaymentGatewayConfig};
pub use payment::{
    AuthState, AuthorizationRequest, InMemoryPaymentGateway, PaymentAuthorization, PaymentError,
    PaymentGateway,
};
