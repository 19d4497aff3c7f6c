//! Payments through Stripe or YooKassa and Pro activation

pub mod gateway;
pub mod service;

pub use gateway::{MockGateway, PaymentGateway, PaymentGateways, StripeGateway, YookassaGateway};
pub use service::{CreatePayment, PaymentResult, PaymentService, PaymentWithUser, WebhookOutcome};
