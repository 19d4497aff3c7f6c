//! Integration tests for payments and the Pro webhook
//!
//! Run with: cargo test --test payments_test

mod common;

use pretty_assertions::assert_eq;
use std::sync::Arc;

use common::{FailingGateway, TestApp, PRO_PRICE};
use life_analyzer::analysis::MockAnalyzer;
use life_analyzer::payments::{CreatePayment, MockGateway, PaymentGateways};
use life_analyzer::storage::models::{PaymentProvider, PaymentStatus};
use life_analyzer::AppError;

#[tokio::test]
async fn test_create_payment_returns_mock_url() {
    let app = TestApp::new(5);
    let user = app.register(1);

    let result = app
        .payments
        .create_payment(CreatePayment {
            user_id: user.id,
            amount: 150.0,
            currency: Some("usd".to_string()),
            provider: PaymentProvider::Stripe,
        })
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Pending);
    assert_eq!(
        result.payment_url.as_deref(),
        Some(format!("https://mock-payment.com/pay/{}", result.payment_id).as_str())
    );

    let stored = app.payments.get_payment_by_id(result.payment_id).unwrap();
    assert_eq!(stored.payment.currency, "USD");
    assert_eq!(stored.payment.payment_url, result.payment_url);
    assert_eq!(stored.user.telegram_id, 1);
}

#[tokio::test]
async fn test_invalid_amount_and_unknown_user() {
    let app = TestApp::new(5);
    let user = app.register(2);

    for amount in [0.0, -5.0, f64::NAN] {
        let err = app
            .payments
            .create_payment(CreatePayment {
                user_id: user.id,
                amount,
                currency: None,
                provider: PaymentProvider::Yookassa,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    let err = app.payments.create_pro_subscription_payment(999, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_gateway_failure_marks_payment_failed() {
    let gateways = PaymentGateways::new(
        Arc::new(FailingGateway(PaymentProvider::Stripe)),
        Arc::new(MockGateway::new(PaymentProvider::Yookassa)),
    );
    let app = TestApp::with_parts(5, Arc::new(MockAnalyzer), gateways);
    let user = app.register(3);

    let err = app
        .payments
        .create_pro_subscription_payment(user.id, Some(PaymentProvider::Stripe))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "failed to create payment"));

    let payments = app.payments.get_user_payments(user.id).unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
}

#[tokio::test]
async fn test_pro_payment_uses_configured_price() {
    let app = TestApp::new(5);
    let user = app.register(4);

    let result = app.payments.create_pro_subscription_payment(user.id, None).await.unwrap();
    let stored = app.payments.get_payment_by_id(result.payment_id).unwrap().payment;

    assert_eq!(stored.amount, PRO_PRICE);
    assert_eq!(stored.currency, "RUB");
    assert_eq!(stored.provider, PaymentProvider::Yookassa);
}

#[tokio::test]
async fn test_success_webhook_activates_pro_once() {
    let app = TestApp::new(0);
    let user = app.register(5);
    let payment = app.payments.create_pro_subscription_payment(user.id, None).await.unwrap();

    let outcome = app
        .payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Success, Some("ext-42"))
        .unwrap();
    assert!(outcome.pro_activated);
    assert_eq!(outcome.telegram_id, 5);
    assert_eq!(outcome.payment.external_id.as_deref(), Some("ext-42"));

    let balance = app.users.get_user_balance(5).unwrap();
    assert!(balance.is_pro);
    assert!(balance.can_analyze);

    // Redelivery of the same event is a no-op
    let again = app
        .payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Success, None)
        .unwrap();
    assert!(!again.pro_activated);
    assert_eq!(again.payment.external_id.as_deref(), Some("ext-42"));
}

#[tokio::test]
async fn test_succeeded_payment_cannot_regress() {
    let app = TestApp::new(0);
    let user = app.register(6);
    let payment = app.payments.create_pro_subscription_payment(user.id, None).await.unwrap();

    app.payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Success, None)
        .unwrap();
    let err = app
        .payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Canceled, None)
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    let stored = app.payments.get_payment_by_id(payment.payment_id).unwrap();
    assert_eq!(stored.payment.status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_failed_webhook_does_not_activate_pro() {
    let app = TestApp::new(0);
    let user = app.register(7);
    let payment = app.payments.create_pro_subscription_payment(user.id, None).await.unwrap();

    let outcome = app
        .payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Failed, None)
        .unwrap();
    assert!(!outcome.pro_activated);
    assert!(!app.users.get_user_balance(7).unwrap().is_pro);
}

#[test]
fn test_webhook_for_unknown_payment() {
    let app = TestApp::new(0);
    let err = app
        .payments
        .handle_payment_webhook(12345, PaymentStatus::Success, None)
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "payment not found"));
}

#[tokio::test]
async fn test_redelivered_success_keeps_stored_payment() {
    let app = TestApp::new(0);
    let user = app.register(8);
    let payment = app.payments.create_pro_subscription_payment(user.id, None).await.unwrap();

    app.payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Success, Some("ext-42"))
        .unwrap();
    app.pool
        .get()
        .unwrap()
        .execute(
            "UPDATE payments SET updated_at = '2020-01-01 00:00:00' WHERE id = ?1",
            [payment.payment_id],
        )
        .unwrap();

    let again = app
        .payments
        .handle_payment_webhook(payment.payment_id, PaymentStatus::Success, Some("ext-other"))
        .unwrap();

    assert!(!again.pro_activated);
    assert_eq!(again.payment.external_id.as_deref(), Some("ext-42"));
    assert_eq!(again.payment.updated_at, "2020-01-01 00:00:00");
}
