//! Payment creation and the webhook that unlocks Pro.

use rusqlite::TransactionBehavior;
use serde::Serialize;
use std::sync::Arc;

use super::gateway::PaymentGateways;
use crate::core::entitlement;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::storage::db::{self, DbPool};
use crate::storage::models::{Payment, PaymentProvider, PaymentStatus};

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: i64,
    pub amount: f64,
    /// Falls back to the configured currency
    pub currency: Option<String>,
    pub provider: PaymentProvider,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub payment_id: i64,
    pub payment_url: Option<String>,
    pub status: PaymentStatus,
}

/// What a processed webhook changed.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOutcome {
    pub payment: Payment,
    /// True only on the transition into SUCCESS
    pub pro_activated: bool,
    pub telegram_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUserSummary {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithUser {
    #[serde(flatten)]
    pub payment: Payment,
    pub user: PaymentUserSummary,
}

#[derive(Clone)]
pub struct PaymentService {
    pool: Arc<DbPool>,
    gateways: PaymentGateways,
    pro_price: f64,
    currency: String,
}

impl PaymentService {
    pub fn new(pool: Arc<DbPool>, gateways: PaymentGateways, pro_price: f64, currency: impl Into<String>) -> Self {
        Self {
            pool,
            gateways,
            pro_price,
            currency: currency.into(),
        }
    }

    pub fn pro_price(&self) -> f64 {
        self.pro_price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Records a PENDING payment and asks the provider for a checkout link.
    pub async fn create_payment(&self, request: CreatePayment) -> AppResult<PaymentResult> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(AppError::Validation(format!(
                "amount must be a positive number, got {}",
                request.amount
            )));
        }
        let currency = request
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.currency.clone());

        let payment = {
            let conn = db::get_connection(&self.pool)?;
            if db::get_user(&conn, request.user_id)?.is_none() {
                return Err(AppError::not_found("user", request.user_id));
            }
            let id = db::insert_payment(&conn, request.user_id, request.amount, &currency, request.provider)?;
            db::get_payment(&conn, id)?.ok_or_else(|| AppError::not_found("payment", id))?
        };

        let gateway = self.gateways.for_provider(request.provider);
        match gateway.create_checkout(&payment).await {
            Ok(url) => {
                let conn = db::get_connection(&self.pool)?;
                db::set_payment_url(&conn, payment.id, &url)?;
                metrics::record_payment_created(request.provider.as_ref());
                log::info!(
                    "Created {} payment {} for user {}: {} {}",
                    request.provider,
                    payment.id,
                    request.user_id,
                    request.amount,
                    currency
                );
                Ok(PaymentResult {
                    payment_id: payment.id,
                    payment_url: Some(url),
                    status: payment.status,
                })
            }
            Err(e) => {
                log::error!("Failed to create {} checkout for payment {}: {}", request.provider, payment.id, e);
                let conn = db::get_connection(&self.pool)?;
                db::set_payment_status(&conn, payment.id, PaymentStatus::Failed, None)?;
                Err(AppError::BadRequest("failed to create payment".to_string()))
            }
        }
    }

    /// Payment for the Pro subscription at the configured price and currency.
    pub async fn create_pro_subscription_payment(
        &self,
        user_id: i64,
        provider: Option<PaymentProvider>,
    ) -> AppResult<PaymentResult> {
        self.create_payment(CreatePayment {
            user_id,
            amount: self.pro_price,
            currency: Some(self.currency.clone()),
            provider: provider.unwrap_or(PaymentProvider::Yookassa),
        })
        .await
    }

    /// Applies a provider status report.
    ///
    /// Runs in one IMMEDIATE transaction. A SUCCESS payment only accepts SUCCESS
    /// again, which is a no-op.
    pub fn handle_payment_webhook(
        &self,
        payment_id: i64,
        status: PaymentStatus,
        external_id: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let external_id = external_id.map(str::trim).filter(|id| !id.is_empty());

        let mut conn = db::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current =
            db::get_payment(&tx, payment_id)?.ok_or_else(|| AppError::BadRequest("payment not found".to_string()))?;

        if current.status == PaymentStatus::Success && status != PaymentStatus::Success {
            return Err(AppError::Conflict(format!(
                "payment {} already succeeded and cannot become {}",
                payment_id, status
            )));
        }

        let entering_success = status == PaymentStatus::Success && current.status != PaymentStatus::Success;
        // A redelivered SUCCESS leaves the stored payment untouched
        let redelivered = status == PaymentStatus::Success && current.status == PaymentStatus::Success;
        if !redelivered {
            db::set_payment_status(&tx, payment_id, status, external_id)?;
        }

        let pro_activated = entering_success && entitlement::activate_pro(&tx, current.user_id)?;

        let user = db::get_user(&tx, current.user_id)?.ok_or_else(|| AppError::not_found("user", current.user_id))?;
        let payment = db::get_payment(&tx, payment_id)?.ok_or_else(|| AppError::not_found("payment", payment_id))?;

        tx.commit()?;

        metrics::record_webhook(status.as_ref());
        log::info!(
            "Payment {} webhook: {} -> {}{}",
            payment_id,
            current.status,
            status,
            if pro_activated { ", Pro activated" } else { "" }
        );

        Ok(WebhookOutcome {
            payment,
            pro_activated,
            telegram_id: user.telegram_id,
        })
    }

    pub fn get_payment_by_id(&self, payment_id: i64) -> AppResult<PaymentWithUser> {
        let conn = db::get_connection(&self.pool)?;
        let payment = db::get_payment(&conn, payment_id)?.ok_or_else(|| AppError::not_found("payment", payment_id))?;
        let user = db::get_user(&conn, payment.user_id)?.ok_or_else(|| AppError::not_found("user", payment.user_id))?;

        Ok(PaymentWithUser {
            payment,
            user: PaymentUserSummary {
                telegram_id: user.telegram_id,
                username: user.username,
                first_name: user.first_name,
            },
        })
    }

    /// Newest first.
    pub fn get_user_payments(&self, user_id: i64) -> AppResult<Vec<Payment>> {
        let conn = db::get_connection(&self.pool)?;
        Ok(db::list_user_payments(&conn, user_id)?)
    }
}
