//! Payment provider seam.
//!
//! Live gateways only build hosted-checkout links; the provider reports the
//! outcome later through the payment webhook.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::core::config::Config;
use crate::core::error::{AppError, AppResult};
use crate::storage::models::{Payment, PaymentProvider};

const STRIPE_CHECKOUT_BASE: &str = "https://checkout.stripe.com/pay/";
const YOOKASSA_CHECKOUT_BASE: &str = "https://yoomoney.ru/checkout/";
const MOCK_CHECKOUT_BASE: &str = "https://mock-payment.com/pay/";

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// False for the development mock
    fn is_live(&self) -> bool;

    /// Returns the URL the user opens to pay.
    async fn create_checkout(&self, payment: &Payment) -> AppResult<String>;
}

fn checkout_url(base: &str, reference: &str, payment: &Payment) -> AppResult<String> {
    let mut url = Url::parse(base)
        .and_then(|base| base.join(reference))
        .map_err(|e| AppError::PaymentGateway(format!("invalid checkout url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("amount", &format!("{:.2}", payment.amount))
        .append_pair("currency", &payment.currency);
    Ok(url.to_string())
}

pub struct StripeGateway;

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    fn is_live(&self) -> bool {
        true
    }

    async fn create_checkout(&self, payment: &Payment) -> AppResult<String> {
        checkout_url(STRIPE_CHECKOUT_BASE, &format!("cs_{}", payment.id), payment)
    }
}

pub struct YookassaGateway;

#[async_trait]
impl PaymentGateway for YookassaGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Yookassa
    }

    fn is_live(&self) -> bool {
        true
    }

    async fn create_checkout(&self, payment: &Payment) -> AppResult<String> {
        checkout_url(YOOKASSA_CHECKOUT_BASE, &format!("order_{}", payment.id), payment)
    }
}

/// Stand-in used when a provider has no secret key configured.
pub struct MockGateway {
    provider: PaymentProvider,
}

impl MockGateway {
    pub fn new(provider: PaymentProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    fn is_live(&self) -> bool {
        false
    }

    async fn create_checkout(&self, payment: &Payment) -> AppResult<String> {
        let url = format!("{}{}", MOCK_CHECKOUT_BASE, payment.id);
        log::info!("Mock {} payment created: {}", self.provider, url);
        Ok(url)
    }
}

/// One gateway per provider.
#[derive(Clone)]
pub struct PaymentGateways {
    stripe: Arc<dyn PaymentGateway>,
    yookassa: Arc<dyn PaymentGateway>,
}

impl PaymentGateways {
    pub fn new(stripe: Arc<dyn PaymentGateway>, yookassa: Arc<dyn PaymentGateway>) -> Self {
        Self { stripe, yookassa }
    }

    /// Live gateways for providers with a key, mocks for the rest.
    pub fn from_config(config: &Config) -> Self {
        let stripe: Arc<dyn PaymentGateway> = if config.stripe_secret_key.is_some() {
            Arc::new(StripeGateway)
        } else {
            Arc::new(MockGateway::new(PaymentProvider::Stripe))
        };
        let yookassa: Arc<dyn PaymentGateway> = if config.yookassa_secret_key.is_some() {
            Arc::new(YookassaGateway)
        } else {
            Arc::new(MockGateway::new(PaymentProvider::Yookassa))
        };
        Self { stripe, yookassa }
    }

    pub fn mock() -> Self {
        Self {
            stripe: Arc::new(MockGateway::new(PaymentProvider::Stripe)),
            yookassa: Arc::new(MockGateway::new(PaymentProvider::Yookassa)),
        }
    }

    pub fn for_provider(&self, provider: PaymentProvider) -> &dyn PaymentGateway {
        match provider {
            PaymentProvider::Stripe => self.stripe.as_ref(),
            PaymentProvider::Yookassa => self.yookassa.as_ref(),
        }
    }
}
