//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tempfile::TempDir;

use life_analyzer::analysis::{AnalysisResult, AnalysisService, LlmError, MockAnalyzer, VisionAnalyzer};
use life_analyzer::core::users::UserService;
use life_analyzer::core::web_server::AppState;
use life_analyzer::payments::{PaymentGateway, PaymentGateways, PaymentService};
use life_analyzer::storage::models::{AnalysisType, Payment, PaymentProvider, TelegramProfile, User};
use life_analyzer::storage::{create_pool, DbPool};
use life_analyzer::{AppError, AppResult};

pub const PRO_PRICE: f64 = 299.0;

/// Services wired to a throwaway SQLite file
pub struct TestApp {
    // Keeps the database file alive for the lifetime of the test
    _dir: TempDir,
    pub pool: Arc<DbPool>,
    pub users: UserService,
    pub analysis: AnalysisService,
    pub payments: PaymentService,
}

impl TestApp {
    pub fn new(free_attempts: i64) -> Self {
        Self::with_parts(free_attempts, Arc::new(MockAnalyzer), PaymentGateways::mock())
    }

    pub fn with_analyzer(free_attempts: i64, analyzer: Arc<dyn VisionAnalyzer>) -> Self {
        Self::with_parts(free_attempts, analyzer, PaymentGateways::mock())
    }

    pub fn with_parts(free_attempts: i64, analyzer: Arc<dyn VisionAnalyzer>, gateways: PaymentGateways) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("test.sqlite");
        let pool = Arc::new(create_pool(path.to_str().expect("utf-8 path")).expect("pool"));

        Self {
            users: UserService::new(Arc::clone(&pool), free_attempts),
            analysis: AnalysisService::new(Arc::clone(&pool), analyzer),
            payments: PaymentService::new(Arc::clone(&pool), gateways, PRO_PRICE, "RUB"),
            pool,
            _dir: dir,
        }
    }

    pub fn register(&self, telegram_id: i64) -> User {
        self.users
            .find_or_create_user(&TelegramProfile {
                telegram_id,
                username: Some(format!("user{}", telegram_id)),
                first_name: Some("Test".to_string()),
                last_name: None,
            })
            .expect("register user")
    }

    pub fn state(&self, webhook_secret: Option<&str>) -> AppState {
        AppState {
            users: self.users.clone(),
            analysis: self.analysis.clone(),
            payments: self.payments.clone(),
            webhook_secret: webhook_secret.map(|s| Arc::new(SecretString::from(s.to_string()))),
            bot: None,
        }
    }
}

/// Vision model that always fails with an upstream error
pub struct FailingAnalyzer;

#[async_trait]
impl VisionAnalyzer for FailingAnalyzer {
    async fn analyze(
        &self,
        _image_url: &str,
        _kind: AnalysisType,
        _note: Option<&str>,
    ) -> Result<AnalysisResult, LlmError> {
        Err(LlmError::Api {
            status: 503,
            body: "model overloaded".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Gateway whose provider rejects every checkout
pub struct FailingGateway(pub PaymentProvider);

#[async_trait]
impl PaymentGateway for FailingGateway {
    fn provider(&self) -> PaymentProvider {
        self.0
    }

    fn is_live(&self) -> bool {
        true
    }

    async fn create_checkout(&self, _payment: &Payment) -> AppResult<String> {
        Err(AppError::PaymentGateway("provider unavailable".to_string()))
    }
}

/// Vision model that answers only after `delay`, failing when `fail` is set
pub struct SlowAnalyzer {
    pub delay: std::time::Duration,
    pub fail: bool,
}

#[async_trait]
impl VisionAnalyzer for SlowAnalyzer {
    async fn analyze(&self, image_url: &str, kind: AnalysisType, note: Option<&str>) -> Result<AnalysisResult, LlmError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return FailingAnalyzer.analyze(image_url, kind, note).await;
        }
        MockAnalyzer.analyze(image_url, kind, note).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}
