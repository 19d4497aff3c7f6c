//! JSON HTTP API over the user, analysis and payment services.
//!
//! Also serves `/health` and the Prometheus `/metrics` endpoint.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::Bot;
use tokio::net::TcpListener;

use crate::analysis::{AnalysisRequest, AnalysisService, ImageSource};
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::users::UserService;
use crate::payments::{CreatePayment, PaymentService};
use crate::storage::models::{AnalysisType, PaymentProvider, PaymentStatus};
use crate::telegram::notifications;

/// Header carrying the shared webhook secret
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

type HmacSha256 = Hmac<Sha256>;

const WEBHOOK_SECRET_CONTEXT: &[u8] = b"payment-webhook";

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub analysis: AnalysisService,
    pub payments: PaymentService,
    pub webhook_secret: Option<Arc<SecretString>>,
    /// Set when the bot runs in this process; used for Pro notifications
    pub bot: Option<Bot>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/users/{id}", get(get_user_handler))
        .route("/users/tg/{telegram_id}/balance", get(get_balance_handler))
        .route("/analysis", post(create_analysis_handler))
        .route("/analysis/{id}", get(get_analysis_handler))
        .route("/analysis/user/{user_id}", get(list_user_analyses_handler))
        .route("/analysis/user/{user_id}/stats", get(user_analysis_stats_handler))
        .route("/payments", post(create_payment_handler))
        .route("/payments/{id}", get(get_payment_handler))
        .route("/payments/{id}/webhook", post(payment_webhook_handler))
        .route("/payments/user/{user_id}", get(list_user_payments_handler))
        .with_state(state)
}

/// Start the HTTP API.
pub async fn start_web_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /health                          - Health check");
    log::info!("  /metrics                         - Prometheus metrics");
    log::info!("  /users/{{id}}                      - User profile");
    log::info!("  /users/tg/{{telegram_id}}/balance  - Attempts and Pro status");
    log::info!("  /analysis[/...]                  - Submit and query analyses");
    log::info!("  /payments[/...]                  - Create payments, provider webhooks");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn metrics_handler() -> Response {
    match metrics::gather_text() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}

// ==================== Users ====================

async fn get_user_handler(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    Ok(Json(state.users.find_by_id(id)?).into_response())
}

async fn get_balance_handler(State(state): State<AppState>, Path(telegram_id): Path<i64>) -> AppResult<Response> {
    Ok(Json(state.users.get_user_balance(telegram_id)?).into_response())
}

// ==================== Analyses ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAnalysisBody {
    user_id: i64,
    #[serde(rename = "type")]
    kind: AnalysisType,
    file_id: String,
    image_url: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn create_analysis_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateAnalysisBody>,
) -> AppResult<Response> {
    if body.file_id.trim().is_empty() {
        return Err(AppError::Validation("fileId must not be empty".to_string()));
    }

    let image = body
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .map(ImageSource::Url);

    let analysis = state
        .analysis
        .submit(AnalysisRequest {
            user_id: body.user_id,
            kind: body.kind,
            file_id: body.file_id,
            image,
            note: body.note,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(analysis)).into_response())
}

async fn get_analysis_handler(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    Ok(Json(state.analysis.get_analysis_by_id(id)?).into_response())
}

async fn list_user_analyses_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(page): Query<Pagination>,
) -> AppResult<Response> {
    let analyses = state.analysis.get_user_analyses(user_id, page.limit, page.offset)?;
    Ok(Json(analyses).into_response())
}

async fn user_analysis_stats_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Response> {
    Ok(Json(state.analysis.get_user_analysis_stats(user_id)?).into_response())
}

// ==================== Payments ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody {
    user_id: i64,
    provider: PaymentProvider,
    amount: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody {
    status: PaymentStatus,
    external_id: Option<String>,
}

async fn create_payment_handler(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> AppResult<Response> {
    let result = match body.amount {
        Some(amount) if amount != 0.0 => {
            state
                .payments
                .create_payment(CreatePayment {
                    user_id: body.user_id,
                    amount,
                    currency: body.currency,
                    provider: body.provider,
                })
                .await?
        }
        // No amount means the standard Pro subscription
        _ => {
            state
                .payments
                .create_pro_subscription_payment(body.user_id, Some(body.provider))
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(result)).into_response())
}

fn check_webhook_secret(expected: Option<&SecretString>, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let unauthorized = || AppError::Unauthorized("invalid webhook secret".to_string());
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;

    // Compare MAC tags of both values so the check runs in constant time
    let mac_of = |value: &[u8]| -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(WEBHOOK_SECRET_CONTEXT).map_err(|_| unauthorized())?;
        mac.update(value);
        Ok(mac)
    };
    let expected_tag = mac_of(expected.expose_secret().as_bytes())?.finalize().into_bytes();
    let provided_mac = mac_of(provided.as_bytes())?;
    provided_mac.verify_slice(&expected_tag).map_err(|_| unauthorized())
}

async fn payment_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<WebhookBody>,
) -> AppResult<Response> {
    check_webhook_secret(state.webhook_secret.as_deref(), &headers)?;

    let outcome = state
        .payments
        .handle_payment_webhook(id, body.status, body.external_id.as_deref())?;

    if outcome.pro_activated {
        if let Some(bot) = state.bot.clone() {
            let telegram_id = outcome.telegram_id;
            tokio::spawn(async move {
                if let Err(e) = notifications::notify_pro_activated(&bot, telegram_id).await {
                    log::warn!("Failed to notify user {} about Pro activation: {}", telegram_id, e);
                }
            });
        }
    }

    Ok(Json(json!({ "ok": true })).into_response())
}

async fn get_payment_handler(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    Ok(Json(state.payments.get_payment_by_id(id)?).into_response())
}

async fn list_user_payments_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Response> {
    Ok(Json(state.payments.get_user_payments(user_id)?).into_response())
}
