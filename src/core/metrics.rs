//! Prometheus metrics for the analyzer
//!
//! Tracks:
//! - Analyses by type and outcome, and how long the vision model takes
//! - Usage metering (free attempts consumed, refunded and denied)
//! - Payments, webhooks and Pro activations

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder, Histogram, TextEncoder,
};
use strum::IntoEnumIterator;

use crate::storage::models::AnalysisType;

// ======================
// ANALYSIS METRICS
// ======================

lazy_static! {
    /// Stored analyses
    /// Labels: type (MERCH/FOOD/...), status (PENDING/COMPLETED/FAILED)
    pub static ref ANALYSES_TOTAL: CounterVec = register_counter_vec!(
        "life_analyzer_analyses_total",
        "Total number of stored analyses by type and status",
        &["type", "status"]
    )
    .unwrap();

    /// Vision model call duration
    pub static ref LLM_REQUEST_DURATION_SECONDS: Histogram = register_histogram!(
        "life_analyzer_llm_request_duration_seconds",
        "Time spent waiting for the vision model",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    /// Failed vision model calls
    pub static ref LLM_FAILURES_TOTAL: Counter = register_counter!(
        "life_analyzer_llm_failures_total",
        "Total number of failed vision model calls"
    )
    .unwrap();
}

// ======================
// METERING METRICS
// ======================

lazy_static! {
    /// Attempt metering decisions
    /// Labels: outcome (consumed/unlimited/denied/refunded)
    pub static ref ATTEMPTS_TOTAL: CounterVec = register_counter_vec!(
        "life_analyzer_attempts_total",
        "Usage metering decisions by outcome",
        &["outcome"]
    )
    .unwrap();
}

// ======================
// BUSINESS METRICS
// ======================

lazy_static! {
    /// Payments created
    /// Labels: provider (stripe/yookassa)
    pub static ref PAYMENTS_CREATED_TOTAL: CounterVec = register_counter_vec!(
        "life_analyzer_payments_created_total",
        "Total number of payments created by provider",
        &["provider"]
    )
    .unwrap();

    /// Processed payment webhooks
    /// Labels: status (PENDING/SUCCESS/FAILED/CANCELED)
    pub static ref WEBHOOKS_TOTAL: CounterVec = register_counter_vec!(
        "life_analyzer_webhooks_total",
        "Total number of processed payment webhooks by reported status",
        &["status"]
    )
    .unwrap();

    /// Users switched to Pro
    pub static ref PRO_ACTIVATIONS_TOTAL: Counter = register_counter!(
        "life_analyzer_pro_activations_total",
        "Total number of Pro subscription activations"
    )
    .unwrap();
}

/// Initialize metrics (call this at startup to register all metrics)
pub fn init_metrics() {
    log::info!("Initializing metrics registry...");

    let _ = &*LLM_REQUEST_DURATION_SECONDS;
    let _ = &*LLM_FAILURES_TOTAL;
    let _ = &*PRO_ACTIVATIONS_TOTAL;

    // Pre-create label sets so they show up in /metrics with 0 values
    for kind in AnalysisType::iter() {
        for status in ["PENDING", "COMPLETED", "FAILED"] {
            ANALYSES_TOTAL.with_label_values(&[kind.as_ref(), status]);
        }
    }
    for outcome in ["consumed", "unlimited", "denied", "refunded"] {
        ATTEMPTS_TOTAL.with_label_values(&[outcome]);
    }
    for provider in ["stripe", "yookassa"] {
        PAYMENTS_CREATED_TOTAL.with_label_values(&[provider]);
    }

    log::info!("Metrics registry initialized successfully");
}

pub fn record_analysis(kind: &str, status: &str) {
    ANALYSES_TOTAL.with_label_values(&[kind, status]).inc();
}

pub fn record_llm_failure() {
    LLM_FAILURES_TOTAL.inc();
}

pub fn record_attempt(outcome: &str) {
    ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_payment_created(provider: &str) {
    PAYMENTS_CREATED_TOTAL.with_label_values(&[provider]).inc();
}

pub fn record_webhook(status: &str) {
    WEBHOOKS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_pro_activation() {
    PRO_ACTIVATIONS_TOTAL.inc();
}

/// Renders the default registry in the Prometheus text exposition format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_exported() {
        init_metrics();
        record_analysis("FOOD", "COMPLETED");
        record_attempt("denied");
        record_webhook("SUCCESS");

        let text = gather_text().unwrap();
        assert!(text.contains("life_analyzer_analyses_total"));
        assert!(text.contains("life_analyzer_attempts_total"));
        assert!(text.contains("life_analyzer_webhooks_total"));
    }

    #[test]
    fn test_record_increments() {
        let before = ATTEMPTS_TOTAL.with_label_values(&["refunded"]).get();
        record_attempt("refunded");
        assert!(ATTEMPTS_TOTAL.with_label_values(&["refunded"]).get() >= before + 1.0);
    }
}
