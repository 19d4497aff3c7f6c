//! Image analysis through a vision-capable LLM
//!
//! - `analyzer`: the [`VisionAnalyzer`] seam and the canned [`MockAnalyzer`]
//! - `openai`: chat-completions client for OpenAI-compatible APIs
//! - `prompt`: per-type instructions and answer parsing
//! - `service`: metering-aware submission and queries over stored analyses

pub mod analyzer;
pub mod openai;
pub mod prompt;
pub mod service;

use thiserror::Error;

pub use analyzer::{MockAnalyzer, VisionAnalyzer};
pub use openai::OpenAiVisionClient;
pub use service::{AnalysisRequest, AnalysisService, ImageSource};

/// Errors from the vision model
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request to vision model failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("vision model returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("vision model returned an empty response")]
    EmptyResponse,

    #[error("unexpected vision model response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parsed model answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub text: String,
    /// 0..=10 when the model produced a usable score
    pub score: Option<i64>,
}
