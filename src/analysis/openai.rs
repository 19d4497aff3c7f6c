//! Client for OpenAI-compatible chat-completions endpoints with image input.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

use super::prompt::{build_prompt, parse_analysis_result};
use super::{AnalysisResult, LlmError, VisionAnalyzer};
use crate::core::config::{self, OpenAiConfig};
use crate::core::metrics::LLM_REQUEST_DURATION_SECONDS;
use crate::storage::models::AnalysisType;

const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiVisionClient {
    http_client: reqwest::Client,
    api_key: SecretString,
    api_base: String,
    model: String,
}

impl OpenAiVisionClient {
    pub fn new(api_key: SecretString, api_base: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder().timeout(config::network::timeout()).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Returns None when no API key is configured.
    pub fn from_config(config: &OpenAiConfig) -> Result<Option<Self>, LlmError> {
        match &config.api_key {
            Some(key) => Self::new(key.clone(), config.api_base.clone(), config.model.clone()).map(Some),
            None => Ok(None),
        }
    }

    async fn complete(&self, prompt: &str, image_url: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": prompt},
                        {
                            "type": "image_url",
                            "image_url": {"url": image_url}
                        }
                    ]
                }
            ],
            "max_tokens": MAX_TOKENS
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await?;
        let completion: ChatCompletion = serde_json::from_str(&raw)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiVisionClient {
    async fn analyze(
        &self,
        image_url: &str,
        kind: AnalysisType,
        note: Option<&str>,
    ) -> Result<AnalysisResult, LlmError> {
        let prompt = build_prompt(kind, note);

        let started = Instant::now();
        let content = self.complete(&prompt, image_url).await;
        LLM_REQUEST_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        Ok(parse_analysis_result(&content?))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
