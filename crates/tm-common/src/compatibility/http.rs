use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{GoalComparisonRequest, ProjectComparisonRequest, ReasoningService};
use crate::{
    config::{ApiStyle, ReasoningConfig},
    error::ReasoningError,
};

const PROJECT_INSTRUCTION: &str = "You compare two hackathon participants' project ideas. \
Reply with a single JSON object and nothing else: \
{\"compatibilityScore\": number between 0 and 1, \"reasoning\": string, \
\"suggestedRoles\": [string], \"potentialChallenges\": [string]}.";

const GOAL_INSTRUCTION: &str = "You compare two hackathon participants' goals and skills. \
Reply with a single JSON object and nothing else: \
{\"goalCompatibility\": number between 0 and 1, \"teamVibeMatch\": number between 0 and 1, \
\"overallCompatibility\": number between 0 and 1, \"reasoning\": string}.";

const MAX_ERROR_BODY: usize = 240;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_RETRY_BACKOFF_MS: u64 = 30_000;

/// LLM-backed reasoning service speaking either OpenAI-compatible chat
/// completions or the Anthropic messages API.
pub struct HttpReasoningService {
    client: reqwest::Client,
    config: ReasoningConfig,
}

impl HttpReasoningService {
    pub fn new(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        if !config.enabled {
            return Err(ReasoningError::Disabled("LLM_ENABLED=0".into()));
        }
        if config.endpoint.trim().is_empty() {
            return Err(ReasoningError::Config("LLM_ENDPOINT is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    async fn complete(
        &self,
        instruction: &str,
        payload: &impl Serialize,
    ) -> Result<Value, ReasoningError> {
        let body = request_body(&self.config, instruction, &serde_json::to_string(payload)?);

        let mut attempt = 0u32;
        loop {
            match self.send(&body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = retry_backoff_ms(self.config.retry_backoff_ms, attempt);
                    debug!(attempt, backoff_ms = backoff, error = %err, "retrying reasoning request");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(&self, body: &Value) -> Result<Value, ReasoningError> {
        let mut request = self.client.post(&self.config.endpoint).json(body);
        if !self.config.api_key.is_empty() {
            request = match self.config.api_style {
                ApiStyle::ChatCompletions => request.bearer_auth(&self.config.api_key),
                ApiStyle::AnthropicMessages => request
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
            };
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let envelope: Value = serde_json::from_str(&text)?;
        let content = extract_content(self.config.api_style, &envelope)?;
        parse_json_payload(content)
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    fn name(&self) -> &'static str {
        match self.config.api_style {
            ApiStyle::ChatCompletions => "chat_completions",
            ApiStyle::AnthropicMessages => "anthropic_messages",
        }
    }

    async fn compare_projects(
        &self,
        request: &ProjectComparisonRequest,
    ) -> Result<Value, ReasoningError> {
        self.complete(PROJECT_INSTRUCTION, request).await
    }

    async fn compare_goals(
        &self,
        request: &GoalComparisonRequest,
    ) -> Result<Value, ReasoningError> {
        self.complete(GOAL_INSTRUCTION, request).await
    }
}

/// Exponential backoff before retry `attempt` (1-based), capped at
/// [`MAX_RETRY_BACKOFF_MS`].
fn retry_backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_RETRY_BACKOFF_MS)
}

fn request_body(config: &ReasoningConfig, instruction: &str, user: &str) -> Value {
    match config.api_style {
        ApiStyle::ChatCompletions => json!({
            "model": config.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": user },
            ],
        }),
        ApiStyle::AnthropicMessages => json!({
            "model": config.model,
            "max_tokens": 512,
            "system": instruction,
            "messages": [
                { "role": "user", "content": user },
            ],
        }),
    }
}

fn extract_content(style: ApiStyle, envelope: &Value) -> Result<&str, ReasoningError> {
    let content = match style {
        ApiStyle::ChatCompletions => envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str),
        ApiStyle::AnthropicMessages => envelope
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            })
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str),
    };

    content.ok_or_else(|| ReasoningError::Malformed("response has no text content".into()))
}

/// Pulls the JSON object out of a model reply, tolerating code fences and
/// surrounding prose.
pub(crate) fn parse_json_payload(content: &str) -> Result<Value, ReasoningError> {
    let start = content.find('{');
    let end = content.rfind('}');

    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            Ok(serde_json::from_str(&content[start..=end])?)
        }
        _ => Err(ReasoningError::Malformed(format!(
            "no JSON object in reply: {}",
            truncate(content, 80)
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
