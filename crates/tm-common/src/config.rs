use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use tracing::warn;

use crate::{
    compatibility::AnalyzerConfig,
    matching::{CandidatePool, FieldPolicy},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MatchMode {
    /// Skills + discrete fields only.
    Basic,
    /// Skills + discrete fields + AI-derived compatibility.
    Enhanced,
}

#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub mode: MatchMode,
    /// Field denominator policy used in basic mode.
    pub basic_field_policy: FieldPolicy,
    /// Field denominator policy used in enhanced mode.
    pub enhanced_field_policy: FieldPolicy,
    pub candidate_pool: CandidatePool,
    /// Seed for the low-signal baseline; `None` draws from OS entropy per call.
    pub baseline_seed: Option<u64>,
    pub analyzer: AnalyzerConfig,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Enhanced,
            basic_field_policy: FieldPolicy::Strict,
            enhanced_field_policy: FieldPolicy::Comparable,
            candidate_pool: CandidatePool::Full,
            baseline_seed: None,
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl RankerConfig {
    pub fn basic() -> Self {
        Self {
            mode: MatchMode::Basic,
            ..Self::default()
        }
    }

    pub fn enhanced() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let analyzer_defaults = AnalyzerConfig::default();

        Self {
            mode: parse_enum("TM_MATCH_MODE", defaults.mode),
            basic_field_policy: parse_enum("TM_BASIC_FIELD_POLICY", defaults.basic_field_policy),
            enhanced_field_policy: parse_enum(
                "TM_ENHANCED_FIELD_POLICY",
                defaults.enhanced_field_policy,
            ),
            candidate_pool: parse_enum("TM_CANDIDATE_POOL", defaults.candidate_pool),
            baseline_seed: std::env::var("TM_BASELINE_SEED")
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok()),
            analyzer: AnalyzerConfig {
                timeout: Duration::from_millis(parse_u64(
                    "TM_REASONING_TIMEOUT_MS",
                    analyzer_defaults.timeout.as_millis() as u64,
                )),
                max_concurrency: parse_u64(
                    "TM_REASONING_CONCURRENCY",
                    analyzer_defaults.max_concurrency as u64,
                )
                .max(1) as usize,
            },
        }
    }

    /// The field policy that applies to the configured mode.
    pub fn field_policy(&self) -> FieldPolicy {
        match self.mode {
            MatchMode::Basic => self.basic_field_policy,
            MatchMode::Enhanced => self.enhanced_field_policy,
        }
    }
}

/// Wire format of the reasoning endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    ChatCompletions,
    AnthropicMessages,
}

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_style: ApiStyle,
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
    /// Per-attempt HTTP timeout. The analyzer bounds the whole call separately.
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        let (model, endpoint) = provider_defaults("openai");
        Self {
            enabled: true,
            provider: "openai".into(),
            api_style: ApiStyle::ChatCompletions,
            model,
            endpoint,
            api_key: String::new(),
            request_timeout_ms: 4_000,
            max_retries: 1,
            retry_backoff_ms: 250,
        }
    }
}

impl ReasoningConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| defaults.provider.clone());
        let (default_model, default_endpoint) = provider_defaults(&provider);

        let api_key = std::env::var("LLM_API_KEY")
            .ok()
            .or_else(|| provider_api_key(&provider))
            .unwrap_or_default();

        Self {
            enabled: parse_bool("LLM_ENABLED", defaults.enabled),
            api_style: api_style(&provider),
            provider,
            model: std::env::var("LLM_MODEL").unwrap_or(default_model),
            endpoint: std::env::var("LLM_ENDPOINT").unwrap_or(default_endpoint),
            api_key,
            request_timeout_ms: parse_u64("LLM_TIMEOUT_MS", defaults.request_timeout_ms),
            max_retries: u32::try_from(parse_u64(
                "LLM_MAX_RETRIES",
                u64::from(defaults.max_retries),
            ))
            .unwrap_or(u32::MAX),
            retry_backoff_ms: parse_u64("LLM_RETRY_BACKOFF_MS", defaults.retry_backoff_ms),
        }
    }
}

fn provider_defaults(provider: &str) -> (String, String) {
    match provider.to_ascii_lowercase().as_str() {
        "anthropic" => (
            "claude-3-5-haiku-latest".into(),
            "https://api.anthropic.com/v1/messages".into(),
        ),
        "deepseek" => (
            "deepseek-chat".into(),
            "https://api.deepseek.com/chat/completions".into(),
        ),
        "mistral" => (
            "mistral-small-latest".into(),
            "https://api.mistral.ai/v1/chat/completions".into(),
        ),
        "xai" => (
            "grok-2-latest".into(),
            "https://api.x.ai/v1/chat/completions".into(),
        ),
        _ => (
            "gpt-4o-mini".into(),
            "https://api.openai.com/v1/chat/completions".into(),
        ),
    }
}

fn provider_api_key(provider: &str) -> Option<String> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => std::env::var("OPENAI_API_KEY").ok(),
        "anthropic" => std::env::var("ANTHROPIC_API_KEY").ok(),
        "deepseek" => std::env::var("DEEPSEEK_API_KEY").ok(),
        "mistral" => std::env::var("MISTRAL_API_KEY").ok(),
        "xai" => std::env::var("XAI_API_KEY").ok(),
        _ => None,
    }
}

fn api_style(provider: &str) -> ApiStyle {
    if provider.eq_ignore_ascii_case("anthropic") {
        ApiStyle::AnthropicMessages
    } else {
        ApiStyle::ChatCompletions
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_enum<T>(key: &str, default: T) -> T
where
    T: FromStr + AsRef<str> + Copy,
{
    match std::env::var(key) {
        Ok(raw) => T::from_str(raw.trim()).unwrap_or_else(|_| {
            warn!(key, value = %raw, default = default.as_ref(), "unrecognised value; using default");
            default
        }),
        Err(_) => default,
    }
}
