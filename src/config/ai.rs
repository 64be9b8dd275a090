// src/config/ai.rs
//! Settings for the LLM cross-check (loaded from `config/llm.json`).
//!
//! The file never holds the credential itself, only the name of the
//! environment variable to read it from.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::SentimentError;

pub const DEFAULT_LLM_CONFIG_PATH: &str = "config/llm.json";
pub const ENV_LLM_CONFIG_PATH: &str = "SENTIMETRIC_LLM_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    OpenAi,
}

impl LlmProvider {
    pub fn name(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::OpenAi => "openai",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "https://api.anthropic.com/v1/messages",
            LlmProvider::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }

    pub fn default_key_env(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_max_concurrency() -> usize {
    5
}
fn default_max_tokens() -> u32 {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model id; provider default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Env var holding the credential; provider default when absent.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Override for the provider URL (proxies, tests).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra attempts after the first one (timeouts and rate limits only).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Requests in flight during a batch.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            api_key_env: None,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_concurrency: default_max_concurrency(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading LLM config from {}", path.display()))?;
        let cfg: LlmConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing LLM config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// $SENTIMETRIC_LLM_CONFIG, then config/llm.json, then defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_LLM_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_LLM_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_LLM_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), SentimentError> {
        if self.timeout_secs == 0 {
            return Err(SentimentError::configuration(
                "llm.timeout_secs must be positive",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(SentimentError::configuration(
                "llm.max_concurrency must be at least 1",
            ));
        }
        if self.max_retries > 10 {
            return Err(SentimentError::configuration(format!(
                "llm.max_retries must be at most 10, got {}",
                self.max_retries
            )));
        }
        if let Some(env) = &self.api_key_env {
            if env.trim().is_empty() {
                return Err(SentimentError::configuration(
                    "llm.api_key_env must not be blank",
                ));
            }
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }

    pub fn key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_key_env())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_defaults() {
        let c = LlmConfig::default();
        assert_eq!(c.provider, LlmProvider::Anthropic);
        assert_eq!(c.key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(c.endpoint(), "https://api.anthropic.com/v1/messages");
        assert_eq!(c.timeout(), Duration::from_secs(30));

        let o = LlmConfig::for_provider(LlmProvider::OpenAi);
        assert_eq!(o.model(), "gpt-4o-mini");
        assert_eq!(o.key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn parses_json_with_overrides() {
        let cfg: LlmConfig = serde_json::from_str(
            r#"{"provider":"openai","model":"gpt-4o","api_key_env":"MY_KEY","max_retries":1}"#,
        )
        .unwrap();
        assert_eq!(cfg.provider, LlmProvider::OpenAi);
        assert_eq!(cfg.model(), "gpt-4o");
        assert_eq!(cfg.key_env(), "MY_KEY");
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.max_concurrency, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let cfg = LlmConfig {
            max_concurrency: 0,
            ..LlmConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SentimentError::Configuration(_))
        ));
    }

    #[test]
    fn load_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("llm.json");
        fs::write(&p, "{ not json").unwrap();
        let err = LlmConfig::load_from_file(&p).unwrap_err();
        assert!(format!("{err:#}").contains("llm.json"));
    }
}
