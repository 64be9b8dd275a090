//! LLM adapter: the `SentimentSource` capability plus a remote classifier
//! (Anthropic Messages or OpenAI Chat Completions) behind it.
//!
//! The credential is read from the environment once, at construction, and is
//! never logged. Only timeouts and rate limits are retried, with exponential
//! backoff; every other failure surfaces as its own `ExternalServiceError`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, LlmProvider, Thresholds};
use crate::error::{ExternalServiceError, Result, SentimentError};
use crate::logging::anon_hash;
use crate::sentiment::{LlmDetails, Method, SentimentResult};

pub const ENV_LLM_MODE: &str = "SENTIMETRIC_LLM_MODE";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "Classify the sentiment of the user's text. Account for sarcasm, \
slang, emoji and negation. Reply with a single JSON object and nothing else: \
{\"polarity\": number from -1 (very negative) to 1 (very positive), \
\"category\": \"positive\" | \"negative\" | \"neutral\", \
\"confidence\": number from 0 to 1, \
\"reasoning\": one short sentence, \
\"emotions\": list of detected emotions, \
\"tone\": one word such as sincere, sarcastic, enthusiastic}";

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?").expect("fence regex"));

// ------------------------------------------------------------
// Capability
// ------------------------------------------------------------

/// "Given text, produce a `SentimentResult`." Implemented by the rule-based
/// analyzer, the LLM analyzer and test doubles.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    fn name(&self) -> &str;
    async fn analyze(&self, text: &str) -> Result<SentimentResult>;
}

pub type DynSource = Arc<dyn SentimentSource>;

// ------------------------------------------------------------
// Credential
// ------------------------------------------------------------

/// API credential. `Debug` never shows the value.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> std::result::Result<Self, ExternalServiceError> {
        let raw = raw.into();
        let key = raw.trim();
        if key.is_empty() {
            return Err(ExternalServiceError::auth("credential is empty"));
        }
        if !key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ExternalServiceError::auth(
                "credential contains invalid characters",
            ));
        }
        Ok(Self(key.to_string()))
    }

    pub fn from_env(var: &str) -> std::result::Result<Self, ExternalServiceError> {
        match std::env::var(var) {
            Ok(v) => Self::new(v),
            Err(_) => Err(ExternalServiceError::auth(format!("{var} is not set"))),
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

// ------------------------------------------------------------
// Remote classifier
// ------------------------------------------------------------

/// JSON object the model is asked to return.
#[derive(Debug, Deserialize)]
struct LlmReply {
    polarity: f32,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    emotions: Vec<String>,
    #[serde(default)]
    tone: Option<String>,
}

pub struct LlmAnalyzer {
    http: reqwest::Client,
    config: LlmConfig,
    key: ApiKey,
    thresholds: Thresholds,
}

impl std::fmt::Debug for LlmAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAnalyzer")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model())
            .field("key", &self.key)
            .finish()
    }
}

impl LlmAnalyzer {
    /// Read the credential from the env var named by `config`. A missing or
    /// blank credential fails here, before any network attempt.
    pub fn from_env(config: LlmConfig) -> Result<Self> {
        let key = ApiKey::from_env(config.key_env())?;
        Self::with_key(config, key)
    }

    pub fn with_key(config: LlmConfig, key: ApiKey) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("sentimetric/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|e| SentimentError::configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            config,
            key,
            thresholds: Thresholds::default(),
        })
    }

    /// Thresholds used to re-derive the category from the reported polarity.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Classify one text, retrying timeouts and rate limits.
    pub async fn analyze_text(&self, text: &str) -> Result<SentimentResult> {
        if text.trim().is_empty() {
            return Ok(SentimentResult::new(
                0.0,
                0.0,
                0.0,
                Method::Llm,
                Vec::new(),
                &self.thresholds,
            ));
        }

        let id = anon_hash(text);
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(text).await {
                Ok(content) => {
                    counter!("sentimetric_llm_requests_total", "outcome" => "ok").increment(1);
                    let result = parse_reply(&content, &self.thresholds);
                    if let Err(e) = &result {
                        warn!(target: "sentimetric::llm", %id, error = %e, "unusable reply");
                    }
                    return result;
                }
                Err(e) => {
                    counter!("sentimetric_llm_requests_total", "outcome" => e.label())
                        .increment(1);
                    if !e.is_retryable() || attempt >= self.config.max_retries {
                        warn!(target: "sentimetric::llm", %id, attempt, error = %e, "request failed");
                        return Err(e.into());
                    }
                    let wait = backoff(&e, attempt, self.config.backoff_base_ms);
                    warn!(
                        target: "sentimetric::llm",
                        %id, attempt, error = %e, wait_ms = wait.as_millis() as u64,
                        "retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    /// At most `max_concurrency` requests in flight; output is index-aligned.
    pub async fn analyze_batch<S: AsRef<str> + Sync>(
        &self,
        texts: &[S],
    ) -> Vec<Result<SentimentResult>> {
        stream::iter(texts.iter())
            .map(|t| self.analyze_text(t.as_ref()))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    fn build_request(&self, text: &str) -> reqwest::RequestBuilder {
        let cfg = &self.config;
        match cfg.provider {
            LlmProvider::Anthropic => self
                .http
                .post(cfg.endpoint())
                .header("x-api-key", self.key.expose())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": cfg.model(),
                    "max_tokens": cfg.max_tokens,
                    "system": SYSTEM_PROMPT,
                    "messages": [{ "role": "user", "content": text }],
                })),
            LlmProvider::OpenAi => self
                .http
                .post(cfg.endpoint())
                .bearer_auth(self.key.expose())
                .json(&json!({
                    "model": cfg.model(),
                    "max_tokens": cfg.max_tokens,
                    "temperature": 0.0,
                    "messages": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": text },
                    ],
                })),
        }
    }

    /// One HTTP round trip; returns the model's text content.
    async fn send_once(&self, text: &str) -> std::result::Result<String, ExternalServiceError> {
        let resp = self
            .build_request(text)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &body));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ExternalServiceError::malformed(format!("response is not JSON: {e}")))?;
        let content = match self.config.provider {
            LlmProvider::Anthropic => body["content"][0]["text"].as_str(),
            LlmProvider::OpenAi => body["choices"][0]["message"]["content"].as_str(),
        };
        content
            .map(str::to_string)
            .ok_or_else(|| ExternalServiceError::malformed("response carries no text content"))
    }
}

#[async_trait]
impl SentimentSource for LlmAnalyzer {
    fn name(&self) -> &str {
        self.config.provider.name()
    }

    async fn analyze(&self, text: &str) -> Result<SentimentResult> {
        self.analyze_text(text).await
    }
}

fn classify_transport(e: reqwest::Error) -> ExternalServiceError {
    if e.is_timeout() {
        ExternalServiceError::Timeout
    } else if e.is_connect() {
        ExternalServiceError::unreachable(format!("connect failed: {e}"))
    } else {
        ExternalServiceError::unreachable(e.to_string())
    }
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> ExternalServiceError {
    let snippet: String = body.chars().take(200).collect();
    match status.as_u16() {
        401 | 403 => ExternalServiceError::auth(format!("status {status}")),
        429 => ExternalServiceError::RateLimited { retry_after_secs },
        408 | 504 => ExternalServiceError::Timeout,
        _ => ExternalServiceError::unreachable(format!("status {status}: {snippet}")),
    }
}

/// `base << attempt`, or the server's Retry-After when it asked for longer.
pub(crate) fn backoff(err: &ExternalServiceError, attempt: u32, base_ms: u64) -> Duration {
    let exp = Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(10)));
    match err {
        ExternalServiceError::RateLimited {
            retry_after_secs: Some(s),
        } => exp.max(Duration::from_secs((*s).min(60))),
        _ => exp,
    }
}

/// Strip markdown fences, parse the JSON object, clamp values and re-derive
/// the category. The label the model reported is kept in the details.
pub(crate) fn parse_reply(content: &str, thresholds: &Thresholds) -> Result<SentimentResult> {
    let stripped = FENCE.replace_all(content, "");
    let trimmed = stripped.trim();
    let json_part = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(a), Some(b)) if a < b => &trimmed[a..=b],
        _ => trimmed,
    };
    let reply: LlmReply = serde_json::from_str(json_part)
        .map_err(|e| ExternalServiceError::malformed(format!("reply is not the expected JSON: {e}")))?;
    if !reply.polarity.is_finite() {
        return Err(ExternalServiceError::malformed("polarity is not a number").into());
    }

    let result = SentimentResult::external(
        reply.polarity,
        reply.confidence.unwrap_or(0.5),
        thresholds,
    );
    if let Some(label) = &reply.category {
        if !label.eq_ignore_ascii_case(result.category().as_str()) {
            debug!(
                target: "sentimetric::llm",
                reported = %label,
                derived = %result.category(),
                "reported category disagrees with polarity"
            );
        }
    }
    Ok(result.with_details(LlmDetails {
        reported_category: reply.category,
        reasoning: reply.reasoning,
        emotions: reply.emotions,
        tone: reply.tone,
    }))
}

// ------------------------------------------------------------
// Test double
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum MockBehavior {
    Fixed { polarity: f32, confidence: f32 },
    Fail(ExternalServiceError),
}

/// Deterministic source for tests and offline runs. Counts its calls.
#[derive(Debug)]
pub struct MockSource {
    name: String,
    behavior: MockBehavior,
    thresholds: Thresholds,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn fixed(polarity: f32, confidence: f32) -> Self {
        Self {
            name: "mock".to_string(),
            behavior: MockBehavior::Fixed {
                polarity,
                confidence,
            },
            thresholds: Thresholds::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: ExternalServiceError) -> Self {
        Self {
            name: "mock".to_string(),
            behavior: MockBehavior::Fail(err),
            thresholds: Thresholds::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SentimentSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, _text: &str) -> Result<SentimentResult> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &self.behavior {
            MockBehavior::Fixed {
                polarity,
                confidence,
            } => Ok(SentimentResult::external(
                *polarity,
                *confidence,
                &self.thresholds,
            )),
            MockBehavior::Fail(e) => Err(e.clone().into()),
        }
    }
}

// ------------------------------------------------------------
// Factory
// ------------------------------------------------------------

/// External source for the comparator, chosen from the environment:
///
/// * `SENTIMETRIC_LLM_MODE=mock` → a fixed neutral `MockSource`.
/// * `SENTIMETRIC_LLM_MODE=off` → none.
/// * otherwise an `LlmAnalyzer` when its credential is present, none when it
///   is missing. Invalid configuration is an error.
///
/// `thresholds` should be the rule side's, so both categories are cut at the
/// same points when compared.
pub fn build_external_source(
    config: &LlmConfig,
    thresholds: Thresholds,
) -> Result<Option<DynSource>> {
    let mode = std::env::var(ENV_LLM_MODE)
        .unwrap_or_default()
        .to_ascii_lowercase();
    match mode.as_str() {
        "mock" => {
            let mock = MockSource::fixed(0.0, 0.5).with_thresholds(thresholds);
            return Ok(Some(Arc::new(mock)));
        }
        "off" | "disabled" => return Ok(None),
        _ => {}
    }

    match LlmAnalyzer::from_env(config.clone()) {
        Ok(llm) => {
            let llm = llm.with_thresholds(thresholds);
            info!(
                target: "sentimetric::llm",
                provider = llm.config().provider.name(),
                model = llm.config().model(),
                "llm comparison enabled"
            );
            Ok(Some(Arc::new(llm)))
        }
        Err(SentimentError::ExternalService(ExternalServiceError::AuthFailure { message })) => {
            info!(target: "sentimetric::llm", reason = %message, "llm comparison disabled");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::Category;
    use serial_test::serial;

    #[test]
    fn api_key_is_redacted() {
        let k = ApiKey::new("sk-secret-123").unwrap();
        assert_eq!(format!("{k:?}"), "ApiKey(***)");
        assert!(ApiKey::new("   ").is_err());
        assert!(ApiKey::new("bad key\n").is_err());
    }

    #[test]
    #[serial]
    fn missing_credential_fails_at_construction() {
        std::env::remove_var("SENTIMETRIC_TEST_MISSING_KEY");
        let cfg = LlmConfig {
            api_key_env: Some("SENTIMETRIC_TEST_MISSING_KEY".into()),
            ..LlmConfig::default()
        };
        let err = LlmAnalyzer::from_env(cfg).unwrap_err();
        assert!(matches!(
            err,
            SentimentError::ExternalService(ExternalServiceError::AuthFailure { .. })
        ));
    }

    #[test]
    fn parses_fenced_reply_and_rederives_category() {
        let content = "```json\n{\"polarity\": 0.05, \"category\": \"positive\", \"confidence\": 0.9, \"tone\": \"sarcastic\", \"emotions\": [\"irony\"]}\n```";
        let r = parse_reply(content, &Thresholds::default()).unwrap();
        assert_eq!(r.category(), Category::Neutral);
        assert_eq!(r.method(), Method::Llm);
        let d = r.details().unwrap();
        assert_eq!(d.reported_category.as_deref(), Some("positive"));
        assert_eq!(d.tone.as_deref(), Some("sarcastic"));
        assert_eq!(d.emotions, vec!["irony".to_string()]);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let r = parse_reply(
            r#"Sure! {"polarity": -4, "confidence": 7}"#,
            &Thresholds::default(),
        )
        .unwrap();
        assert_eq!(r.polarity(), -1.0);
        assert_eq!(r.confidence(), 1.0);
        assert!(r.is_negative());
    }

    #[test]
    fn garbage_is_malformed() {
        for bad in ["no json here", r#"{"category":"positive"}"#, "```json\n```"] {
            let err = parse_reply(bad, &Thresholds::default()).unwrap_err();
            assert!(
                matches!(
                    err,
                    SentimentError::ExternalService(ExternalServiceError::MalformedResponse { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn status_mapping() {
        let s = |c: u16| StatusCode::from_u16(c).unwrap();
        assert!(matches!(
            classify_status(s(401), None, ""),
            ExternalServiceError::AuthFailure { .. }
        ));
        assert!(matches!(
            classify_status(s(403), None, ""),
            ExternalServiceError::AuthFailure { .. }
        ));
        assert_eq!(
            classify_status(s(429), Some(3), ""),
            ExternalServiceError::RateLimited {
                retry_after_secs: Some(3)
            }
        );
        assert_eq!(classify_status(s(504), None, ""), ExternalServiceError::Timeout);
        assert!(matches!(
            classify_status(s(503), None, "down"),
            ExternalServiceError::Unreachable { .. }
        ));
    }

    #[test]
    fn backoff_doubles_and_honours_retry_after() {
        let t = ExternalServiceError::Timeout;
        assert_eq!(backoff(&t, 0, 500), Duration::from_millis(500));
        assert_eq!(backoff(&t, 2, 500), Duration::from_millis(2000));
        let rl = ExternalServiceError::RateLimited {
            retry_after_secs: Some(5),
        };
        assert_eq!(backoff(&rl, 0, 500), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_text_skips_the_network() {
        let cfg = LlmConfig {
            endpoint: Some("http://127.0.0.1:9/unused".into()),
            ..LlmConfig::default()
        };
        let llm = LlmAnalyzer::with_key(cfg, ApiKey::new("k").unwrap()).unwrap();
        let r = llm.analyze_text("   ").await.unwrap();
        assert!(r.is_neutral());
        assert_eq!(r.method(), Method::Llm);
    }

    #[tokio::test]
    async fn mock_source_counts_calls() {
        let m = MockSource::failing(ExternalServiceError::Timeout).named("flaky");
        assert!(m.analyze("x").await.is_err());
        assert_eq!(m.calls(), 1);
        assert_eq!(m.name(), "flaky");
    }

    #[tokio::test]
    async fn mock_source_uses_given_thresholds() {
        let strict = Thresholds {
            positive: 0.7,
            negative: -0.7,
        };
        let m = MockSource::fixed(0.5, 0.9);
        assert!(m.analyze("x").await.unwrap().is_positive());
        let m = MockSource::fixed(0.5, 0.9).with_thresholds(strict);
        assert!(m.analyze("x").await.unwrap().is_neutral());
    }

    #[test]
    #[serial]
    fn factory_honours_mode() {
        std::env::set_var(ENV_LLM_MODE, "mock");
        let src = build_external_source(&LlmConfig::default(), Thresholds::default()).unwrap();
        assert_eq!(src.map(|s| s.name().to_string()), Some("mock".into()));

        std::env::set_var(ENV_LLM_MODE, "off");
        assert!(build_external_source(&LlmConfig::default(), Thresholds::default()).unwrap().is_none());

        std::env::remove_var(ENV_LLM_MODE);
        let cfg = LlmConfig {
            api_key_env: Some("SENTIMETRIC_TEST_NO_SUCH_KEY".into()),
            ..LlmConfig::default()
        };
        std::env::remove_var("SENTIMETRIC_TEST_NO_SUCH_KEY");
        assert!(build_external_source(&cfg, Thresholds::default()).unwrap().is_none());
    }
}
