// src/compare.rs
//! Comparator: reconcile a rule-based result with one from another source.
//!
//! The comparator only sees two `SentimentSource`s; it has no idea whether the
//! second one is an LLM, a mock or another rule set.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::analyze::ai_adapter::DynSource;
use crate::analyze::Analyzer;
use crate::error::{Result, SentimentError};
use crate::logging::anon_hash;
use crate::sentiment::{Method, SentimentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agreement {
    Agree,
    Partial,
    Disagree,
}

/// What to do when the external side fails with an `ExternalService` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Surface the error.
    #[default]
    Strict,
    /// Put a copy of the rule result on the external side and flag the report
    /// as degraded.
    DuplicateRuleResult,
}

fn default_agree_delta() -> f32 {
    0.3
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Largest polarity gap that still counts as full agreement.
    #[serde(default = "default_agree_delta")]
    pub agree_delta: f32,
    #[serde(default)]
    pub fallback: FallbackMode,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            agree_delta: default_agree_delta(),
            fallback: FallbackMode::Strict,
        }
    }
}

impl ComparatorConfig {
    pub fn validate(&self) -> std::result::Result<(), SentimentError> {
        if !(self.agree_delta.is_finite() && (0.0..=2.0).contains(&self.agree_delta)) {
            return Err(SentimentError::configuration(format!(
                "compare.agree_delta must be within [0, 2], got {}",
                self.agree_delta
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub rule_result: SentimentResult,
    pub external_result: SentimentResult,
    pub agreement: Agreement,
    /// `|rule.polarity - external.polarity|`
    pub delta: f32,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<String>,
}

/// Same category within `agree_delta` → agree; same category further apart or
/// one step apart (polar vs neutral) → partial; positive vs negative → disagree.
pub fn classify(rule: &SentimentResult, external: &SentimentResult, agree_delta: f32) -> (Agreement, f32) {
    let delta = (rule.polarity() - external.polarity()).abs();
    let steps = (rule.category().rank() - external.category().rank()).abs();
    let agreement = match steps {
        0 if delta <= agree_delta => Agreement::Agree,
        0 | 1 => Agreement::Partial,
        _ => Agreement::Disagree,
    };
    (agreement, delta)
}

impl ComparisonReport {
    pub fn reconcile(rule: SentimentResult, external: SentimentResult, agree_delta: f32) -> Self {
        let (agreement, delta) = classify(&rule, &external, agree_delta);
        Self {
            rule_result: rule,
            external_result: external,
            agreement,
            delta,
            degraded: false,
            degradation_reason: None,
        }
    }

    fn degraded(rule: SentimentResult, reason: String) -> Self {
        let external = rule.clone().with_method(Method::RuleBasedFallback);
        Self {
            rule_result: rule,
            external_result: external,
            agreement: Agreement::Agree,
            delta: 0.0,
            degraded: true,
            degradation_reason: Some(reason),
        }
    }
}

#[derive(Clone)]
pub struct Comparator {
    rule: DynSource,
    external: DynSource,
    config: ComparatorConfig,
}

impl std::fmt::Debug for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparator")
            .field("rule", &self.rule.name())
            .field("external", &self.external.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Comparator {
    pub fn new(rule: DynSource, external: DynSource, config: ComparatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rule,
            external,
            config,
        })
    }

    /// Default rule-based analyzer on the left-hand side.
    pub fn with_default_rule(external: DynSource, config: ComparatorConfig) -> Result<Self> {
        Self::new(Arc::new(Analyzer::new()), external, config)
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    pub fn external_name(&self) -> &str {
        self.external.name()
    }

    /// Compare using the configured fallback mode.
    pub async fn compare_methods(&self, text: &str) -> Result<ComparisonReport> {
        self.compare_with(text, self.config.fallback).await
    }

    pub async fn compare_with(&self, text: &str, mode: FallbackMode) -> Result<ComparisonReport> {
        let rule = self.rule.analyze(text).await?;
        let report = match self.external.analyze(text).await {
            Ok(external) => ComparisonReport::reconcile(rule, external, self.config.agree_delta),
            Err(e) if e.is_external() && mode == FallbackMode::DuplicateRuleResult => {
                warn!(
                    target: "sentimetric::compare",
                    id = %anon_hash(text),
                    source = self.external.name(),
                    error = %e,
                    "external side failed; using rule result"
                );
                ComparisonReport::degraded(rule, e.to_string())
            }
            Err(e) => return Err(e),
        };
        debug!(
            target: "sentimetric::compare",
            id = %anon_hash(text),
            agreement = ?report.agreement,
            delta = report.delta,
            degraded = report.degraded,
            "compared"
        );
        Ok(report)
    }
}
