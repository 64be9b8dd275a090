//! Result types returned by every analyzer.
//!
//! `SentimentResult` keeps its fields private: polarity and confidence are
//! clamped on construction and the category is always derived from polarity,
//! so no caller can hand out a "positive" result with a negative score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;

/// Discrete label derived from polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Positive,
    Negative,
    Neutral,
}

impl Category {
    /// Pure thresholding: `> positive` → Positive, `< negative` → Negative.
    pub fn from_polarity(polarity: f32, t: &Thresholds) -> Self {
        if polarity > t.positive {
            Category::Positive
        } else if polarity < t.negative {
            Category::Negative
        } else {
            Category::Neutral
        }
    }

    /// Signed step on the negative → neutral → positive scale.
    pub fn rank(self) -> i8 {
        match self {
            Category::Negative => -1,
            Category::Neutral => 0,
            Category::Positive => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Positive => "positive",
            Category::Negative => "negative",
            Category::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    RuleBased,
    Llm,
    /// Rule-based result standing in for an unavailable external one.
    RuleBasedFallback,
}

/// Where a contributing token got its polarity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Lexicon,
    Phrase,
    Emoji,
    Slang,
}

/// Explanation of one contributing token (or phrase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Normalized term as looked up.
    pub term: String,
    /// Index of the first token.
    pub position: usize,
    /// Number of tokens covered (> 1 for phrases).
    pub span: usize,
    pub source: SignalSource,
    /// Table polarity before any scaling.
    pub base: f32,
    /// Intensity-class weight.
    pub weight: f32,
    /// Modifier multiplier (negation, intensifiers, emphasis).
    pub multiplier: f32,
    /// `base * weight * multiplier`.
    pub contribution: f32,
    pub negated: bool,
}

/// Extra fields reported by an LLM classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    polarity: f32,
    category: Category,
    confidence: f32,
    subjectivity: f32,
    method: Method,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    signals: Vec<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<LlmDetails>,
}

impl SentimentResult {
    pub(crate) fn new(
        polarity: f32,
        confidence: f32,
        subjectivity: f32,
        method: Method,
        signals: Vec<Signal>,
        thresholds: &Thresholds,
    ) -> Self {
        let polarity = clamp_finite(polarity, -1.0, 1.0);
        Self {
            polarity,
            category: Category::from_polarity(polarity, thresholds),
            confidence: clamp_finite(confidence, 0.0, 1.0),
            subjectivity: clamp_finite(subjectivity, 0.0, 1.0),
            method,
            signals,
            details: None,
        }
    }

    /// Build a result reported by some other classifier. Values are clamped
    /// and the category is re-derived from `polarity` under `thresholds`.
    pub fn external(polarity: f32, confidence: f32, thresholds: &Thresholds) -> Self {
        Self::new(polarity, confidence, 0.8, Method::Llm, Vec::new(), thresholds)
    }

    pub fn with_details(mut self, details: LlmDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn polarity(&self) -> f32 {
        self.polarity
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Share of the text that carried sentiment evidence, in `[0,1]`.
    pub fn subjectivity(&self) -> f32 {
        self.subjectivity
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn details(&self) -> Option<&LlmDetails> {
        self.details.as_ref()
    }

    pub fn is_positive(&self) -> bool {
        self.category == Category::Positive
    }

    pub fn is_negative(&self) -> bool {
        self.category == Category::Negative
    }

    pub fn is_neutral(&self) -> bool {
        self.category == Category::Neutral
    }
}

impl fmt::Display for SentimentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SentimentResult(polarity={:+.2}, category='{}', confidence={:.2})",
            self.polarity, self.category, self.confidence
        )
    }
}

/// NaN collapses to the lower bound of the neutral side (0 when in range).
fn clamp_finite(x: f32, lo: f32, hi: f32) -> f32 {
    if x.is_nan() {
        0.0f32.clamp(lo, hi)
    } else {
        x.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_follows_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(Category::from_polarity(0.16, &t), Category::Positive);
        assert_eq!(Category::from_polarity(0.15, &t), Category::Neutral);
        assert_eq!(Category::from_polarity(-0.15, &t), Category::Neutral);
        assert_eq!(Category::from_polarity(-0.16, &t), Category::Negative);
    }

    #[test]
    fn external_results_are_clamped_and_recategorized() {
        let t = Thresholds::default();
        let r = SentimentResult::external(3.0, -1.0, &t);
        assert_eq!(r.polarity(), 1.0);
        assert_eq!(r.confidence(), 0.0);
        assert_eq!(r.category(), Category::Positive);
        assert_eq!(r.method(), Method::Llm);

        let r = SentimentResult::external(f32::NAN, 0.5, &t);
        assert_eq!(r.polarity(), 0.0);
        assert!(r.is_neutral());
    }

    #[test]
    fn display_shape() {
        let r = SentimentResult::external(0.6, 0.85, &Thresholds::default());
        assert_eq!(
            r.to_string(),
            "SentimentResult(polarity=+0.60, category='positive', confidence=0.85)"
        );
    }

    #[test]
    fn serialize_shape() {
        let r = SentimentResult::external(-0.4, 0.7, &Thresholds::default()).with_details(
            LlmDetails {
                tone: Some("sarcastic".into()),
                ..Default::default()
            },
        );
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["category"], "negative");
        assert_eq!(v["method"], "llm");
        assert_eq!(v["details"]["tone"], "sarcastic");
        assert!(v.get("signals").is_none());
    }
}
