// src/config/analyzer.rs
//! Tuning constants of the rule-based pipeline.
//!
//! Every number the scorer uses lives here with a documented default; a TOML
//! file may override any subset of them:
//!
//! ```toml
//! [thresholds]
//! positive = 0.15
//! negative = -0.15
//!
//! [negation]
//! window = 3
//! damping = 0.8
//! ```
//!
//! Values are validated once, when an `Analyzer` is built.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::SentimentError;

pub const DEFAULT_ANALYZER_CONFIG_PATH: &str = "config/analyzer.toml";
pub const ENV_ANALYZER_CONFIG_PATH: &str = "SENTIMETRIC_CONFIG_PATH";

/// Category cut-offs: `polarity > positive` is positive, `< negative` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub positive: f32,
    pub negative: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            positive: 0.15,
            negative: -0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegationConfig {
    /// Tokens after a trigger that stay negated (cut at sentence end).
    pub window: usize,
    /// Magnitude kept when a contribution is flipped.
    pub damping: f32,
}

impl Default for NegationConfig {
    fn default() -> Self {
        Self {
            window: 3,
            damping: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    /// Upper bound for stacked intensifiers.
    pub ceiling: f32,
    /// Lower bound for stacked diminishers.
    pub floor: f32,
    /// Max distance (tokens) from the last modifier to the word it scales.
    pub reach: usize,
    pub caps_boost: f32,
    pub repeat_boost: f32,
    pub weak_weight: f32,
    pub moderate_weight: f32,
    pub strong_weight: f32,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            ceiling: 2.0,
            floor: 0.25,
            reach: 2,
            caps_boost: 1.25,
            repeat_boost: 1.2,
            weak_weight: 0.85,
            moderate_weight: 1.0,
            strong_weight: 1.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunctuationConfig {
    pub exclamation_step: f32,
    pub exclamation_cap: f32,
    pub question_damping: f32,
}

impl Default for PunctuationConfig {
    fn default() -> Self {
        Self {
            exclamation_step: 0.1,
            exclamation_cap: 1.3,
            question_damping: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Confidence reported when no token carried evidence.
    pub floor: f32,
    /// Coverage = min(1, gain * contributing / tokens).
    pub coverage_gain: f32,
    /// Raw magnitude at which strength counts as full.
    pub saturation_point: f32,
    pub coverage_weight: f32,
    pub strength_weight: f32,
    pub agreement_weight: f32,
    /// Agreement lost when every contribution is a negated intensifier.
    pub conflict_penalty: f32,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            floor: 0.2,
            coverage_gain: 3.0,
            saturation_point: 1.0,
            coverage_weight: 0.35,
            strength_weight: 0.35,
            agreement_weight: 0.30,
            conflict_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub thresholds: Thresholds,
    pub negation: NegationConfig,
    pub intensity: IntensityConfig,
    pub punctuation: PunctuationConfig,
    pub confidence: ConfidenceConfig,
    /// Alternate word lexicon (JSON). Built-in table when absent.
    pub lexicon_path: Option<PathBuf>,
    /// Alternate emoji/slang table (JSON). Built-in table when absent.
    pub emoji_slang_path: Option<PathBuf>,
}

impl AnalyzerConfig {
    /// Parse a TOML string and validate it.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: AnalyzerConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading analyzer config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing analyzer config {}", path.display()))
    }

    /// Resolve the config file:
    /// 1) $SENTIMETRIC_CONFIG_PATH (must exist)
    /// 2) config/analyzer.toml
    /// 3) built-in defaults
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_ANALYZER_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_ANALYZER_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_ANALYZER_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        Ok(Self::default())
    }

    pub fn with_thresholds(mut self, positive: f32, negative: f32) -> Self {
        self.thresholds = Thresholds { positive, negative };
        self
    }

    pub fn with_negation_window(mut self, window: usize) -> Self {
        self.negation.window = window;
        self
    }

    pub fn with_lexicon_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lexicon_path = Some(path.into());
        self
    }

    /// Reject values that would break the polarity/confidence bounds or make
    /// the modifier arithmetic meaningless.
    pub fn validate(&self) -> Result<(), SentimentError> {
        let t = &self.thresholds;
        check_range("thresholds.positive", t.positive, -1.0, 1.0)?;
        check_range("thresholds.negative", t.negative, -1.0, 1.0)?;
        if !(t.negative <= 0.0 && 0.0 <= t.positive) {
            return Err(SentimentError::configuration(format!(
                "thresholds must satisfy negative <= 0 <= positive, got negative = {}, positive = {}",
                t.negative, t.positive
            )));
        }

        let n = &self.negation;
        if !(1..=10).contains(&n.window) {
            return Err(SentimentError::configuration(format!(
                "negation.window must be within 1..=10, got {}",
                n.window
            )));
        }
        check_open_closed("negation.damping", n.damping, 0.0, 1.0)?;

        let i = &self.intensity;
        check_range("intensity.ceiling", i.ceiling, 1.0, 10.0)?;
        check_open_closed("intensity.floor", i.floor, 0.0, 1.0)?;
        if i.reach == 0 {
            return Err(SentimentError::configuration(
                "intensity.reach must be at least 1",
            ));
        }
        check_range("intensity.caps_boost", i.caps_boost, 1.0, 5.0)?;
        check_range("intensity.repeat_boost", i.repeat_boost, 1.0, 5.0)?;
        check_open_closed("intensity.weak_weight", i.weak_weight, 0.0, 5.0)?;
        check_open_closed("intensity.moderate_weight", i.moderate_weight, 0.0, 5.0)?;
        check_open_closed("intensity.strong_weight", i.strong_weight, 0.0, 5.0)?;

        let p = &self.punctuation;
        check_range("punctuation.exclamation_step", p.exclamation_step, 0.0, 1.0)?;
        check_range("punctuation.exclamation_cap", p.exclamation_cap, 1.0, 5.0)?;
        check_open_closed("punctuation.question_damping", p.question_damping, 0.0, 1.0)?;

        let c = &self.confidence;
        if !(c.floor.is_finite() && c.floor > 0.0 && c.floor < 1.0) {
            return Err(SentimentError::configuration(format!(
                "confidence.floor must be within (0, 1), got {}",
                c.floor
            )));
        }
        check_open_closed("confidence.coverage_gain", c.coverage_gain, 0.0, 100.0)?;
        check_open_closed("confidence.saturation_point", c.saturation_point, 0.0, 100.0)?;
        check_range("confidence.coverage_weight", c.coverage_weight, 0.0, 1.0)?;
        check_range("confidence.strength_weight", c.strength_weight, 0.0, 1.0)?;
        check_range("confidence.agreement_weight", c.agreement_weight, 0.0, 1.0)?;
        if c.coverage_weight + c.strength_weight + c.agreement_weight <= 0.0 {
            return Err(SentimentError::configuration(
                "confidence weights must not all be zero",
            ));
        }
        check_range("confidence.conflict_penalty", c.conflict_penalty, 0.0, 1.0)?;
        Ok(())
    }
}

fn check_range(name: &str, v: f32, lo: f32, hi: f32) -> Result<(), SentimentError> {
    if v.is_finite() && (lo..=hi).contains(&v) {
        Ok(())
    } else {
        Err(SentimentError::configuration(format!(
            "{name} must be within [{lo}, {hi}], got {v}"
        )))
    }
}

fn check_open_closed(name: &str, v: f32, lo: f32, hi: f32) -> Result<(), SentimentError> {
    if v.is_finite() && v > lo && v <= hi {
        Ok(())
    } else {
        Err(SentimentError::configuration(format!(
            "{name} must be within ({lo}, {hi}], got {v}"
        )))
    }
}
