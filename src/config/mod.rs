// src/config/mod.rs
//! Configuration: analyzer tuning (TOML) and LLM adapter settings (JSON).

pub mod ai;
pub mod analyzer;

pub use ai::{LlmConfig, LlmProvider};
pub use analyzer::{
    AnalyzerConfig, ConfidenceConfig, IntensityConfig, NegationConfig, PunctuationConfig,
    Thresholds,
};
