// src/lib.rs
// Public library surface for the binary, integration tests and embedding apps.

pub mod analyze;
pub mod api;
pub mod benchmark;
pub mod compare;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod sentiment;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use analyze::{analyze, analyze_batch, default_analyzer, Analyzer, BatchResult, TextInput};
pub use compare::{Agreement, Comparator, ComparatorConfig, ComparisonReport, FallbackMode};
pub use config::{AnalyzerConfig, LlmConfig, LlmProvider};
pub use error::{ExternalServiceError, Result, SentimentError};
pub use sentiment::{Category, Method, SentimentResult, Signal, SignalSource};
