// src/analyze/mod.rs
//! Rule-based pipeline entry: text → tokens → evidence → modifiers → score.
//!
//! `Analyzer` is cheap to clone and safe to share across threads: the only
//! shared state is the read-only tables, reached through `TableHandle`
//! snapshots taken once per call.

pub mod ai_adapter;
pub mod batch;
pub mod emoji;
pub mod input;
pub mod lexicon;
pub mod modifiers;
pub mod scoring;
pub mod tokenizer;

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::{debug, Level};

use crate::config::AnalyzerConfig;
use crate::error::{Result, SentimentError};
use crate::logging::anon_hash;
use crate::sentiment::{Method, SentimentResult};

pub use ai_adapter::{ApiKey, LlmAnalyzer, MockSource, SentimentSource};
pub use batch::BatchResult;
pub use emoji::{EmojiSlangEntry, EmojiSlangMap};
pub use input::TextInput;
pub use lexicon::{Intensity, LexicalEntry, Lexicon, TableHandle};
pub use modifiers::ModifierEffect;
pub use tokenizer::{tokenize, Token, TokenStream};

static DEFAULT_ANALYZER: Lazy<Analyzer> = Lazy::new(Analyzer::new);

/// Process-wide analyzer with default settings and the built-in tables.
pub fn default_analyzer() -> &'static Analyzer {
    &DEFAULT_ANALYZER
}

/// Analyze with the default analyzer.
pub fn analyze<T: TextInput + ?Sized>(input: &T) -> Result<SentimentResult> {
    DEFAULT_ANALYZER.analyze(input)
}

/// Batch with the default analyzer.
pub fn analyze_batch<T: TextInput + Sync>(inputs: &[T]) -> BatchResult {
    DEFAULT_ANALYZER.analyze_batch(inputs)
}

#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    lexicon: TableHandle<Lexicon>,
    emoji: TableHandle<EmojiSlangMap>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("lexicon_entries", &self.lexicon.snapshot().len())
            .field("emoji_slang_entries", &self.emoji.snapshot().len())
            .finish()
    }
}

fn load_error(e: anyhow::Error) -> SentimentError {
    SentimentError::configuration(format!("{e:#}"))
}

impl Analyzer {
    /// Default configuration, shared built-in tables.
    pub fn new() -> Self {
        Self {
            config: Arc::new(AnalyzerConfig::default()),
            lexicon: lexicon::global().clone(),
            emoji: emoji::global().clone(),
        }
    }

    /// Validate `config` and load any alternate tables it names. All
    /// configuration problems surface here, never per call.
    pub fn with_config(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let lexicon = match &config.lexicon_path {
            Some(p) => TableHandle::new(Lexicon::load_from_file(p).map_err(load_error)?),
            None => lexicon::global().clone(),
        };
        let emoji = match &config.emoji_slang_path {
            Some(p) => TableHandle::new(EmojiSlangMap::load_from_file(p).map_err(load_error)?),
            None => emoji::global().clone(),
        };
        Ok(Self {
            config: Arc::new(config),
            lexicon,
            emoji,
        })
    }

    /// Explicit tables, e.g. built in memory by tests or an embedding app.
    pub fn with_tables(
        config: AnalyzerConfig,
        lexicon: Lexicon,
        emoji: EmojiSlangMap,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            lexicon: TableHandle::new(lexicon),
            emoji: TableHandle::new(emoji),
        })
    }

    /// `AnalyzerConfig::load_default` followed by `with_config`.
    pub fn from_default_config() -> anyhow::Result<Self> {
        let cfg = AnalyzerConfig::load_default()?;
        Ok(Self::with_config(cfg)?)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &TableHandle<Lexicon> {
        &self.lexicon
    }

    pub fn emoji_slang(&self) -> &TableHandle<EmojiSlangMap> {
        &self.emoji
    }

    /// Start hot-reload watchers for the table files named in the config.
    /// Returns how many were started (0 unless enabled for the environment).
    pub fn watch_tables(&self) -> usize {
        let mut started = 0;
        if let Some(p) = &self.config.lexicon_path {
            if lexicon::start_hot_reload_thread(
                self.lexicon.clone(),
                p.clone(),
                Lexicon::from_json_str,
            ) {
                started += 1;
            }
        }
        if let Some(p) = &self.config.emoji_slang_path {
            if lexicon::start_hot_reload_thread(
                self.emoji.clone(),
                p.clone(),
                EmojiSlangMap::from_json_str,
            ) {
                started += 1;
            }
        }
        started
    }

    pub fn analyze<T: TextInput + ?Sized>(&self, input: &T) -> Result<SentimentResult> {
        let text = input.as_text()?;
        Ok(self.analyze_text(&text))
    }

    /// Infallible core: every `&str` has a result.
    pub fn analyze_text(&self, text: &str) -> SentimentResult {
        let cfg = &*self.config;
        let stream = tokenize(text);
        let words = self.lexicon.snapshot();
        let glyphs = self.emoji.snapshot();

        let hype = emoji::has_hype_cue(&stream);
        let evidence = scoring::collect_evidence(&stream, &words, &glyphs, hype);
        let spans: Vec<modifiers::Span> = evidence.iter().map(|e| e.span).collect();
        let effects = modifiers::resolve(&stream.tokens, &spans, cfg);
        let scored = scoring::score(&stream, &evidence, &effects, cfg);

        let confidence = scoring::confidence(&scored, stream.len(), &cfg.confidence);
        let subjectivity = scoring::subjectivity(&scored, stream.len());

        counter!("sentimetric_analyses_total", "method" => "rule_based").increment(1);
        if tracing::enabled!(target: "sentimetric::analyze", Level::DEBUG) {
            debug!(
                target: "sentimetric::analyze",
                id = %anon_hash(text),
                tokens = stream.len(),
                signals = scored.signals.len(),
                raw = scored.raw,
                saturated = scored.saturated,
                "analyzed"
            );
        }

        SentimentResult::new(
            scored.polarity,
            confidence,
            subjectivity,
            Method::RuleBased,
            scored.signals,
            &cfg.thresholds,
        )
    }

    pub fn analyze_batch<T: TextInput + Sync>(&self, inputs: &[T]) -> BatchResult {
        batch::run(self, inputs)
    }
}

#[async_trait]
impl SentimentSource for Analyzer {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn analyze(&self, text: &str) -> Result<SentimentResult> {
        Ok(self.analyze_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::Category;

    fn p(text: &str) -> f32 {
        analyze(text).unwrap().polarity()
    }

    #[test]
    fn empty_and_blank_are_equal_and_neutral() {
        let a = analyze("").unwrap();
        let b = analyze("   ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.category(), Category::Neutral);
        assert!(a.confidence() > 0.0 && a.confidence() < 0.5);
    }

    #[test]
    fn core_properties_hold() {
        assert!(p("good") > 0.0);
        assert!(p("not good") < 0.0);
        assert!(p("very good") >= p("good"));
        assert!(p("good 🙂") >= p("good"));
        assert!(p("not not bad") < 0.0);
        assert!(p("bad") < 0.0);
    }

    #[test]
    fn signals_explain_the_score() {
        let r = analyze("not very good. 👍").unwrap();
        let sig = r.signals();
        assert_eq!(sig.len(), 2);
        assert_eq!(sig[0].term, "good");
        assert!(sig[0].negated);
        assert_eq!(sig[1].term, "👍");
        assert!(!sig[1].negated);
        let sum: f32 = sig.iter().map(|s| s.contribution).sum();
        assert!((sum - r.polarity()).abs() < 1e-5);
    }

    #[test]
    fn custom_thresholds_shift_category() {
        let strict = Analyzer::with_config(AnalyzerConfig::default().with_thresholds(0.7, -0.7))
            .unwrap();
        assert!(strict.analyze("good").unwrap().is_neutral());
        assert!(Analyzer::new().analyze("good").unwrap().is_positive());
    }

    #[test]
    fn invalid_config_fails_at_build_time() {
        let bad = AnalyzerConfig::default().with_thresholds(-0.2, 0.2);
        assert!(matches!(
            Analyzer::with_config(bad),
            Err(SentimentError::Configuration(_))
        ));
        // Both cut-offs below zero would label empty text positive.
        let shifted = AnalyzerConfig::default().with_thresholds(-0.1, -0.5);
        assert!(matches!(
            Analyzer::with_config(shifted),
            Err(SentimentError::Configuration(_))
        ));
        let missing = AnalyzerConfig::default().with_lexicon_path("/nonexistent/lexicon.json");
        assert!(matches!(
            Analyzer::with_config(missing),
            Err(SentimentError::Configuration(_))
        ));
    }

    #[test]
    fn negation_window_is_configurable() {
        let text = "not a b c d good";
        assert!(Analyzer::new().analyze(text).unwrap().is_positive());

        let wide = Analyzer::with_config(AnalyzerConfig::default().with_negation_window(5))
            .unwrap();
        let r = wide.analyze(text).unwrap();
        assert!(r.is_negative());
        assert!(r.signals()[0].negated);
    }

    #[test]
    fn emoticons_count_before_punctuation() {
        for text in ["thanks :)!", "nice :).", "ok :),"] {
            let r = analyze(text).unwrap();
            assert!(
                r.signals().iter().any(|s| s.term == ":)"),
                "{text:?}: {:?}",
                r.signals()
            );
        }
        let r = analyze("broken again :(.").unwrap();
        assert!(r.signals().iter().any(|s| s.term == ":("));
        assert!(r.is_negative());
    }

    #[test]
    fn elongated_words_prefer_the_double_letter_form() {
        let lex = Lexicon::from_json_str(r#"{"words":{"good":0.6,"god":-0.4}}"#).unwrap();
        let a = Analyzer::with_tables(AnalyzerConfig::default(), lex, EmojiSlangMap::default())
            .unwrap();
        let r = a.analyze("goooood").unwrap();
        assert!(r.is_positive());
        assert_eq!(r.signals()[0].term, "good");
    }

    #[test]
    fn alternate_tables_are_used() {
        let lex = Lexicon::from_json_str(r#"{"words":{"splendid":0.9}}"#).unwrap();
        let a = Analyzer::with_tables(AnalyzerConfig::default(), lex, EmojiSlangMap::default())
            .unwrap();
        assert!(a.analyze("splendid").unwrap().is_positive());
        assert!(a.analyze("good").unwrap().is_neutral());
    }

    #[tokio::test]
    async fn rule_analyzer_is_a_source() {
        let a: Arc<dyn SentimentSource> = Arc::new(Analyzer::new());
        let r = a.analyze("great").await.unwrap();
        assert_eq!(r.method(), Method::RuleBased);
        assert_eq!(a.name(), "rule_based");
    }
}
