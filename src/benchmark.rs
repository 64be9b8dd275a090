// src/benchmark.rs
//! Labeled sample set and an accuracy runner for any `SentimentSource`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::analyze::ai_adapter::SentimentSource;
use crate::sentiment::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Positive,
    Negative,
    Neutral,
    Sarcasm,
    Slang,
    Mixed,
    Negation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub text: String,
    pub expected: Category,
    pub kind: SampleKind,
}

impl Sample {
    pub fn new(text: impl Into<String>, expected: Category, kind: SampleKind) -> Self {
        Self {
            text: text.into(),
            expected,
            kind,
        }
    }
}

/// Built-in set: clear cases plus the hard ones (sarcasm, slang, mixed,
/// negation) a lexicon approach is expected to stumble on.
pub fn default_samples() -> Vec<Sample> {
    use Category::{Negative as Neg, Neutral as Neu, Positive as Pos};
    use SampleKind::*;
    [
        ("What an amazing update, love it!", Pos, Positive),
        ("Absolutely brilliant customer service", Pos, Positive),
        ("Thanks so much for the help 😊", Pos, Positive),
        ("This is awful. Total waste of money.", Neg, Negative),
        ("I really hate the new layout", Neg, Negative),
        ("Worst delivery ever 😡", Neg, Negative),
        ("The package arrived on Tuesday.", Neu, Neutral),
        ("It is what it is", Neu, Neutral),
        ("Oh great, it crashed again 🙄", Neg, Sarcasm),
        ("Wow, super helpful, thanks for nothing", Neg, Sarcasm),
        ("Sure, that makes perfect sense", Neg, Sarcasm),
        ("This track is insane! Thank you!", Pos, Slang),
        ("The new album slaps 🔥", Pos, Slang),
        ("Bro that trick was sick!", Pos, Slang),
        ("Good idea but the execution was poor", Neu, Mixed),
        ("Not bad at all, actually pretty good", Pos, Mixed),
        ("Not good, not good at all", Neg, Negation),
        ("I don't hate it", Pos, Negation),
    ]
    .into_iter()
    .map(|(text, expected, kind)| Sample::new(text, expected, kind))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Miss {
    pub text: String,
    pub kind: SampleKind,
    pub expected: Category,
    /// `None` when the source failed.
    pub got: Option<Category>,
    pub polarity: Option<f32>,
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KindScore {
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub source: String,
    pub accuracy: f32,
    pub correct: usize,
    pub total: usize,
    pub by_kind: BTreeMap<SampleKind, KindScore>,
    pub errors: Vec<Miss>,
}

/// Run every sample through `source`, sequentially.
pub async fn run<S: SentimentSource + ?Sized>(source: &S, samples: &[Sample]) -> BenchmarkReport {
    let mut correct = 0;
    let mut by_kind: BTreeMap<SampleKind, KindScore> = BTreeMap::new();
    let mut errors = Vec::new();

    for sample in samples {
        let slot = by_kind.entry(sample.kind).or_default();
        slot.total += 1;
        match source.analyze(&sample.text).await {
            Ok(r) if r.category() == sample.expected => {
                correct += 1;
                slot.correct += 1;
            }
            Ok(r) => errors.push(Miss {
                text: sample.text.clone(),
                kind: sample.kind,
                expected: sample.expected,
                got: Some(r.category()),
                polarity: Some(r.polarity()),
                confidence: Some(r.confidence()),
                error: None,
            }),
            Err(e) => errors.push(Miss {
                text: sample.text.clone(),
                kind: sample.kind,
                expected: sample.expected,
                got: None,
                polarity: None,
                confidence: None,
                error: Some(e.to_string()),
            }),
        }
    }

    let total = samples.len();
    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f32 / total as f32
    };
    info!(
        target: "sentimetric::benchmark",
        source = source.name(),
        correct,
        total,
        accuracy,
        "benchmark finished"
    );
    BenchmarkReport {
        source: source.name().to_string(),
        accuracy,
        correct,
        total,
        by_kind,
        errors,
    }
}
