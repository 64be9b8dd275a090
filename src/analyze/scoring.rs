//! Scorer, categorizer and confidence estimator.
//!
//! `collect_evidence` finds the spans that carry polarity (phrases first, then
//! words, emoji and slang). `score` folds them with the modifier effects into a
//! raw sum, applies punctuation cues and clamps. `confidence` blends three
//! normalized signals in [0,1]:
//! - `coverage`  : share of tokens that carried evidence
//! - `strength`  : magnitude of the raw score
//! - `agreement` : how much the contributions point the same way
//!
//! Base confidence = w_cov*coverage + w_str*strength + w_agr*agreement, divided
//! by the weight sum and clamped to [floor, 1].

use super::emoji::EmojiSlangMap;
use super::lexicon::{Intensity, Lexicon};
use super::modifiers::{self, ModifierEffect, Span};
use super::tokenizer::TokenStream;
use crate::config::{AnalyzerConfig, ConfidenceConfig, IntensityConfig, Thresholds};
use crate::sentiment::{Category, Signal, SignalSource};

/// A span with table polarity, before modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub span: Span,
    pub term: String,
    pub base: f32,
    pub intensity: Intensity,
    pub source: SignalSource,
}

/// Scan left to right; a phrase hit consumes its tokens so the constituent
/// words never count twice.
pub fn collect_evidence(
    stream: &TokenStream,
    lexicon: &Lexicon,
    emoji: &EmojiSlangMap,
    hype: bool,
) -> Vec<Evidence> {
    let tokens = &stream.tokens;
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if let Some((entry, len)) = lexicon.phrase_at(tokens, i) {
            out.push(Evidence {
                span: Span { start: i, len },
                term: entry.term.clone(),
                base: entry.polarity,
                intensity: entry.intensity,
                source: SignalSource::Phrase,
            });
            i += len;
            continue;
        }

        let tok = &tokens[i];
        let is_modifier =
            modifiers::is_negation(tok) || modifiers::scaler(&tok.normalized).is_some();
        if !tok.is_emoji && is_modifier {
            i += 1;
            continue;
        }

        let word_hit = if tok.is_emoji {
            None
        } else {
            lexicon.lookup_token(tok)
        };
        let hit = word_hit
            .map(|e| (e.term.clone(), e.polarity, e.intensity, SignalSource::Lexicon))
            .or_else(|| {
                emoji
                    .lookup(tok, hype)
                    .map(|(e, src)| (tok.normalized.clone(), e.polarity, e.intensity, src))
            });

        if let Some((term, base, intensity, source)) = hit {
            out.push(Evidence {
                span: Span { start: i, len: 1 },
                term,
                base,
                intensity,
                source,
            });
        }
        i += 1;
    }
    out
}

pub fn intensity_weight(intensity: Intensity, cfg: &IntensityConfig) -> f32 {
    match intensity {
        Intensity::Weak => cfg.weak_weight,
        Intensity::Moderate => cfg.moderate_weight,
        Intensity::Strong => cfg.strong_weight,
    }
}

/// Aggregated score of one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    /// Sum after punctuation cues, before clamping.
    pub raw: f32,
    pub polarity: f32,
    pub saturated: bool,
    pub signals: Vec<Signal>,
    pub conflicting: usize,
}

impl Scored {
    pub fn evidence_count(&self) -> usize {
        self.signals.len()
    }
}

pub fn score(
    stream: &TokenStream,
    evidence: &[Evidence],
    effects: &[ModifierEffect],
    cfg: &AnalyzerConfig,
) -> Scored {
    let mut signals = Vec::with_capacity(evidence.len());
    let mut conflicting = 0;
    let mut raw = 0.0f32;

    for (ev, fx) in evidence.iter().zip(effects) {
        let weight = intensity_weight(ev.intensity, &cfg.intensity);
        let contribution = ev.base * weight * fx.polarity_multiplier;
        raw += contribution;
        if fx.conflicting {
            conflicting += 1;
        }
        signals.push(Signal {
            term: ev.term.clone(),
            position: ev.span.start,
            span: ev.span.len,
            source: ev.source,
            base: ev.base,
            weight,
            multiplier: fx.polarity_multiplier,
            contribution,
            negated: fx.is_negation,
        });
    }

    if signals.is_empty() {
        return Scored {
            raw: 0.0,
            polarity: 0.0,
            saturated: false,
            signals,
            conflicting: 0,
        };
    }

    let pc = &cfg.punctuation;
    if raw != 0.0 && stream.exclamations > 0 {
        let boost = 1.0 + pc.exclamation_step * stream.exclamations as f32;
        raw *= boost.min(pc.exclamation_cap);
    }
    if stream.questions > 0 {
        raw *= pc.question_damping;
    }

    Scored {
        raw,
        polarity: raw.clamp(-1.0, 1.0),
        saturated: raw.abs() > 1.0,
        signals,
        conflicting,
    }
}

pub fn categorize(polarity: f32, thresholds: &Thresholds) -> Category {
    Category::from_polarity(polarity, thresholds)
}

/// Normalized confidence inputs in [0,1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConfidenceInputs {
    pub coverage: f32,
    pub strength: f32,
    pub agreement: f32,
}

impl ConfidenceInputs {
    pub fn from_scored(scored: &Scored, token_count: usize, cfg: &ConfidenceConfig) -> Self {
        let n = scored.evidence_count() as f32;
        let total = token_count.max(1) as f32;
        let coverage = (cfg.coverage_gain * n / total).min(1.0);
        let strength = if scored.saturated {
            1.0
        } else {
            (scored.raw.abs() / cfg.saturation_point).min(1.0)
        };

        let sum: f32 = scored.signals.iter().map(|s| s.contribution).sum();
        let abs_sum: f32 = scored.signals.iter().map(|s| s.contribution.abs()).sum();
        let mut agreement = if abs_sum > 0.0 { sum.abs() / abs_sum } else { 0.0 };
        if n > 0.0 {
            agreement -= cfg.conflict_penalty * scored.conflicting as f32 / n;
        }

        Self {
            coverage: coverage.clamp(0.0, 1.0),
            strength: strength.clamp(0.0, 1.0),
            agreement: agreement.clamp(0.0, 1.0),
        }
    }
}

pub fn confidence(scored: &Scored, token_count: usize, cfg: &ConfidenceConfig) -> f32 {
    if scored.evidence_count() == 0 {
        return cfg.floor;
    }
    let inputs = ConfidenceInputs::from_scored(scored, token_count, cfg);
    let raw = inputs.coverage * cfg.coverage_weight
        + inputs.strength * cfg.strength_weight
        + inputs.agreement * cfg.agreement_weight;
    let denom = (cfg.coverage_weight + cfg.strength_weight + cfg.agreement_weight).max(1e-6);
    (raw / denom).clamp(cfg.floor, 1.0)
}

/// Share of tokens carrying evidence, doubled and capped at 1.
pub fn subjectivity(scored: &Scored, token_count: usize) -> f32 {
    if token_count == 0 {
        return 0.0;
    }
    let covered: usize = scored.signals.iter().map(|s| s.span).sum();
    (covered as f32 / token_count as f32 * 2.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::emoji::has_hype_cue;
    use crate::analyze::tokenizer::tokenize;

    fn run(text: &str) -> (Scored, usize) {
        let cfg = AnalyzerConfig::default();
        let lex = Lexicon::builtin().unwrap();
        let emo = EmojiSlangMap::builtin().unwrap();
        let ts = tokenize(text);
        let ev = collect_evidence(&ts, &lex, &emo, has_hype_cue(&ts));
        let spans: Vec<Span> = ev.iter().map(|e| e.span).collect();
        let fx = modifiers::resolve(&ts.tokens, &spans, &cfg);
        (score(&ts, &ev, &fx, &cfg), ts.len())
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn no_evidence_is_exact_zero() {
        let (s, n) = run("the table is in the kitchen");
        assert_eq!(s.polarity, 0.0);
        assert!(s.signals.is_empty());
        assert_eq!(
            confidence(&s, n, &ConfidenceConfig::default()),
            ConfidenceConfig::default().floor
        );
        assert_eq!(subjectivity(&s, n), 0.0);
    }

    #[test]
    fn contribution_uses_intensity_weight() {
        let (s, _) = run("good");
        assert!(approx(s.polarity, 0.6));
        let (s, _) = run("terrible");
        assert!(approx(s.raw, -0.9 * 1.15));
        assert!(s.saturated);
        assert_eq!(s.polarity, -1.0);
    }

    #[test]
    fn phrase_beats_constituents() {
        let (s, _) = run("what a waste of time");
        assert_eq!(s.signals.len(), 1);
        assert_eq!(s.signals[0].source, SignalSource::Phrase);
        assert_eq!(s.signals[0].span, 3);
    }

    #[test]
    fn modifiers_are_not_evidence() {
        let (s, _) = run("not very");
        assert!(s.signals.is_empty());
    }

    #[test]
    fn punctuation_cues() {
        let (plain, _) = run("good");
        let (one, _) = run("good!");
        let (many, _) = run("good!!!!!!");
        let (q, _) = run("good?");
        assert!(approx(one.raw, plain.raw * 1.1));
        assert!(approx(many.raw, plain.raw * 1.3));
        assert!(approx(q.raw, plain.raw * 0.8));
    }

    #[test]
    fn mixed_signals_lower_agreement() {
        let cfg = ConfidenceConfig::default();
        let (clean, n1) = run("great product, love it");
        let (mixed, n2) = run("great product, hate it");
        assert!(confidence(&clean, n1, &cfg) > confidence(&mixed, n2, &cfg));
    }

    #[test]
    fn confidence_weights_are_normalized() {
        let cfg = ConfidenceConfig::default();
        let (s, n) = run("amazing");
        // Full coverage, saturated strength, unanimous agreement.
        assert!(approx(confidence(&s, n, &cfg), 1.0));
    }

    #[test]
    fn subjectivity_counts_covered_tokens() {
        let (s, n) = run("the food was good");
        assert!(approx(subjectivity(&s, n), 0.5));
    }

    #[test]
    fn categorize_uses_thresholds() {
        let t = Thresholds::default();
        assert_eq!(categorize(0.6, &t), Category::Positive);
        assert_eq!(categorize(0.1, &t), Category::Neutral);
        assert_eq!(categorize(-0.48, &t), Category::Negative);
    }
}
