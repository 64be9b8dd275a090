// src/analyze/modifiers.rs
//! Modifier resolver: negation windows, intensifier/diminisher stacking and
//! emphasis cues.
//!
//! One forward pass over the tokens with explicit index arithmetic. The
//! scorer hands in the spans that carry evidence; everything else is either a
//! modifier, a negation trigger or filler that only ages the open windows.

use serde::Serialize;

use super::tokenizer::Token;
use crate::config::AnalyzerConfig;

pub const NEGATIONS: &[&str] = &[
    "not", "no", "never", "neither", "nor", "nobody", "nothing", "none", "nowhere", "without",
    "lack", "lacks", "lacking", "cannot", "don't", "doesn't", "didn't", "can't", "won't",
    "wouldn't", "shouldn't", "couldn't", "isn't", "aren't", "wasn't", "weren't", "hasn't",
    "haven't", "hadn't", "ain't", "dont", "doesnt", "didnt", "cant", "wont", "wouldnt",
    "shouldnt", "couldnt", "isnt", "arent", "wasnt", "werent", "hasnt", "havent", "aint",
];

/// Intensifiers (> 1) and diminishers (< 1).
pub const SCALERS: &[(&str, f32)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("extremely", 1.5),
    ("absolutely", 1.5),
    ("incredibly", 1.5),
    ("so", 1.2),
    ("super", 1.4),
    ("ultra", 1.4),
    ("totally", 1.3),
    ("highly", 1.3),
    ("slightly", 0.5),
    ("somewhat", 0.5),
    ("fairly", 0.6),
    ("rather", 0.6),
    ("pretty", 0.7),
    ("quite", 0.7),
    ("kinda", 0.5),
    ("sorta", 0.5),
    ("barely", 0.4),
];

pub const SCALER_PHRASES: &[(&[&str], f32)] = &[
    (&["kind", "of"], 0.5),
    (&["sort", "of"], 0.5),
    (&["a", "bit"], 0.6),
    (&["a", "little"], 0.6),
];

/// Token range that carries sentiment evidence (a word, emoji or phrase).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

/// Net modifier applied to one evidence span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModifierEffect {
    pub target_token_index: usize,
    pub polarity_multiplier: f32,
    pub is_negation: bool,
    /// Negated and amplified at once ("not very good"); the amplification was
    /// inverted.
    pub conflicting: bool,
}

pub fn is_negation(token: &Token) -> bool {
    !token.is_emoji && NEGATIONS.contains(&token.normalized.as_str())
}

pub fn scaler(word: &str) -> Option<f32> {
    SCALERS.iter().find(|(w, _)| *w == word).map(|(_, f)| *f)
}

/// Scale factor of a modifier starting at `i`, with the number of tokens it covers.
pub fn scaler_at(tokens: &[Token], i: usize) -> Option<(f32, usize)> {
    let tok = tokens.get(i)?;
    if tok.is_emoji {
        return None;
    }
    for (words, factor) in SCALER_PHRASES {
        let end = i + words.len();
        if end <= tokens.len()
            && tokens[i..end]
                .iter()
                .zip(words.iter())
                .all(|(t, w)| t.normalized == *w)
        {
            return Some((*factor, words.len()));
        }
    }
    scaler(&tok.normalized).map(|f| (f, 1))
}

#[derive(Debug, Clone, Copy)]
struct NegationWindow {
    flipped: bool,
    remaining: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingScale {
    factor: f32,
    last_index: usize,
}

fn emphasis(tokens: &[Token], cfg: &AnalyzerConfig) -> f32 {
    let mut m = 1.0;
    if tokens.iter().any(|t| t.is_all_caps) {
        m *= cfg.intensity.caps_boost;
    }
    if tokens.iter().any(|t| t.repeat_emphasis) {
        m *= cfg.intensity.repeat_boost;
    }
    m
}

/// One effect per entry of `spans` (sorted, non-overlapping), in the same order.
pub fn resolve(tokens: &[Token], spans: &[Span], cfg: &AnalyzerConfig) -> Vec<ModifierEffect> {
    let ic = &cfg.intensity;
    let mut effects = Vec::with_capacity(spans.len());
    let mut negation: Option<NegationWindow> = None;
    let mut pending: Option<PendingScale> = None;
    let mut next_span = spans.iter().peekable();
    let mut i = 0;

    while i < tokens.len() {
        // Evidence span.
        if let Some(span) = next_span.next_if(|s| s.start == i) {
            let end = (span.start + span.len).min(tokens.len());
            let covered = &tokens[i..end];

            let scale = pending
                .take()
                .filter(|p| i - p.last_index <= ic.reach)
                .map(|p| p.factor)
                .unwrap_or(1.0);
            let negated = negation.is_some_and(|n| n.flipped && n.remaining > 0);

            let mut multiplier = emphasis(covered, cfg);
            let mut conflicting = false;
            if negated {
                if scale > 1.0 {
                    multiplier /= scale;
                    conflicting = true;
                } else {
                    multiplier *= scale;
                }
                multiplier *= -cfg.negation.damping;
            } else {
                multiplier *= scale;
            }

            effects.push(ModifierEffect {
                target_token_index: i,
                polarity_multiplier: multiplier,
                is_negation: negated,
                conflicting,
            });

            age_window(&mut negation, covered.len());
            if covered.iter().any(|t| t.ends_sentence) {
                negation = None;
            }
            i = end.max(i + 1);
            continue;
        }

        let tok = &tokens[i];

        if is_negation(tok) {
            negation = Some(match negation {
                Some(n) if n.remaining > 0 => NegationWindow {
                    flipped: !n.flipped,
                    remaining: cfg.negation.window,
                },
                _ => NegationWindow {
                    flipped: true,
                    remaining: cfg.negation.window,
                },
            });
            if tok.ends_sentence {
                negation = None;
                pending = None;
            }
            i += 1;
            continue;
        }

        // A modifier phrase never swallows the start of an evidence span.
        let modifier = scaler_at(tokens, i)
            .filter(|&(_, len)| next_span.peek().map_or(true, |s| s.start >= i + len));
        if let Some((factor, len)) = modifier {
            let end = (i + len).min(tokens.len());
            let covered = &tokens[i..end];
            let factor = if factor > 1.0 {
                factor * emphasis(covered, cfg)
            } else {
                factor
            };
            let carried = pending
                .filter(|p| i - p.last_index <= ic.reach)
                .map(|p| p.factor)
                .unwrap_or(1.0);
            pending = Some(PendingScale {
                factor: (carried * factor).clamp(ic.floor, ic.ceiling),
                last_index: end - 1,
            });
            age_window(&mut negation, covered.len());
            if covered.iter().any(|t| t.ends_sentence) {
                negation = None;
                pending = None;
            }
            i = end;
            continue;
        }

        // Filler.
        age_window(&mut negation, 1);
        if tok.ends_sentence {
            negation = None;
            pending = None;
        }
        i += 1;
    }

    effects
}

fn age_window(negation: &mut Option<NegationWindow>, by: usize) {
    if let Some(n) = negation {
        n.remaining = n.remaining.saturating_sub(by);
        if n.remaining == 0 {
            *negation = None;
        }
    }
}
