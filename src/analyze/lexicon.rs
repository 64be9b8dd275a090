// src/analyze/lexicon.rs
//! Lexicon store: normalized word/phrase → base polarity + intensity class.
//!
//! The built-in table is embedded from `sentiment_lexicon.json`. Tables are
//! read-only once built; replacing one means building a new table and swapping
//! it into a `TableHandle`, never editing in place.

use anyhow::Context;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use super::tokenizer::Token;
use crate::error::SentimentError;

pub const ENV_HOT_RELOAD: &str = "SENTIMETRIC_HOT_RELOAD";
pub const ENV_DEPLOY_ENV: &str = "SENTIMETRIC_ENV";

static LEXICON: Lazy<TableHandle<Lexicon>> = Lazy::new(|| {
    TableHandle::new(Lexicon::builtin().expect("valid sentiment lexicon"))
});

/// Process-wide lexicon handle (built-in table unless swapped).
pub fn global() -> &'static TableHandle<Lexicon> {
    &LEXICON
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Weak,
    Moderate,
    Strong,
}

impl Intensity {
    /// `|p| >= 0.8` strong, `>= 0.5` moderate, otherwise weak.
    pub fn from_magnitude(polarity: f32) -> Self {
        let m = polarity.abs();
        if m >= 0.8 {
            Intensity::Strong
        } else if m >= 0.5 {
            Intensity::Moderate
        } else {
            Intensity::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalEntry {
    pub term: String,
    pub polarity: f32,
    pub intensity: Intensity,
}

/// Table cell: a bare score, or an object with an explicit intensity.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawEntry {
    Score(f32),
    Full {
        polarity: f32,
        #[serde(default)]
        intensity: Option<Intensity>,
    },
}

impl RawEntry {
    pub(crate) fn polarity(&self) -> f32 {
        match self {
            RawEntry::Score(p) => *p,
            RawEntry::Full { polarity, .. } => *polarity,
        }
    }

    pub(crate) fn intensity(&self) -> Intensity {
        match self {
            RawEntry::Full {
                intensity: Some(i), ..
            } => *i,
            _ => Intensity::from_magnitude(self.polarity()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLexicon {
    #[serde(default)]
    words: BTreeMap<String, RawEntry>,
    #[serde(default)]
    phrases: BTreeMap<String, RawEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: HashMap<String, LexicalEntry>,
    phrases: HashMap<String, LexicalEntry>,
    max_phrase_len: usize,
}

/// Lowercase, trim and collapse inner whitespace.
pub(crate) fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn check_polarity(term: &str, polarity: f32) -> Result<(), SentimentError> {
    if !polarity.is_finite() || !(-1.0..=1.0).contains(&polarity) {
        return Err(SentimentError::configuration(format!(
            "polarity for {term:?} must be within [-1, 1], got {polarity}"
        )));
    }
    Ok(())
}

impl Lexicon {
    pub fn builtin() -> Result<Self, SentimentError> {
        Self::from_json_str(include_str!("../../sentiment_lexicon.json"))
    }

    /// Parse `{"words": {...}, "phrases": {...}}`. Terms are normalized; when
    /// two keys normalize to the same term the later one wins.
    pub fn from_json_str(raw: &str) -> Result<Self, SentimentError> {
        let parsed: RawLexicon = serde_json::from_str(raw)
            .map_err(|e| SentimentError::configuration(format!("lexicon: {e}")))?;

        let mut lex = Lexicon::default();
        for (key, cell) in parsed.words {
            let term = normalize_key(&key);
            if term.is_empty() || term.contains(' ') {
                return Err(SentimentError::configuration(format!(
                    "lexicon word {key:?} must be a single non-empty token"
                )));
            }
            lex.insert_word(term, &cell)?;
        }
        for (key, cell) in parsed.phrases {
            let term = normalize_key(&key);
            let len = term.split(' ').count();
            if term.is_empty() || len < 2 {
                return Err(SentimentError::configuration(format!(
                    "lexicon phrase {key:?} must span at least two tokens"
                )));
            }
            check_polarity(&term, cell.polarity())?;
            lex.max_phrase_len = lex.max_phrase_len.max(len);
            lex.phrases.insert(
                term.clone(),
                LexicalEntry {
                    term,
                    polarity: cell.polarity(),
                    intensity: cell.intensity(),
                },
            );
        }
        Ok(lex)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading lexicon from {}", path.display()))?;
        Self::from_json_str(&data).with_context(|| format!("parsing lexicon {}", path.display()))
    }

    fn insert_word(&mut self, term: String, cell: &RawEntry) -> Result<(), SentimentError> {
        check_polarity(&term, cell.polarity())?;
        self.words.insert(
            term.clone(),
            LexicalEntry {
                term,
                polarity: cell.polarity(),
                intensity: cell.intensity(),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, normalized: &str) -> Option<&LexicalEntry> {
        self.words.get(normalized)
    }

    /// First lookup form of `token` that hits the word table.
    pub fn lookup_token(&self, token: &Token) -> Option<&LexicalEntry> {
        token
            .lookup_forms()
            .iter()
            .find_map(|form| self.words.get(form.as_ref()))
    }

    /// Longest phrase starting at `start`, with the number of tokens it covers.
    pub fn phrase_at(&self, tokens: &[Token], start: usize) -> Option<(&LexicalEntry, usize)> {
        let longest = self.max_phrase_len.min(tokens.len().saturating_sub(start));
        (2..=longest).rev().find_map(|len| {
            let window = &tokens[start..start + len];
            if window.iter().any(|t| t.is_emoji) {
                return None;
            }
            let key = window
                .iter()
                .map(|t| t.normalized.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            self.phrases.get(&key).map(|e| (e, len))
        })
    }

    pub fn len(&self) -> usize {
        self.words.len() + self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_phrase_len(&self) -> usize {
        self.max_phrase_len
    }
}

/* ----------------------------
Shared table handle + hot reload
---------------------------- */

/// Shared, atomically swappable table. Readers take an `Arc` snapshot and keep
/// using it for the whole call even if a swap happens meanwhile.
pub struct TableHandle<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for TableHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> TableHandle<T> {
    pub fn new(table: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the whole table; returns the previous one.
    pub fn swap(&self, table: T) -> Arc<T> {
        std::mem::replace(&mut *self.inner.write(), Arc::new(table))
    }
}

/// SENTIMETRIC_HOT_RELOAD=1, and a debug build or SENTIMETRIC_ENV in
/// {local, development, dev}.
fn hot_reload_enabled() -> bool {
    if std::env::var(ENV_HOT_RELOAD).ok().as_deref() != Some("1") {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var(ENV_DEPLOY_ENV)
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Poll `path` every 2s and swap a freshly parsed table into `handle` when its
/// mtime moves forward. A file that fails to parse is logged and ignored.
pub fn start_hot_reload_thread<T, F>(handle: TableHandle<T>, path: PathBuf, parse: F) -> bool
where
    T: Send + Sync + 'static,
    F: Fn(&str) -> Result<T, SentimentError> + Send + 'static,
{
    if !hot_reload_enabled() {
        return false;
    }
    spawn_reloader(handle, path, parse, Duration::from_secs(2));
    true
}

fn spawn_reloader<T, F>(handle: TableHandle<T>, path: PathBuf, parse: F, poll: Duration)
where
    T: Send + Sync + 'static,
    F: Fn(&str) -> Result<T, SentimentError> + Send + 'static,
{
    thread::spawn(move || {
        let mut last_mtime: Option<SystemTime> = None;
        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match fs::read_to_string(&path).map(|s| parse(&s)) {
                        Ok(Ok(table)) => {
                            handle.swap(table);
                            info!(target: "sentimetric::tables", path = %path.display(), "table reloaded");
                        }
                        Ok(Err(e)) => {
                            warn!(target: "sentimetric::tables", path = %path.display(), error = %e, "reload rejected")
                        }
                        Err(e) => {
                            warn!(target: "sentimetric::tables", path = %path.display(), error = %e, "reload read failed")
                        }
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}
