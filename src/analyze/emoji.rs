// src/analyze/emoji.rs
//! Emoji / emoticon / slang table, kept apart from the word lexicon.

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use super::lexicon::{check_polarity, normalize_key, Intensity, RawEntry, TableHandle};
use super::tokenizer::{normalize_emoji, Token, TokenStream};
use crate::error::SentimentError;
use crate::sentiment::SignalSource;

static EMOJI_SLANG: Lazy<TableHandle<EmojiSlangMap>> = Lazy::new(|| {
    TableHandle::new(EmojiSlangMap::builtin().expect("valid emoji/slang table"))
});

pub fn global() -> &'static TableHandle<EmojiSlangMap> {
    &EMOJI_SLANG
}

/// Words that switch context-gated slang on.
const HYPE_WORDS: &[&str] = &["thank", "thanks", "wow", "omg"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmojiSlangEntry {
    pub polarity: f32,
    pub intensity: Intensity,
    /// Counts only when the text carries a hype cue.
    pub needs_context: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSlang {
    Gated {
        polarity: f32,
        #[serde(default)]
        intensity: Option<Intensity>,
        #[serde(default)]
        needs_context: bool,
    },
    Plain(RawEntry),
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    emoji: BTreeMap<String, RawEntry>,
    #[serde(default)]
    slang: BTreeMap<String, RawSlang>,
}

#[derive(Debug, Clone, Default)]
pub struct EmojiSlangMap {
    emoji: HashMap<String, EmojiSlangEntry>,
    slang: HashMap<String, EmojiSlangEntry>,
}

impl EmojiSlangMap {
    pub fn builtin() -> Result<Self, SentimentError> {
        Self::from_json_str(include_str!("../../emoji_slang.json"))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SentimentError> {
        let parsed: RawTable = serde_json::from_str(raw)
            .map_err(|e| SentimentError::configuration(format!("emoji/slang table: {e}")))?;

        let mut map = EmojiSlangMap::default();
        for (glyph, cell) in parsed.emoji {
            let key = normalize_emoji(glyph.trim());
            if key.is_empty() {
                return Err(SentimentError::configuration("emoji key must not be blank"));
            }
            check_polarity(&key, cell.polarity())?;
            map.emoji.insert(
                key,
                EmojiSlangEntry {
                    polarity: cell.polarity(),
                    intensity: cell.intensity(),
                    needs_context: false,
                },
            );
        }
        for (word, cell) in parsed.slang {
            let key = normalize_key(&word);
            if key.is_empty() || key.contains(' ') {
                return Err(SentimentError::configuration(format!(
                    "slang term {word:?} must be a single non-empty token"
                )));
            }
            let entry = match cell {
                RawSlang::Gated {
                    polarity,
                    intensity,
                    needs_context,
                } => EmojiSlangEntry {
                    polarity,
                    intensity: intensity.unwrap_or_else(|| Intensity::from_magnitude(polarity)),
                    needs_context,
                },
                RawSlang::Plain(raw) => EmojiSlangEntry {
                    polarity: raw.polarity(),
                    intensity: raw.intensity(),
                    needs_context: false,
                },
            };
            check_polarity(&key, entry.polarity)?;
            map.slang.insert(key, entry);
        }
        Ok(map)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading emoji/slang table from {}", path.display()))?;
        Self::from_json_str(&data)
            .with_context(|| format!("parsing emoji/slang table {}", path.display()))
    }

    pub fn lookup_emoji(&self, glyph: &str) -> Option<&EmojiSlangEntry> {
        self.emoji.get(glyph)
    }

    pub fn lookup_slang(&self, word: &str) -> Option<&EmojiSlangEntry> {
        self.slang.get(word)
    }

    /// Entry for `token`, honouring context gating. `None` means no evidence.
    pub fn lookup(&self, token: &Token, hype: bool) -> Option<(&EmojiSlangEntry, SignalSource)> {
        if token.is_emoji {
            return self
                .lookup_emoji(&token.normalized)
                .map(|e| (e, SignalSource::Emoji));
        }
        token
            .lookup_forms()
            .iter()
            .find_map(|form| self.slang.get(form.as_ref()))
            .filter(|e| hype || !e.needs_context)
            .map(|e| (e, SignalSource::Slang))
    }

    pub fn len(&self) -> usize {
        self.emoji.len() + self.slang.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `!` anywhere, or one of the hype words.
pub fn has_hype_cue(stream: &TokenStream) -> bool {
    stream.exclamations > 0
        || stream
            .iter()
            .any(|t| HYPE_WORDS.contains(&t.normalized.as_str()))
}
