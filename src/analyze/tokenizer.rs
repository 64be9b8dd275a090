//! Normalizer/tokenizer: raw text → ordered `Token`s.
//!
//! Works on grapheme clusters so that emoji (including ZWJ sequences, skin
//! tones and variation selectors) come out as single standalone tokens.
//! Contractions keep their apostrophe (`don't`), elongated words are collapsed
//! for lookup (`soooo` → `so`) and flagged, and sentence-ending punctuation is
//! recorded on the preceding token so negation windows can stop there.

use std::borrow::Cow;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// ASCII faces recognised as whitespace-delimited chunks, trailing `.,!?` allowed.
pub const EMOTICONS: &[&str] = &[
    ":)", ":-)", ":]", "=)", ":D", ":-D", "xD", "XD", ";)", ";-)", "<3", ":P", ":-P", ":p",
    ":(", ":-(", ":[", "=(", ":'(", ":/", ":-/", "</3", ">:(", "D:",
];

/// A single token. Produced once by `tokenize`, never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Source form as it appeared in the text.
    pub text: String,
    /// Lowercased, elongations collapsed; emoji without modifiers.
    pub normalized: String,
    pub is_emoji: bool,
    pub is_all_caps: bool,
    /// A letter repeated 3+ times in a row ("soooo").
    pub repeat_emphasis: bool,
    /// 0-based index in the token sequence.
    pub position: usize,
    /// Directly followed by `.`, `!` or `?`.
    pub ends_sentence: bool,
}

impl Token {
    /// Forms to try against the tables, longest first. Elongated words try
    /// the double-letter collapse before the single one, so "goooood" finds
    /// "good" rather than "god".
    pub fn lookup_forms(&self) -> Vec<Cow<'_, str>> {
        let mut forms = Vec::with_capacity(2);
        if self.repeat_emphasis {
            let (double, _) = collapse_runs(&self.text.to_lowercase(), 2);
            let double = double.replace('’', "'");
            if double != self.normalized {
                forms.push(Cow::Owned(double));
            }
        }
        forms.push(Cow::Borrowed(self.normalized.as_str()));
        forms
    }
}

/// Tokenizer output: tokens plus punctuation counts used by the scorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub exclamations: usize,
    pub questions: usize,
}

impl TokenStream {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    fn push_word(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let mut count = 0usize;
        let mut has_upper = false;
        let mut has_lower = false;
        for c in raw.chars().filter(|c| c.is_alphabetic()) {
            count += 1;
            has_upper |= c.is_uppercase();
            has_lower |= c.is_lowercase();
        }
        let (normalized, repeat_emphasis) = collapse_runs(&raw.to_lowercase(), 1);
        self.push(Token {
            text: raw.to_string(),
            normalized,
            is_emoji: false,
            is_all_caps: count >= 2 && has_upper && !has_lower,
            repeat_emphasis,
            position: 0,
            ends_sentence: false,
        });
    }

    fn push_emoji(&mut self, raw: &str, normalized: String) {
        self.push(Token {
            text: raw.to_string(),
            normalized,
            is_emoji: true,
            is_all_caps: false,
            repeat_emphasis: false,
            position: 0,
            ends_sentence: false,
        });
    }

    fn push(&mut self, mut token: Token) {
        token.position = self.tokens.len();
        self.tokens.push(token);
    }

    fn mark_sentence_end(&mut self) {
        if let Some(last) = self.tokens.last_mut() {
            last.ends_sentence = true;
        }
    }
}

/// Split `input` into tokens. Empty or whitespace-only input yields an empty
/// stream.
pub fn tokenize(input: &str) -> TokenStream {
    let decoded = html_escape::decode_html_entities(input);
    let mut out = TokenStream {
        exclamations: decoded.matches('!').count(),
        questions: decoded.matches('?').count(),
        ..TokenStream::default()
    };

    for chunk in decoded.split_whitespace() {
        let face = chunk.trim_end_matches(['.', ',', '!', '?']);
        if EMOTICONS.contains(&face) {
            out.push_emoji(face, face.to_string());
            if chunk[face.len()..].contains(['.', '!', '?']) {
                out.mark_sentence_end();
            }
            continue;
        }
        scan_chunk(chunk, &mut out);
    }
    out
}

fn scan_chunk(chunk: &str, out: &mut TokenStream) {
    let graphemes: Vec<&str> = chunk.graphemes(true).collect();
    let mut word = String::new();

    for (i, g) in graphemes.iter().enumerate() {
        let Some(first) = g.chars().next() else {
            continue;
        };
        if is_emoji_grapheme(g) {
            out.push_word(&word);
            word.clear();
            out.push_emoji(g, normalize_emoji(g));
        } else if first.is_alphanumeric() {
            word.push_str(g);
        } else if is_apostrophe(first) && !word.is_empty() && next_is_letter(&graphemes, i) {
            word.push('\'');
        } else {
            out.push_word(&word);
            word.clear();
            if matches!(first, '.' | '!' | '?') {
                out.mark_sentence_end();
            }
        }
    }
    out.push_word(&word);
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '’'
}

fn next_is_letter(graphemes: &[&str], i: usize) -> bool {
    graphemes
        .get(i + 1)
        .and_then(|g| g.chars().next())
        .is_some_and(char::is_alphabetic)
}

/// Pictographic ranges plus keycap sequences.
pub fn is_emoji_grapheme(g: &str) -> bool {
    if g.contains('\u{20E3}') {
        return true;
    }
    g.chars().next().is_some_and(is_emoji_char)
}

fn is_emoji_char(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0x2300..=0x23FF
    )
}

/// Drop variation selectors and skin-tone modifiers so "👍🏽" and "❤️" match
/// their base glyphs.
pub fn normalize_emoji(g: &str) -> String {
    g.chars()
        .filter(|&c| !matches!(c as u32, 0xFE0E | 0xFE0F | 0x1F3FB..=0x1F3FF))
        .collect()
}

/// Collapse runs of 3+ identical letters down to `keep` copies. Returns the
/// collapsed string and whether any run was collapsed. Digits are left alone.
pub fn collapse_runs(s: &str, keep: usize) -> (String, bool) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut found = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut j = i + 1;
        while j < chars.len() && chars[j] == c {
            j += 1;
        }
        let run = j - i;
        if run >= 3 && c.is_alphabetic() {
            found = true;
            out.extend(std::iter::repeat(c).take(keep));
        } else {
            out.extend(std::iter::repeat(c).take(run));
        }
        i = j;
    }
    (out, found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norms(s: &str) -> Vec<String> {
        tokenize(s).tokens.into_iter().map(|t| t.normalized).collect()
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n ").is_empty());
    }

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(norms("Hello, World! #blessed"), vec!["hello", "world", "blessed"]);
    }

    #[test]
    fn keeps_contractions() {
        assert_eq!(norms("I don't care"), vec!["i", "don't", "care"]);
        assert_eq!(norms("It isn’t good"), vec!["it", "isn't", "good"]);
        // Quotes around a word are not contractions.
        assert_eq!(norms("'good'"), vec!["good"]);
    }

    #[test]
    fn decodes_html_entities() {
        assert_eq!(norms("don&#39;t &amp; won&#x27;t"), vec!["don't", "won't"]);
    }

    #[test]
    fn emoji_are_standalone_tokens() {
        let ts = tokenize("good🙂great 👍🏽 ❤️");
        let got: Vec<(&str, bool)> = ts
            .iter()
            .map(|t| (t.normalized.as_str(), t.is_emoji))
            .collect();
        assert_eq!(
            got,
            vec![
                ("good", false),
                ("🙂", true),
                ("great", false),
                ("👍", true),
                ("❤", true)
            ]
        );
        assert_eq!(ts.tokens[3].text, "👍🏽");
    }

    #[test]
    fn emoticons_are_recognised() {
        let ts = tokenize("nice :) but :( XD");
        let emoji: Vec<&str> = ts
            .iter()
            .filter(|t| t.is_emoji)
            .map(|t| t.normalized.as_str())
            .collect();
        assert_eq!(emoji, vec![":)", ":(", "XD"]);
    }

    #[test]
    fn emoticons_survive_trailing_punctuation() {
        let ts = tokenize("thanks :)!");
        assert_eq!(ts.len(), 2);
        assert!(ts.tokens[1].is_emoji);
        assert_eq!(ts.tokens[1].normalized, ":)");
        assert!(ts.tokens[1].ends_sentence);
        assert_eq!(ts.exclamations, 1);

        let ts = tokenize("broken :(. again");
        assert_eq!(ts.tokens[1].normalized, ":(");
        assert!(ts.tokens[1].ends_sentence);
        assert!(!ts.tokens[2].ends_sentence);

        let ts = tokenize("ok :), fine");
        assert_eq!(ts.tokens[1].normalized, ":)");
        assert!(!ts.tokens[1].ends_sentence);
    }

    #[test]
    fn flags_caps_and_repeats() {
        let ts = tokenize("This is SOOOO GOOD I said");
        let so = &ts.tokens[2];
        assert_eq!(so.normalized, "so");
        assert!(so.is_all_caps);
        assert!(so.repeat_emphasis);
        let good = &ts.tokens[3];
        assert!(good.is_all_caps);
        assert!(!good.repeat_emphasis);
        // Single letters never count as shouting.
        assert!(!ts.tokens[4].is_all_caps);
        // Digits are not elongation.
        assert!(!tokenize("1000").tokens[0].repeat_emphasis);
    }

    #[test]
    fn lookup_forms_try_double_collapse_first() {
        let forms = |s: &str| -> Vec<String> {
            tokenize(s).tokens[0]
                .lookup_forms()
                .into_iter()
                .map(|c| c.into_owned())
                .collect()
        };
        assert_eq!(forms("goooood"), vec!["good", "god"]);
        assert_eq!(forms("cooool"), vec!["cool", "col"]);
        assert_eq!(forms("good"), vec!["good"]);
    }

    #[test]
    fn sentence_ends_and_counts() {
        let ts = tokenize("Not great. Fine?! ok");
        assert!(ts.tokens[1].ends_sentence);
        assert!(ts.tokens[2].ends_sentence);
        assert!(!ts.tokens[3].ends_sentence);
        assert_eq!(ts.exclamations, 1);
        assert_eq!(ts.questions, 1);
        let positions: Vec<usize> = ts.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }
}
