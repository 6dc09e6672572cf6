// Text preprocessing ahead of parsing: normalization, `[..]*N` repetition,
// macro substitution and synonym replacement

use super::macros::MacroTable;
use log::debug;

/// Longest text repetition or macro expansion may produce
pub const MAX_EXPANDED_LEN: usize = 8192;

/// Lowercase and drop every whitespace character
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Find the leftmost `[body]*N` with no brackets inside `body` and N of
/// one or two digits. Returns (start, end, body, count).
fn find_repetition(text: &str) -> Option<(usize, usize, &str, usize)> {
    let bytes = text.as_bytes();

    for (open, _) in text.match_indices('[') {
        let body_start = open + 1;
        let Some(close) = text[body_start..].find(|c: char| c == '[' || c == ']') else {
            return None;
        };
        let close = body_start + close;
        if bytes[close] != b']' || bytes.get(close + 1) != Some(&b'*') {
            continue;
        }

        let digits_start = close + 2;
        let digits = text[digits_start..]
            .bytes()
            .take(2)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            continue;
        }

        let end = digits_start + digits;
        let count = text[digits_start..end].parse().ok()?;
        return Some((open, end, &text[body_start..close], count));
    }
    None
}

/// Expand `[body]*N` into `body` repeated N times until none remain.
/// Innermost groups expand first, so nesting works.
///
/// Stops before any expansion that would grow the text past
/// [`MAX_EXPANDED_LEN`]; the unexpanded brackets then fail to parse.
pub fn expand_repetitions(text: &str) -> String {
    let mut text = text.to_string();
    while let Some((start, end, body, count)) = find_repetition(&text) {
        let grown = text.len() - (end - start) + body.len() * count;
        if grown > MAX_EXPANDED_LEN {
            debug!("repetition would grow text to {} bytes, stopping", grown);
            break;
        }
        let expanded = body.repeat(count);
        text.replace_range(start..end, &expanded);
    }
    text
}

/// Ordered literal replacements applied once, after macro expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synonyms {
    pairs: Vec<(String, String)>,
}

impl Synonyms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a replacement; the word is normalized like chat text
    pub fn insert(&mut self, word: &str, replacement: &str) {
        let word = normalize(word);
        if word.is_empty() {
            return;
        }
        let replacement = normalize(replacement);
        match self.pairs.iter_mut().find(|(existing, _)| *existing == word) {
            Some(pair) => pair.1 = replacement,
            None => self.pairs.push((word, replacement)),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        self.pairs
            .iter()
            .fold(text.to_string(), |text, (word, replacement)| {
                text.replace(word.as_str(), replacement)
            })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Synonyms {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut synonyms = Self::new();
        for (word, replacement) in iter {
            synonyms.insert(word.as_ref(), replacement.as_ref());
        }
        synonyms
    }
}

/// Turns raw chat text into the flat string the parser reads
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor<'a> {
    macros: &'a MacroTable,
    synonyms: &'a Synonyms,
}

impl<'a> Preprocessor<'a> {
    pub fn new(macros: &'a MacroTable, synonyms: &'a Synonyms) -> Self {
        Self { macros, synonyms }
    }

    /// Deterministic, side-effect free expansion of one chat message
    pub fn expand(&self, raw: &str) -> String {
        let text = expand_repetitions(&normalize(raw));
        let text = self.macros.expand(&text);
        // Macro templates may carry their own repetitions
        let text = expand_repetitions(&text);
        self.synonyms.apply(&text)
    }
}
