// Named macros with positional arguments
//
// A macro key is `#name` or `#name(*,*)` (one `*` per argument). Templates
// refer to arguments as `<0>`, `<1>`, ... Expansion lexes the text into plain
// runs and invocations, renders every invocation of a pass against the same
// source text, and repeats for macros that expand into other macros.

use super::preprocess::MAX_EXPANDED_LEN;
use log::debug;
use std::collections::BTreeMap;

/// Character that starts a macro invocation
pub const MACRO_MARKER: char = '#';

/// Expansion passes before giving up on nested macros
pub const MAX_MACRO_PASSES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacroError {
    #[error("macro names must start with '#': \"{0}\"")]
    MissingMarker(String),

    #[error("invalid macro name \"{0}\"")]
    InvalidName(String),

    #[error("macro template for \"{0}\" is empty")]
    EmptyTemplate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Arg(usize),
}

/// A macro body split into literal text and argument slots
#[derive(Debug, Clone, PartialEq, Eq)]
struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    fn parse(source: &str) -> Self {
        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('<') {
            text.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let digits = after
                .bytes()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let index = if digits > 0 && after[digits..].starts_with('>') {
                after[..digits].parse::<usize>().ok()
            } else {
                None
            };

            match index {
                Some(index) => {
                    if !text.is_empty() {
                        pieces.push(Piece::Text(std::mem::take(&mut text)));
                    }
                    pieces.push(Piece::Arg(index));
                    rest = &after[digits + 1..];
                }
                None => {
                    text.push('<');
                    rest = after;
                }
            }
        }
        text.push_str(rest);
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }

        Self {
            source: source.to_string(),
            pieces,
        }
    }

    /// Fill argument slots; slots without an argument stay literal
    fn render(&self, args: &[&str]) -> String {
        let mut out = String::with_capacity(self.source.len());
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Arg(index) => match args.get(*index) {
                    Some(arg) => out.push_str(arg),
                    None => {
                        out.push('<');
                        out.push_str(&index.to_string());
                        out.push('>');
                    }
                },
            }
        }
        out
    }
}

/// One `#name` or `#name(a,b)` occurrence in chat text
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation<'a> {
    /// `#` plus the identifier run, without any argument list
    ident: &'a str,
    args: Option<Vec<&'a str>>,
}

impl Invocation<'_> {
    /// Key shape used for lookup: `#name` or `#name(*,*)`
    fn generic_name(&self) -> String {
        match &self.args {
            Some(args) => format!("{}({})", self.ident, vec!["*"; args.len()].join(",")),
            None => self.ident.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Invocation(Invocation<'a>),
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.'
}

/// Split text into plain runs and macro invocations
fn lex(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != MACRO_MARKER as u8 {
            i += 1;
            continue;
        }

        if text_start < i {
            segments.push(Segment::Text(&text[text_start..i]));
        }

        let start = i;
        let mut end = i + 1;
        while end < bytes.len() && is_ident_byte(bytes[end]) {
            end += 1;
        }
        let ident = &text[start..end];

        let mut args = None;
        if bytes.get(end) == Some(&b'(') {
            let body = &text[end + 1..];
            let close = body.find(|c: char| c == ')' || c == '(' || c == MACRO_MARKER);
            if let Some(close) = close.filter(|&close| body.as_bytes()[close] == b')') {
                args = Some(body[..close].split(',').collect());
                end += close + 2;
            }
        }

        segments.push(Segment::Invocation(Invocation { ident, args }));
        i = end;
        text_start = end;
    }

    if text_start < bytes.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }
    segments
}

/// Macro definitions, keyed by their generic name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    macros: BTreeMap<String, Template>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a macro key: `#` + lowercase identifier, optional `(*,...)`
    pub fn validate_name(name: &str) -> Result<(), MacroError> {
        let body = name
            .strip_prefix(MACRO_MARKER)
            .ok_or_else(|| MacroError::MissingMarker(name.to_string()))?;

        let (ident, params) = match body.find('(') {
            Some(open) => (&body[..open], Some(&body[open..])),
            None => (body, None),
        };

        let ident_ok = !ident.is_empty()
            && ident
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        let params_ok = match params {
            None => true,
            Some(params) => params
                .strip_prefix('(')
                .and_then(|p| p.strip_suffix(')'))
                .map_or(false, |inner| inner.split(',').all(|p| p == "*")),
        };

        if ident_ok && params_ok {
            Ok(())
        } else {
            Err(MacroError::InvalidName(name.to_string()))
        }
    }

    /// Whether a key takes arguments
    pub fn is_dynamic(name: &str) -> bool {
        name.contains("(*")
    }

    /// Add or replace a macro. Name and template are lowercased and the
    /// template loses its whitespace, matching how chat text is normalized.
    pub fn insert(&mut self, name: &str, template: &str) -> Result<(), MacroError> {
        let name = name.to_lowercase();
        Self::validate_name(&name)?;

        let template: String = template
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if template.is_empty() {
            return Err(MacroError::EmptyTemplate(name));
        }

        self.macros.insert(name, Template::parse(&template));
        Ok(())
    }

    /// Remove a macro, returning whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        self.macros.remove(&name.to_lowercase()).is_some()
    }

    /// The stored template for a key
    pub fn get(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(|template| template.source.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Longest key that prefixes the generic invocation name.
    ///
    /// Keys always begin with the marker and the marker never appears past
    /// the first character of a generic name, so "key occurs in name" and
    /// "key prefixes name" select the same keys.
    fn longest_match(&self, generic: &str) -> Option<(&str, &Template)> {
        self.macros
            .iter()
            .filter(|(key, _)| generic.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, template)| (key.as_str(), template))
    }

    /// One expansion pass. Returns the new text and whether anything changed.
    fn expand_once(&self, text: &str) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut substituted = false;

        for segment in lex(text) {
            match segment {
                Segment::Text(run) => out.push_str(run),
                Segment::Invocation(invocation) => {
                    let generic = invocation.generic_name();
                    let Some((key, template)) = self.longest_match(&generic) else {
                        out.push_str(invocation.ident);
                        if let Some(args) = &invocation.args {
                            out.push('(');
                            out.push_str(&args.join(","));
                            out.push(')');
                        }
                        continue;
                    };

                    substituted = true;
                    match &invocation.args {
                        // The whole call, argument list included, is replaced
                        Some(args) => out.push_str(&template.render(args)),
                        // Only the matched prefix is replaced
                        None => {
                            out.push_str(&template.render(&[]));
                            out.push_str(&invocation.ident[key.len()..]);
                        }
                    }
                }
            }
        }

        (out, substituted)
    }

    /// Expand every invocation, re-scanning up to [`MAX_MACRO_PASSES`] times.
    /// Invocations still pending after the last pass are left as text, as
    /// is everything a pass that would exceed [`MAX_EXPANDED_LEN`] touched.
    pub fn expand(&self, text: &str) -> String {
        let mut text = text.to_string();
        if self.macros.is_empty() {
            return text;
        }

        for _ in 0..MAX_MACRO_PASSES {
            let (next, substituted) = self.expand_once(&text);
            if next.len() > MAX_EXPANDED_LEN {
                debug!("macro expansion passed {} bytes, keeping previous pass", MAX_EXPANDED_LEN);
                break;
            }
            text = next;
            if !substituted {
                break;
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str)]) -> MacroTable {
        let mut table = MacroTable::new();
        for (name, template) in entries {
            table.insert(name, template).unwrap();
        }
        table
    }

    #[test]
    fn test_validate_name() {
        assert!(MacroTable::validate_name("#jump").is_ok());
        assert!(MacroTable::validate_name("#walk(*,*)").is_ok());
        assert_eq!(
            MacroTable::validate_name("jump"),
            Err(MacroError::MissingMarker("jump".to_string()))
        );
        assert!(MacroTable::validate_name("#").is_err());
        assert!(MacroTable::validate_name("#walk(a)").is_err());
        assert!(MacroTable::validate_name("#walk(*").is_err());
        assert!(MacroTable::validate_name("#wa-lk").is_err());
    }

    #[test]
    fn test_insert_normalizes() {
        let table = table(&[("#JUMP", "A 200ms")]);
        assert_eq!(table.get("#jump"), Some("a200ms"));
        assert!(MacroTable::new().insert("#x", "  ").is_err());
    }

    #[test]
    fn test_template_render() {
        let template = Template::parse("<0>+<1>.<0><2>");
        assert_eq!(template.render(&["a", "b"]), "a+b.a<2>");
        assert_eq!(Template::parse("a<b>c<").render(&[]), "a<b>c<");
    }

    #[test]
    fn test_lex() {
        let segments = lex("a#jump+#walk(a,b)c");
        assert_eq!(
            segments,
            vec![
                Segment::Text("a"),
                Segment::Invocation(Invocation {
                    ident: "#jump",
                    args: None
                }),
                Segment::Text("+"),
                Segment::Invocation(Invocation {
                    ident: "#walk",
                    args: Some(vec!["a", "b"])
                }),
                Segment::Text("c"),
            ]
        );
    }

    #[test]
    fn test_lex_unclosed_arguments() {
        let segments = lex("#walk(a");
        assert_eq!(
            segments,
            vec![
                Segment::Invocation(Invocation {
                    ident: "#walk",
                    args: None
                }),
                Segment::Text("(a"),
            ]
        );
    }

    #[test]
    fn test_simple_macro() {
        let table = table(&[("#jump", "a200ms")]);
        assert_eq!(table.expand("#jump+b100ms"), "a200ms+b100ms");
    }

    #[test]
    fn test_multiple_invocations_one_pass() {
        let table = table(&[("#jump", "a"), ("#run", "b1s")]);
        assert_eq!(table.expand("#jump.#run.#jump"), "a.b1s.a");
    }

    #[test]
    fn test_longest_macro_wins() {
        let table = table(&[("#j", "b"), ("#jump", "a")]);
        assert_eq!(table.expand("#jump"), "a");
        assert_eq!(table.expand("#j"), "b");
        // Only the matched prefix is replaced; the tail stays as input text
        assert_eq!(table.expand("#jumpleft"), "aleft");
    }

    #[test]
    fn test_parameterized_macro() {
        let table = table(&[("#walk(*,*)", "<0>1s.<1>1s")]);
        assert_eq!(table.expand("#walk(left,right)"), "left1s.right1s");
    }

    #[test]
    fn test_arity_selects_macro() {
        let table = table(&[("#m(*)", "<0>"), ("#m(*,*)", "<0>+<1>")]);
        assert_eq!(table.expand("#m(a)"), "a");
        assert_eq!(table.expand("#m(a,b)"), "a+b");
    }

    #[test]
    fn test_argument_call_falls_back_to_plain_macro() {
        // No "#m(*)" key: the plain "#m" prefix still matches and the call,
        // argument list included, becomes its template
        let table = table(&[("#m", "x")]);
        assert_eq!(table.expand("#m(a)"), "x");
    }

    #[test]
    fn test_nested_macros() {
        let table = table(&[("#hop", "a"), ("#double", "#hop.#hop")]);
        assert_eq!(table.expand("#double"), "a.a");
    }

    #[test]
    fn test_self_reference_stops_after_pass_limit() {
        let table = table(&[("#loop", "a#loop")]);
        let expanded = table.expand("#loop");
        assert_eq!(expanded, format!("{}#loop", "a".repeat(MAX_MACRO_PASSES)));
    }

    #[test]
    fn test_self_multiplying_macro_is_capped() {
        let table = table(&[("#q", "#q#q#q#q")]);
        let expanded = table.expand("#q");
        assert!(expanded.len() <= MAX_EXPANDED_LEN);
        assert_eq!(expanded, "#q".repeat(4096));
    }

    #[test]
    fn test_unknown_macro_left_alone() {
        let table = table(&[("#jump", "a")]);
        assert_eq!(table.expand("#500ms"), "#500ms");
        assert_eq!(table.expand("#nope(a,b)"), "#nope(a,b)");
    }

    #[test]
    fn test_remove() {
        let mut table = table(&[("#jump", "a")]);
        assert!(table.remove("#JUMP"));
        assert!(!table.remove("#jump"));
        assert!(table.is_empty());
    }
}
