// Parsed command data: tokens, simultaneous groups and whole sequences

use super::profile::{Button, Input, SlotAction};

/// Duration given to a token that doesn't specify one
pub const DURATION_DEFAULT_MS: u32 = 200;

/// Ceiling on the summed group durations of one sequence
pub const DURATION_MAX_MS: u32 = 60_000;

/// Fixed length of the `.` separator
pub const PAUSE_DURATION_MS: u32 = 200;

/// One atomic input parsed from chat text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Alphabet name as typed (may be a console synonym like `plus`)
    pub name: String,

    /// Canonical input the name resolved to
    pub input: Input,

    /// Press and leave down until a matching release
    pub hold: bool,

    /// Release a previously held input
    pub release: bool,

    /// Analog magnitude, 0..=100
    pub percent: u8,

    /// Press length in milliseconds
    pub duration_ms: u32,

    /// Characters consumed from the source text
    pub matched_len: usize,
}

impl Token {
    /// A plain press-and-release token with default settings
    pub fn new(name: impl Into<String>, input: Input) -> Self {
        Self {
            name: name.into(),
            input,
            hold: false,
            release: false,
            percent: 100,
            duration_ms: DURATION_DEFAULT_MS,
            matched_len: 0,
        }
    }

    /// Token that performs a save/load state action
    pub fn slot(action: SlotAction, duration_ms: u32) -> Self {
        let mut token = Self::new(Input::Slot(action).to_string(), Input::Slot(action));
        token.duration_ms = duration_ms;
        token
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = percent;
        self
    }

    pub fn held(mut self) -> Self {
        self.hold = true;
        self.release = false;
        self
    }

    pub fn released(mut self) -> Self {
        self.release = true;
        self.hold = false;
        self
    }

    /// The button this token drives, if any
    pub fn button(&self) -> Option<Button> {
        match self.input {
            Input::Button(button) => Some(button),
            _ => None,
        }
    }
}

/// Tokens pressed at the same time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputGroup {
    tokens: Vec<Token>,
}

impl InputGroup {
    pub fn new(first: Token) -> Self {
        Self {
            tokens: vec![first],
        }
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The group lasts as long as its longest token
    pub fn duration_ms(&self) -> u32 {
        self.tokens
            .iter()
            .map(|token| token.duration_ms)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl From<Vec<Token>> for InputGroup {
    fn from(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }
}

/// An accepted command: groups run strictly one after another
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSequence {
    groups: Vec<InputGroup>,
    total_ms: u64,
}

impl CommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group and return the new running total
    pub fn push(&mut self, group: InputGroup) -> u64 {
        self.total_ms += group.duration_ms() as u64;
        self.groups.push(group);
        self.total_ms
    }

    pub fn groups(&self) -> &[InputGroup] {
        &self.groups
    }

    /// Sum of every group's effective duration
    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate every token in execution order
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.groups.iter().flat_map(|group| group.tokens().iter())
    }
}

impl From<Vec<InputGroup>> for CommandSequence {
    fn from(groups: Vec<InputGroup>) -> Self {
        let mut sequence = Self::new();
        for group in groups {
            sequence.push(group);
        }
        sequence
    }
}
