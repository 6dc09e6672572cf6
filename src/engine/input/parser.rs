// Input parser: turns preprocessed chat text into a command sequence

use super::profile::{Button, Input, Profile};
use super::sequence::{
    CommandSequence, InputGroup, Token, DURATION_DEFAULT_MS, DURATION_MAX_MS, PAUSE_DURATION_MS,
};

/// Explicit durations on the start button must stay below this
pub const START_DURATION_LIMIT_MS: u32 = 500;

/// Most tokens one `+` group may hold
pub const MAX_GROUP_TOKENS: usize = 32;

/// Parse failures; each carries the byte position and the offending text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid input \"{found}\" at position {position}")]
    InvalidInput { position: usize, found: String },

    #[error("invalid percentage {percent}% on \"{token}\" at position {position}")]
    InvalidPercentage {
        position: usize,
        token: String,
        percent: u64,
    },

    #[error("duration on \"{token}\" at position {position} needs a unit (s or ms)")]
    DurationTypeUnspecified { position: usize, token: String },

    #[error("\"{token}\" at position {position} holds start for {duration_ms}ms, the limit is {limit_ms}ms")]
    StartButtonDurationMaxExceeded {
        position: usize,
        token: String,
        duration_ms: u64,
        limit_ms: u32,
    },

    #[error("sequence reaches {total_ms}ms at \"{token}\" (position {position}), the limit is {limit_ms}ms")]
    DurationMax {
        position: usize,
        token: String,
        total_ms: u64,
        limit_ms: u32,
    },
}

impl ParseError {
    /// Stable error code echoed back to chat
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "ERR_INVALID_INPUT",
            Self::InvalidPercentage { .. } => "ERR_INVALID_PERCENTAGE",
            Self::DurationTypeUnspecified { .. } => "ERR_DURATION_TYPE_UNSPECIFIED",
            Self::StartButtonDurationMaxExceeded { .. } => "ERR_START_BUTTON_DURATION_MAX_EXCEEDED",
            Self::DurationMax { .. } => "ERR_DURATION_MAX",
        }
    }

    /// Byte offset of the offending token in the parsed text
    pub fn position(&self) -> usize {
        match self {
            Self::InvalidInput { position, .. }
            | Self::InvalidPercentage { position, .. }
            | Self::DurationTypeUnspecified { position, .. }
            | Self::StartButtonDurationMaxExceeded { position, .. }
            | Self::DurationMax { position, .. } => *position,
        }
    }
}

/// Timing limits the parser enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub default_duration_ms: u32,
    pub max_total_ms: u32,
    pub start_max_ms: u32,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            default_duration_ms: DURATION_DEFAULT_MS,
            max_total_ms: DURATION_MAX_MS,
            start_max_ms: START_DURATION_LIMIT_MS,
        }
    }
}

/// Parser bound to one console profile
#[derive(Debug, Clone, Copy)]
pub struct InputParser<'a> {
    profile: &'a Profile,
    limits: ParserLimits,
}

impl<'a> InputParser<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self::with_limits(profile, ParserLimits::default())
    }

    pub fn with_limits(profile: &'a Profile, limits: ParserLimits) -> Self {
        Self { profile, limits }
    }

    pub fn limits(&self) -> ParserLimits {
        self.limits
    }

    /// Parse a whole command. Any error rejects the entire sequence.
    ///
    /// Expects text that is already lowercased, whitespace-free and
    /// macro-expanded.
    pub fn parse(&self, text: &str) -> Result<CommandSequence, ParseError> {
        let mut sequence = CommandSequence::new();
        let mut pos = 0;

        while pos < text.len() {
            let mut last_pos = pos;
            let token = self.get_token(text, pos)?;
            pos += token.matched_len;
            let mut group = InputGroup::new(token);

            while text[pos..].starts_with('+') {
                pos += 1;
                last_pos = pos;
                if group.len() >= MAX_GROUP_TOKENS {
                    return Err(ParseError::InvalidInput {
                        position: pos,
                        found: text[pos..].to_string(),
                    });
                }
                let token = self.get_token(text, pos)?;
                pos += token.matched_len;
                group.push(token);
            }

            let last_token = group
                .tokens()
                .last()
                .map(|token| text[last_pos..last_pos + token.matched_len].to_string())
                .unwrap_or_default();
            let total_ms = sequence.push(group);
            if total_ms > self.limits.max_total_ms as u64 {
                return Err(ParseError::DurationMax {
                    position: last_pos,
                    token: last_token,
                    total_ms,
                    limit_ms: self.limits.max_total_ms,
                });
            }
        }

        Ok(sequence)
    }

    /// Read one token from `text` starting at byte `pos`
    pub fn get_token(&self, text: &str, pos: usize) -> Result<Token, ParseError> {
        let rest = &text[pos..];
        let mut len = 0;
        let mut hold = false;
        let mut release = false;

        match rest.as_bytes().first() {
            Some(b'_') => {
                hold = true;
                len += 1;
            }
            Some(b'-') => {
                release = true;
                len += 1;
            }
            _ => {}
        }

        let (name, input) = self.profile.match_longest(&rest[len..]).ok_or_else(|| {
            ParseError::InvalidInput {
                position: pos,
                found: rest.to_string(),
            }
        })?;
        len += name.len();

        let mut percent = 100;
        let digits = leading_digits(&rest[len..]);
        if !digits.is_empty() && rest[len + digits.len()..].starts_with('%') {
            let value = digits_value(digits);
            len += digits.len() + 1;
            if value > 100 {
                return Err(ParseError::InvalidPercentage {
                    position: pos,
                    token: rest[..len].to_string(),
                    percent: value,
                });
            }
            percent = value as u8;
        }

        let mut duration_ms = self.limits.default_duration_ms as u64;
        let digits = leading_digits(&rest[len..]);
        if !digits.is_empty() {
            let value = digits_value(digits);
            len += digits.len();

            let unit = &rest[len..];
            if unit.starts_with('s') {
                duration_ms = value.saturating_mul(1000);
                len += 1;
            } else if unit.starts_with("ms") {
                duration_ms = value;
                len += 2;
            } else {
                return Err(ParseError::DurationTypeUnspecified {
                    position: pos,
                    token: rest[..len].to_string(),
                });
            }
        }

        // `.` lasts the same whatever was written after it
        if input == Input::Pause {
            duration_ms = PAUSE_DURATION_MS as u64;
        }

        if input == Input::Button(Button::Start) && duration_ms >= self.limits.start_max_ms as u64 {
            return Err(ParseError::StartButtonDurationMaxExceeded {
                position: pos,
                token: rest[..len].to_string(),
                duration_ms,
                limit_ms: self.limits.start_max_ms,
            });
        }

        Ok(Token {
            name: name.to_string(),
            input,
            hold,
            release,
            percent,
            duration_ms: duration_ms.min(u32::MAX as u64) as u32,
            matched_len: len,
        })
    }
}

/// The run of ASCII digits at the front of `s`
fn leading_digits(s: &str) -> &str {
    let end = s
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(s.len());
    &s[..end]
}

/// Decimal value of a digit run, saturating instead of overflowing
fn digits_value(digits: &str) -> u64 {
    digits.bytes().fold(0u64, |acc, b| {
        acc.saturating_mul(10).saturating_add((b - b'0') as u64)
    })
}
