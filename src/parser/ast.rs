//! Parsed Input Types
//!
//! Plain value types produced by the parser and consumed by the validators,
//! the reverse parser and the dispatch layer. No parsing logic lives here.

use serde::{Serialize, Serializer};

use crate::preparse::PreparseError;

/// Unit an input duration was written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Milliseconds,
    Seconds,
}

impl DurationUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            DurationUnit::Milliseconds => "ms",
            DurationUnit::Seconds => "s",
        }
    }
}

/// Whether an input is tapped, held down or let go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PressKind {
    #[default]
    Tap,
    Hold,
    Release,
}

/// One input on one controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InputToken {
    /// Canonical input name from the console catalog
    pub name: String,
    /// Milliseconds, whatever unit was written
    pub duration: u64,
    pub duration_unit: DurationUnit,
    /// Zero-based
    pub controller_port: u32,
    /// Only set for axis inputs
    pub percent: Option<u8>,
    pub press: PressKind,
}

impl InputToken {
    /// A tap of `duration` milliseconds on port 0
    pub fn new(name: impl Into<String>, duration: u64) -> Self {
        Self {
            name: name.into(),
            duration,
            duration_unit: DurationUnit::Milliseconds,
            controller_port: 0,
            percent: None,
            press: PressKind::Tap,
        }
    }

    pub fn with_port(mut self, port: u32) -> Self {
        self.controller_port = port;
        self
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn with_press(mut self, press: PressKind) -> Self {
        self.press = press;
        self
    }

    pub fn in_seconds(mut self) -> Self {
        self.duration_unit = DurationUnit::Seconds;
        self
    }

    pub fn is_hold(&self) -> bool {
        self.press == PressKind::Hold
    }

    pub fn is_release(&self) -> bool {
        self.press == PressKind::Release
    }
}

/// Inputs executed at the same time
pub type SubSequence = Vec<InputToken>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParsedInputResult {
    Valid,
    Invalid,
    /// The message was ordinary chat, not an input attempt
    NormalMsg,
}

/// Why a message could not be parsed as inputs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown input \"{0}\"")]
    UnknownInput(String),

    #[error("Input \"{0}\" is disabled")]
    DisabledInput(String),

    #[error("\"{0}\" is missing an input name")]
    MissingInputName(String),

    #[error("Invalid controller port in \"{0}\"")]
    InvalidPort(String),

    #[error("Input \"{0}\" is not an axis and cannot take a percentage")]
    PercentOnNonAxis(String),

    #[error("Percentage {percent} on \"{input}\" must be between 0 and 100")]
    PercentOutOfRange { input: String, percent: String },

    #[error("Invalid duration in \"{0}\"")]
    InvalidDuration(String),

    #[error("Input \"{0}\" cannot be both held and released")]
    HoldAndRelease(String),

    #[error("Input \"{0}\" repeats its hold or release marker")]
    RepeatedModifier(String),

    #[error("Wait input \"{0}\" cannot be held or released")]
    ModifierOnBlank(String),

    #[error("'{0}' must join two inputs")]
    DanglingSimultaneous(char),

    #[error("Input \"{name}\" appears twice for controller {} at the same time", .port + 1)]
    DuplicateInput { name: String, port: u32 },

    #[error("Input sequence lasts {total} ms, over the maximum of {max} ms")]
    SequenceTooLong { total: u64, max: u64 },

    #[error(transparent)]
    Preparse(#[from] PreparseError),
}

impl Serialize for ParseError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The result of parsing one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedInputSequence {
    pub result: ParsedInputResult,
    pub inputs: Vec<SubSequence>,
    /// Sum over sub-sequences of their longest token
    pub total_duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ParseError>,
}

impl ParsedInputSequence {
    pub fn valid(inputs: Vec<SubSequence>) -> Self {
        let total_duration = total_duration(&inputs);
        Self {
            result: ParsedInputResult::Valid,
            inputs,
            total_duration,
            error: None,
        }
    }

    pub fn invalid(error: ParseError) -> Self {
        Self {
            result: ParsedInputResult::Invalid,
            inputs: Vec::new(),
            total_duration: 0,
            error: Some(error),
        }
    }

    pub fn normal_msg() -> Self {
        Self {
            result: ParsedInputResult::NormalMsg,
            inputs: Vec::new(),
            total_duration: 0,
            error: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.result == ParsedInputResult::Valid
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// All tokens in execution order
    pub fn tokens(&self) -> impl Iterator<Item = &InputToken> {
        self.inputs.iter().flatten()
    }
}

pub fn total_duration(inputs: &[SubSequence]) -> u64 {
    inputs
        .iter()
        .map(|sub| sub.iter().map(|token| token.duration).max().unwrap_or(0))
        .fold(0u64, u64::saturating_add)
}
