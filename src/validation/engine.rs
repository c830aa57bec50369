//! Validation Engine
//!
//! Checks applied to an already parsed sequence right before it is executed:
//! restricted inputs, permission levels, controller ports, invalid combos and
//! how long the pause input is held.
//! Every check is a pure function of the sequence and the context passed in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::console::Console;
use crate::parser::{InputToken, ParsedInputSequence, PressKind};

/// Category of a rejected sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectionKind {
    RestrictedInput,
    LevelTooLow,
    PortOutOfRange,
    ControllerUnavailable,
    InvalidCombo,
    PauseTooLong,
}

/// A sequence that parsed but may not run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type InputValidation = Result<(), Rejection>;

/// Live view of the virtual controllers
pub trait ControllerState {
    fn controller_count(&self) -> u32;

    fn is_acquired(&self, _port: u32) -> bool {
        true
    }

    fn is_pressed(&self, _port: u32, _input: &str) -> bool {
        false
    }
}

/// Fixed controller state, for callers without live devices and for tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    count: u32,
    unacquired: HashSet<u32>,
    pressed: HashSet<(u32, String)>,
}

impl ControllerSnapshot {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_unacquired(mut self, port: u32) -> Self {
        self.unacquired.insert(port);
        self
    }

    pub fn with_pressed(mut self, port: u32, input: impl Into<String>) -> Self {
        self.pressed.insert((port, input.into()));
        self
    }
}

impl ControllerState for ControllerSnapshot {
    fn controller_count(&self) -> u32 {
        self.count
    }

    fn is_acquired(&self, port: u32) -> bool {
        !self.unacquired.contains(&port)
    }

    fn is_pressed(&self, port: u32, input: &str) -> bool {
        self.pressed.contains(&(port, input.to_string()))
    }
}

/// An input a user may not use until `expires_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestrictedInput {
    pub name: String,
    /// `None` restricts every port
    pub port: Option<u32>,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl RestrictedInput {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }

    pub fn applies_to(&self, token: &InputToken) -> bool {
        self.name.eq_ignore_ascii_case(&token.name)
            && self.port.is_none_or(|port| port == token.controller_port)
    }
}

pub fn check_restricted_inputs(
    sequence: &ParsedInputSequence,
    restricted: &[RestrictedInput],
    now: DateTime<Utc>,
) -> InputValidation {
    let active: Vec<&RestrictedInput> = restricted.iter().filter(|r| r.is_active(now)).collect();
    if active.is_empty() {
        return Ok(());
    }

    for token in sequence.tokens() {
        if let Some(restriction) = active.iter().find(|r| r.applies_to(token)) {
            let until = restriction
                .expires_at
                .map(|expiry| format!(" until {}", expiry.format("%Y-%m-%d %H:%M:%S UTC")))
                .unwrap_or_default();
            return Err(Rejection::new(
                RejectionKind::RestrictedInput,
                format!("No permission to use input \"{}\"{}.", token.name, until),
            ));
        }
    }

    Ok(())
}

pub fn validate_level_and_ports(
    user_level: i64,
    sequence: &ParsedInputSequence,
    controllers: &dyn ControllerState,
    console: &Console,
) -> InputValidation {
    let count = controllers.controller_count();

    for token in sequence.tokens() {
        let port = token.controller_port;
        if port >= count {
            return Err(Rejection::new(
                RejectionKind::PortOutOfRange,
                format!(
                    "Invalid controller port {}. Number of controllers: {}.",
                    port + 1,
                    count
                ),
            ));
        }
        if !controllers.is_acquired(port) {
            return Err(Rejection::new(
                RejectionKind::ControllerUnavailable,
                format!("Controller {} is not available right now.", port + 1),
            ));
        }

        if let Some(input) = console.input(&token.name) {
            if input.level > user_level {
                return Err(Rejection::new(
                    RejectionKind::LevelTooLow,
                    format!(
                        "No permission to use input \"{}\", which requires at least level {}.",
                        token.name, input.level
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// Reject sequences that would press a whole invalid combo on one controller
///
/// Held inputs stay pressed across sub-sequences until released; inputs the
/// controllers already hold count from the start.
pub fn validate_invalid_combos(
    sequence: &ParsedInputSequence,
    console: &Console,
    controllers: &dyn ControllerState,
) -> InputValidation {
    for combo in &console.invalid_combos {
        let members: HashSet<&str> = combo.inputs.iter().map(String::as_str).collect();
        if members.is_empty() {
            continue;
        }

        let mut held: HashMap<u32, HashSet<&str>> = HashMap::new();
        for port in 0..controllers.controller_count() {
            if !controllers.is_acquired(port) {
                continue;
            }
            for &member in &members {
                if controllers.is_pressed(port, member) {
                    held.entry(port).or_default().insert(member);
                }
            }
        }

        for sub in &sequence.inputs {
            let mut tapped: HashMap<u32, HashSet<&str>> = HashMap::new();

            for token in sub {
                let Some(&name) = members.get(token.name.as_str()) else {
                    continue;
                };
                let port = token.controller_port;

                match token.press {
                    PressKind::Release => {
                        if let Some(inputs) = held.get_mut(&port) {
                            inputs.remove(name);
                        }
                        continue;
                    }
                    PressKind::Hold => {
                        held.entry(port).or_default().insert(name);
                    }
                    PressKind::Tap => {
                        tapped.entry(port).or_default().insert(name);
                    }
                }

                let covered = members.iter().all(|member| {
                    held.get(&port).is_some_and(|h| h.contains(member))
                        || tapped.get(&port).is_some_and(|t| t.contains(member))
                });
                if covered {
                    return Err(combo_rejection(&combo.inputs));
                }
            }
        }
    }

    Ok(())
}

fn combo_rejection(inputs: &[String]) -> Rejection {
    let names = inputs
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ");
    Rejection::new(
        RejectionKind::InvalidCombo,
        format!("Inputs ({}) are not allowed to be pressed at the same time.", names),
    )
}

/// Reject sequences that keep the pause input down for too long
///
/// Consecutive sub-sequences that press or hold `pause_input` add up. While
/// it is held, each sub-sequence adds its longest token; otherwise only the
/// longest pause token counts. A sub-sequence without it resets the total.
/// A negative `max_pause_duration` turns the check off.
pub fn validate_pause_duration(
    sequence: &ParsedInputSequence,
    pause_input: &str,
    max_pause_duration: i64,
) -> InputValidation {
    let Ok(max) = u64::try_from(max_pause_duration) else {
        return Ok(());
    };

    let mut total = 0u64;
    let mut held = false;

    for sub in &sequence.inputs {
        let mut found = false;
        let mut longest = 0u64;
        let mut longest_pause = 0u64;

        for token in sub {
            longest = longest.max(token.duration);
            if !token.name.eq_ignore_ascii_case(pause_input) {
                continue;
            }

            // "start+&2start1s" counts the longer of the two
            longest_pause = longest_pause.max(token.duration);
            found = true;
            match token.press {
                PressKind::Release => {
                    held = false;
                    found = false;
                }
                PressKind::Hold => held = true,
                PressKind::Tap => {}
            }
        }

        if !(found || held) {
            total = 0;
            continue;
        }

        total += if held { longest } else { longest_pause };
        if total > max {
            return Err(Rejection::new(
                RejectionKind::PauseTooLong,
                format!(
                    "\"{}\" may not be held for more than {} milliseconds.",
                    pause_input, max
                ),
            ));
        }
    }

    Ok(())
}

/// The pause input and how long it may stay down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseLimit<'a> {
    pub input: &'a str,
    /// Milliseconds; negative disables the check
    pub max_duration: i64,
}

/// Inputs to the full post-processing pass
pub struct ValidationContext<'a> {
    pub console: &'a Console,
    pub controllers: &'a dyn ControllerState,
    pub user_level: i64,
    pub restricted: &'a [RestrictedInput],
    pub now: DateTime<Utc>,
    pub pause: Option<PauseLimit<'a>>,
}

/// Run every check in order and stop at the first rejection
pub fn validate_sequence(
    sequence: &ParsedInputSequence,
    context: &ValidationContext<'_>,
) -> InputValidation {
    check_restricted_inputs(sequence, context.restricted, context.now)?;
    validate_level_and_ports(
        context.user_level,
        sequence,
        context.controllers,
        context.console,
    )?;
    validate_invalid_combos(sequence, context.console, context.controllers)?;
    match context.pause {
        Some(limit) => validate_pause_duration(sequence, limit.input, limit.max_duration),
        None => Ok(()),
    }
}
