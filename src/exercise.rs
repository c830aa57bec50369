//! Input Exercises
//!
//! Random practice sequences for users learning the syntax, and the structural
//! comparison used to grade an attempt. Generated sequences always reverse
//! parse to text that parses back to the same sequence.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::console::{Console, InputDef, InputKind};
use crate::parser::{
    InputToken, ParsedInputSequence, PressKind, SubSequence, DEFAULT_MAX_DURATION_MS,
};

const MIN_DURATION_STEPS: u64 = 1;
const MAX_DURATION_STEPS: u64 = 9;
const MIN_PERCENT: u8 = 1;
const MAX_PERCENT: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseOptions {
    pub min_sub_sequences: usize,
    pub max_sub_sequences: usize,
    /// Most inputs pressed at once in one sub-sequence
    pub max_simultaneous: usize,
    pub user_level: i64,
    pub randomize_ports: bool,
    pub controller_count: u32,
    pub default_port: u32,
    /// Total duration the exercise may not exceed
    pub max_duration: u64,
    pub excluded_inputs: Vec<String>,
}

impl Default for ExerciseOptions {
    fn default() -> Self {
        Self {
            min_sub_sequences: 3,
            max_sub_sequences: 7,
            max_simultaneous: 3,
            user_level: 0,
            randomize_ports: false,
            controller_count: 1,
            default_port: 0,
            max_duration: DEFAULT_MAX_DURATION_MS,
            excluded_inputs: Vec::new(),
        }
    }
}

/// First difference between an exercise and an attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExerciseMismatch {
    #[error("Sorry, I couldn't parse your input.")]
    NotValid,

    #[error("Count disparity in input sequence! Try again!")]
    SequenceCount { expected: usize, submitted: usize },

    #[error("Count disparity in input subsequence! Try again!")]
    SubSequenceCount {
        sub_sequence: usize,
        expected: usize,
        submitted: usize,
    },

    #[error("Incorrect input! Try again!")]
    Token {
        sub_sequence: usize,
        index: usize,
        expected: Box<InputToken>,
        submitted: Box<InputToken>,
    },
}

/// Build a random exercise from the inputs the user may press
///
/// Returns `None` when the console offers the user nothing to press.
pub fn generate_exercise<R: Rng + ?Sized>(
    rng: &mut R,
    console: &Console,
    options: &ExerciseOptions,
) -> Option<ParsedInputSequence> {
    let eligible: Vec<&InputDef> = console
        .enabled_inputs()
        .into_iter()
        .filter(|input| input.level <= options.user_level)
        .filter(|input| {
            !options
                .excluded_inputs
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(&input.name))
        })
        .collect();
    if eligible.is_empty() {
        return None;
    }

    let min = options.min_sub_sequences.max(1);
    let max = options.max_sub_sequences.max(min);
    let count = rng.gen_range(min..=max);

    let mut held: Vec<(String, u32)> = Vec::new();
    let mut inputs: Vec<SubSequence> = Vec::with_capacity(count);
    let mut total = 0u64;

    for _ in 0..count {
        let width = if options.max_simultaneous > 1 && rng.gen_bool(0.5) {
            rng.gen_range(2..=options.max_simultaneous)
        } else {
            1
        };

        let sub = generate_sub_sequence(rng, &eligible, width, &mut held, options);
        if sub.is_empty() {
            continue;
        }

        let longest = sub.iter().map(|t| t.duration).max().unwrap_or(0);
        if total + longest > options.max_duration {
            break;
        }
        total += longest;
        inputs.push(sub);
    }

    if inputs.is_empty() {
        return None;
    }

    log::debug!(
        "Generated exercise with {} sub-sequences ({} ms) for console {}",
        inputs.len(),
        total,
        console.name
    );
    Some(ParsedInputSequence::valid(inputs))
}

fn generate_sub_sequence<R: Rng + ?Sized>(
    rng: &mut R,
    eligible: &[&InputDef],
    width: usize,
    held: &mut Vec<(String, u32)>,
    options: &ExerciseOptions,
) -> SubSequence {
    // Waits are redundant next to other inputs, and a wait-only step while
    // inputs are held would have releases inserted in front of it when parsed
    let mut candidates: Vec<&InputDef> = eligible
        .iter()
        .copied()
        .filter(|input| input.kind != InputKind::Blank || (width == 1 && held.is_empty()))
        .collect();
    candidates.shuffle(rng);
    candidates.truncate(width);

    let mut sub = Vec::with_capacity(candidates.len());
    for input in candidates {
        let steps = rng.gen_range(MIN_DURATION_STEPS..=MAX_DURATION_STEPS);
        let mut token = if rng.gen_bool(0.5) {
            InputToken::new(input.name.clone(), steps * 100)
        } else {
            InputToken::new(input.name.clone(), steps * 1000).in_seconds()
        };
        token.controller_port = options.default_port;

        if input.kind != InputKind::Blank {
            if options.randomize_ports && options.controller_count > 0 {
                token.controller_port = rng.gen_range(0..options.controller_count);
            }

            if rng.gen_bool(0.5) {
                let position = held.iter().position(|(name, _)| name == &input.name);
                match position {
                    Some(index) => {
                        let (_, port) = held.remove(index);
                        token.controller_port = port;
                        token.press = PressKind::Release;
                    }
                    None => {
                        held.push((input.name.clone(), token.controller_port));
                        token.press = PressKind::Hold;
                    }
                }
            }
        }

        if input.kind == InputKind::Axis {
            token.percent = Some(if rng.gen_bool(0.5) {
                rng.gen_range(MIN_PERCENT..=MAX_PERCENT)
            } else {
                input.default_percent
            });
        }

        sub.push(token);
    }

    sub
}

/// Grade an attempt against an exercise
pub fn compare_exercise(
    expected: &ParsedInputSequence,
    submitted: &ParsedInputSequence,
    console: &Console,
) -> Result<(), ExerciseMismatch> {
    if !submitted.is_valid() {
        return Err(ExerciseMismatch::NotValid);
    }
    if expected.inputs.len() != submitted.inputs.len() {
        return Err(ExerciseMismatch::SequenceCount {
            expected: expected.inputs.len(),
            submitted: submitted.inputs.len(),
        });
    }

    for (i, (want, got)) in expected.inputs.iter().zip(&submitted.inputs).enumerate() {
        if want.len() != got.len() {
            return Err(ExerciseMismatch::SubSequenceCount {
                sub_sequence: i,
                expected: want.len(),
                submitted: got.len(),
            });
        }

        for (j, (a, b)) in want.iter().zip(got).enumerate() {
            if !tokens_match(a, b, console) {
                return Err(ExerciseMismatch::Token {
                    sub_sequence: i,
                    index: j,
                    expected: Box::new(a.clone()),
                    submitted: Box::new(b.clone()),
                });
            }
        }
    }

    Ok(())
}

/// Field-wise equality where any two waits count as the same input
fn tokens_match(a: &InputToken, b: &InputToken, console: &Console) -> bool {
    let same_name = a.name == b.name || (console.is_blank(&a.name) && console.is_blank(&b.name));
    same_name
        && a.duration == b.duration
        && a.duration_unit == b.duration_unit
        && a.controller_port == b.controller_port
        && a.percent == b.percent
        && a.press == b.press
}
