//! Crowd Input
//!
//! Parser for crowd-sourced controller input typed into chat, such as
//! `a200ms+b_,r500ms`.
//!
//! This library provides:
//! - Macro, synonym and repetition preprocessing
//! - Console-driven parsing into timed input sequences
//! - Post-processing validators for permissions, ports and input combos
//! - Compact and natural-language reverse parsing
//! - Input exercises for practising the syntax

pub mod config;
pub mod console;
pub mod exercise;
pub mod parser;
pub mod preparse;
pub mod reverse;
pub mod validation;

pub use config::Config;
pub use console::{Console, ConsoleManager, ConsoleRegistry};
pub use exercise::{compare_exercise, generate_exercise, ExerciseMismatch, ExerciseOptions};
pub use parser::{
    parse, parse_message, InputToken, ParseContext, ParseError, ParsedInputResult,
    ParsedInputSequence, ParserOptions,
};
pub use preparse::{prepare, InputMacro, MacroTable, PreparseError, PreparseOptions};
pub use reverse::{reverse_parse, reverse_parse_natural, ReverseParserOptions};
pub use validation::{validate_sequence, InputValidation, Rejection, ValidationContext};
