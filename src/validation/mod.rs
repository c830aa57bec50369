//! Post-Processing Validators
//!
//! Checks that depend on who sent a sequence and on live controller state,
//! kept apart from parsing so they can run right before execution. The pause
//! hold limit lives here too.

pub mod engine;

pub use engine::{
    check_restricted_inputs, validate_invalid_combos, validate_level_and_ports,
    validate_pause_duration, validate_sequence, ControllerSnapshot, ControllerState,
    InputValidation, PauseLimit, Rejection, RejectionKind, RestrictedInput, ValidationContext,
};
