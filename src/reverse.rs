//! Reverse Parser
//!
//! Renders a parsed sequence back to text, either in the compact syntax the
//! parser accepts or as an English sentence for chat replies.
//!
//! With options that match the parser's defaults (see
//! [`ReverseParserOptions::matching`]), the compact form parses back to the
//! same sequence.

use std::fmt::Write;

use crate::console::{Console, InputKind, ModifierPosition};
use crate::parser::{DurationUnit, InputToken, ParsedInputSequence, ParserOptions, PressKind};

pub const INVALID_INPUT_TEXT: &str = "Invalid input!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShowPortTypes {
    None,
    ShowAllPorts,
    #[default]
    ShowNonDefaultPorts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShowDurationTypes {
    #[default]
    ShowAllDurations,
    ShowNonDefaultDurations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseParserOptions {
    pub show_ports: ShowPortTypes,
    /// Zero-based
    pub default_port: u32,
    pub show_durations: ShowDurationTypes,
    pub default_duration: u64,
}

impl Default for ReverseParserOptions {
    fn default() -> Self {
        Self {
            show_ports: ShowPortTypes::default(),
            default_port: 0,
            show_durations: ShowDurationTypes::default(),
            default_duration: crate::parser::DEFAULT_DURATION_MS,
        }
    }
}

impl ReverseParserOptions {
    /// Shortest output that parses back identically under `parser`
    pub fn matching(parser: &ParserOptions) -> Self {
        Self {
            show_ports: ShowPortTypes::ShowNonDefaultPorts,
            default_port: parser.default_port,
            show_durations: ShowDurationTypes::ShowNonDefaultDurations,
            default_duration: parser.default_duration,
        }
    }

    fn shows_port(&self, token: &InputToken, is_blank: bool) -> bool {
        match self.show_ports {
            ShowPortTypes::None => false,
            ShowPortTypes::ShowAllPorts => !is_blank || token.controller_port != self.default_port,
            ShowPortTypes::ShowNonDefaultPorts => token.controller_port != self.default_port,
        }
    }

    fn shows_duration(&self, token: &InputToken, is_blank: bool) -> bool {
        match self.show_durations {
            ShowDurationTypes::ShowAllDurations => true,
            ShowDurationTypes::ShowNonDefaultDurations => {
                is_blank
                    || token.duration != self.default_duration
                    || token.duration_unit != DurationUnit::Milliseconds
            }
        }
    }
}

/// Compact text form, empty for sequences that are not valid
pub fn reverse_parse(
    sequence: &ParsedInputSequence,
    console: &Console,
    options: &ReverseParserOptions,
) -> String {
    if !sequence.is_valid() || sequence.inputs.is_empty() {
        return String::new();
    }

    let markers = &console.grammar;
    let mut out = String::with_capacity(sequence.inputs.len() * 8);

    for (i, sub) in sequence.inputs.iter().enumerate() {
        if i > 0 {
            out.push(markers.preferred_delimiter());
        }
        for (j, token) in sub.iter().enumerate() {
            if j > 0 {
                out.push(markers.simultaneous_marker);
            }

            let is_blank = console.is_blank(&token.name);
            let modifier = match token.press {
                PressKind::Tap => None,
                PressKind::Hold => Some(markers.hold_marker),
                PressKind::Release => Some(markers.release_marker),
            };

            if options.shows_port(token, is_blank) {
                let _ = write!(out, "{}{}", markers.port_marker, token.controller_port + 1);
            }
            if let (Some(m), ModifierPosition::Prefix) = (modifier, markers.modifier_position) {
                out.push(m);
            }

            out.push_str(&token.name);

            if let Some(percent) = token.percent {
                let default = console.input(&token.name).map(|i| i.default_percent);
                if default != Some(percent) {
                    let _ = write!(out, "{}{}", percent, markers.percent_marker);
                }
            }

            if options.shows_duration(token, is_blank) {
                let (value, unit) = display_duration(token);
                let _ = write!(out, "{}{}", value, unit.suffix());
            }

            if let (Some(m), ModifierPosition::Suffix) = (modifier, markers.modifier_position) {
                out.push(m);
            }
        }
    }

    out
}

/// English sentence describing the sequence
pub fn reverse_parse_natural(
    sequence: &ParsedInputSequence,
    console: &Console,
    options: &ReverseParserOptions,
) -> String {
    if !sequence.is_valid() || sequence.inputs.is_empty() {
        return INVALID_INPUT_TEXT.to_string();
    }

    let steps: Vec<String> = sequence
        .inputs
        .iter()
        .map(|sub| {
            sub.iter()
                .map(|token| describe_token(token, console, options))
                .collect::<Vec<_>>()
                .join(" and ")
        })
        .collect();

    let sentence = steps.join(", then ");
    let mut chars = sentence.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => INVALID_INPUT_TEXT.to_string(),
    }
}

fn describe_token(token: &InputToken, console: &Console, options: &ReverseParserOptions) -> String {
    let kind = console.input(&token.name).map(|i| i.kind);
    let is_blank = kind == Some(InputKind::Blank);
    let mut text = String::new();

    if is_blank {
        text.push_str("wait");
    } else {
        let verb = match token.press {
            PressKind::Tap => "press",
            PressKind::Hold => "hold",
            PressKind::Release => "release",
        };
        let _ = write!(text, "{} \"{}\"", verb, token.name);

        if let (Some(percent), Some(InputKind::Axis), false) =
            (token.percent, kind, token.is_release())
        {
            let _ = write!(text, " at {}%", percent);
        }
    }

    if !(token.is_release() && token.duration == 0) {
        let (value, unit) = display_duration(token);
        let unit_name = match unit {
            DurationUnit::Milliseconds => "millisecond",
            DurationUnit::Seconds => "second",
        };
        let plural = if value == 1 { "" } else { "s" };
        let _ = write!(text, " for {} {}{}", value, unit_name, plural);
    }

    let shows_port = match options.show_ports {
        ShowPortTypes::None => false,
        ShowPortTypes::ShowAllPorts => !is_blank,
        ShowPortTypes::ShowNonDefaultPorts => token.controller_port != options.default_port,
    };
    if shows_port {
        let _ = write!(text, " on port {}", token.controller_port + 1);
    }

    text
}

/// Value and unit to print; seconds only when they divide evenly
fn display_duration(token: &InputToken) -> (u64, DurationUnit) {
    match token.duration_unit {
        DurationUnit::Seconds if token.duration % 1000 == 0 => {
            (token.duration / 1000, DurationUnit::Seconds)
        }
        _ => (token.duration, DurationUnit::Milliseconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::sample_console;
    use crate::parser::{parse, ParseError};

    fn parsed(text: &str) -> ParsedInputSequence {
        parse(text, &sample_console(), &ParserOptions::default()).expect("grammar compiles")
    }

    #[test]
    fn test_compact_default_options() {
        let console = sample_console();
        let text = reverse_parse(
            &parsed("a200ms+b_,r500ms"),
            &console,
            &ReverseParserOptions::default(),
        );
        assert_eq!(text, "a200ms+b200ms_ b0ms- blank500ms");
    }

    #[test]
    fn test_compact_omits_defaults() {
        let console = sample_console();
        let options = ReverseParserOptions::matching(&ParserOptions::default());

        assert_eq!(
            reverse_parse(&parsed("a &2b1s left50% right"), &console, &options),
            "a &2b1s left50% right"
        );
        assert_eq!(
            reverse_parse(&parsed("r"), &console, &options),
            "blank200ms"
        );
    }

    #[test]
    fn test_compact_show_all_ports() {
        let console = sample_console();
        let options = ReverseParserOptions {
            show_ports: ShowPortTypes::ShowAllPorts,
            ..ReverseParserOptions::matching(&ParserOptions::default())
        };
        assert_eq!(
            reverse_parse(&parsed("a #"), &console, &options),
            "&1a blank200ms"
        );
    }

    #[test]
    fn test_compact_invalid_is_empty() {
        let console = sample_console();
        let invalid = ParsedInputSequence::invalid(ParseError::UnknownInput("xyz".to_string()));
        assert_eq!(
            reverse_parse(&invalid, &console, &ReverseParserOptions::default()),
            ""
        );
    }

    #[test]
    fn test_natural_sentence() {
        let console = sample_console();
        let text = reverse_parse_natural(
            &parsed("a200ms+b_,r500ms"),
            &console,
            &ReverseParserOptions::default(),
        );
        assert_eq!(
            text,
            "Press \"a\" for 200 milliseconds and hold \"b\" for 200 milliseconds, then release \"b\", then wait for 500 milliseconds."
        );
    }

    #[test]
    fn test_natural_units_percent_and_ports() {
        let console = sample_console();
        let text = reverse_parse_natural(
            &parsed("&2left50%1s"),
            &console,
            &ReverseParserOptions::default(),
        );
        assert_eq!(text, "Press \"left\" at 50% for 1 second on port 2.");
    }

    #[test]
    fn test_natural_invalid() {
        let console = sample_console();
        assert_eq!(
            reverse_parse_natural(
                &ParsedInputSequence::normal_msg(),
                &console,
                &ReverseParserOptions::default()
            ),
            INVALID_INPUT_TEXT
        );
    }
}
