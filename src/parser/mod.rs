//! Input Sequence Parser
//!
//! Turns prepared chat text into a [`ParsedInputSequence`] using the console's
//! compiled grammar. The parser keeps no state between calls.

pub mod ast;
pub mod grammar;

pub use ast::{
    DurationUnit, InputToken, ParseError, ParsedInputResult, ParsedInputSequence, PressKind,
    SubSequence,
};
pub use grammar::{ConsoleGrammar, GrammarError, RawToken};

use crate::console::{Console, InputDef, InputKind};
use crate::preparse::{self, MacroSource, PreparseOptions};

pub const DEFAULT_DURATION_MS: u64 = 200;
pub const DEFAULT_MAX_DURATION_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Zero-based port used when a token names none
    pub default_port: u32,
    pub default_duration: u64,
    /// Clamp long tokens and reject long sequences
    pub cap_duration: bool,
    pub max_duration: u64,
    /// Release held inputs before a sub-sequence of waits
    pub release_held_on_wait: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            default_port: 0,
            default_duration: DEFAULT_DURATION_MS,
            cap_duration: true,
            max_duration: DEFAULT_MAX_DURATION_MS,
            release_held_on_wait: true,
        }
    }
}

/// Parse prepared text against a console
///
/// Every user mistake comes back as an `Invalid` sequence; only a console whose
/// grammar cannot be compiled is an `Err`.
pub fn parse(
    text: &str,
    console: &Console,
    options: &ParserOptions,
) -> Result<ParsedInputSequence, GrammarError> {
    let grammar = console.grammar()?;
    let mut parser = SequenceParser::new(grammar, console, options);

    let sequence = match parser.run(text) {
        Ok(Some(inputs)) => ParsedInputSequence::valid(inputs),
        Ok(None) => ParsedInputSequence::normal_msg(),
        Err(e) => ParsedInputSequence::invalid(e),
    };

    if sequence.is_valid() && options.cap_duration && sequence.total_duration > options.max_duration
    {
        return Ok(ParsedInputSequence::invalid(ParseError::SequenceTooLong {
            total: sequence.total_duration,
            max: options.max_duration,
        }));
    }

    log::debug!(
        "Parsed '{}' on {}: {:?} with {} sub-sequences ({} ms)",
        text,
        console.name,
        sequence.result,
        sequence.inputs.len(),
        sequence.total_duration
    );
    Ok(sequence)
}

/// Everything a chat message needs to become an input sequence
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    pub console: &'a Console,
    pub macros: &'a dyn MacroSource,
    pub preparse: PreparseOptions,
    pub parser: ParserOptions,
}

impl<'a> ParseContext<'a> {
    pub fn new(console: &'a Console, macros: &'a dyn MacroSource) -> Self {
        Self {
            console,
            macros,
            preparse: PreparseOptions::default(),
            parser: ParserOptions::default(),
        }
    }
}

/// Preprocess and parse a raw chat message
pub fn parse_message(
    text: &str,
    context: &ParseContext<'_>,
) -> Result<ParsedInputSequence, GrammarError> {
    let prepared = match preparse::prepare(
        text,
        context.macros,
        &context.console.synonyms,
        &context.preparse,
    ) {
        Ok(prepared) => prepared,
        Err(e) => return Ok(ParsedInputSequence::invalid(ParseError::Preparse(e))),
    };
    parse(&prepared, context.console, &context.parser)
}

struct SequenceParser<'a> {
    grammar: &'a ConsoleGrammar,
    console: &'a Console,
    options: &'a ParserOptions,
    inputs: Vec<SubSequence>,
    current: SubSequence,
    /// Held (name, port) pairs in hold order
    held: Vec<(String, u32)>,
}

impl<'a> SequenceParser<'a> {
    fn new(grammar: &'a ConsoleGrammar, console: &'a Console, options: &'a ParserOptions) -> Self {
        Self {
            grammar,
            console,
            options,
            inputs: Vec::new(),
            current: Vec::new(),
            held: Vec::new(),
        }
    }

    fn run(&mut self, text: &str) -> Result<Option<Vec<SubSequence>>, ParseError> {
        let simultaneous = self.grammar.markers().simultaneous_marker;
        let mut pos = 0;
        let mut word_start = 0;
        let mut joined = false;

        while let Some(c) = text[pos..].chars().next() {
            if self.grammar.is_delimiter(c) {
                pos += c.len_utf8();
                word_start = pos;
                continue;
            }

            if c == simultaneous {
                if self.current.is_empty() || joined {
                    return Err(ParseError::DanglingSimultaneous(simultaneous));
                }
                joined = true;
                pos += c.len_utf8();
                word_start = pos;
                continue;
            }

            let rest = &text[pos..];
            let Some(raw) = self.grammar.match_token(rest) else {
                return Err(self.unmatched(&text[word_start..pos], rest));
            };

            let token = self.build_token(&raw)?;
            if !joined && !self.current.is_empty() {
                self.close_sub_sequence();
            }
            self.push(token)?;
            joined = false;
            pos += raw.text.len();
        }

        if joined {
            return Err(ParseError::DanglingSimultaneous(simultaneous));
        }
        if !self.current.is_empty() {
            self.close_sub_sequence();
        }

        if self.inputs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(std::mem::take(&mut self.inputs)))
        }
    }

    fn build_token(&self, raw: &RawToken<'_>) -> Result<InputToken, ParseError> {
        let markers = self.grammar.markers();
        let input = self
            .console
            .resolve(raw.input)
            .ok_or_else(|| ParseError::UnknownInput(raw.input.to_string()))?;

        let controller_port = match raw.port {
            Some(digits) => match digits.parse::<u32>() {
                Ok(port) if port > 0 => port - 1,
                _ => return Err(ParseError::InvalidPort(raw.text.to_string())),
            },
            None => self.options.default_port,
        };

        let press = match (raw.leading_modifier, raw.trailing_modifier) {
            (Some(a), Some(b)) if a == b => {
                return Err(ParseError::RepeatedModifier(input.name.clone()));
            }
            (Some(_), Some(_)) => return Err(ParseError::HoldAndRelease(input.name.clone())),
            (Some(m), None) | (None, Some(m)) if m == markers.hold_marker => PressKind::Hold,
            (Some(_), None) | (None, Some(_)) => PressKind::Release,
            (None, None) => PressKind::Tap,
        };
        if press != PressKind::Tap && input.kind == InputKind::Blank {
            return Err(ParseError::ModifierOnBlank(input.name.clone()));
        }

        let percent = self.percent(input, raw.percent)?;
        let (duration, duration_unit) = self.duration(raw)?;

        Ok(InputToken {
            name: input.name.clone(),
            duration,
            duration_unit,
            controller_port,
            percent,
            press,
        })
    }

    fn percent(&self, input: &InputDef, written: Option<&str>) -> Result<Option<u8>, ParseError> {
        let Some(digits) = written else {
            return Ok((input.kind == InputKind::Axis).then_some(input.default_percent));
        };
        if input.kind != InputKind::Axis {
            return Err(ParseError::PercentOnNonAxis(input.name.clone()));
        }
        match digits.parse::<u8>() {
            Ok(percent) if percent <= 100 => Ok(Some(percent)),
            _ => Err(ParseError::PercentOutOfRange {
                input: input.name.clone(),
                percent: digits.to_string(),
            }),
        }
    }

    fn duration(&self, raw: &RawToken<'_>) -> Result<(u64, DurationUnit), ParseError> {
        let (Some(digits), Some(unit)) = (raw.duration, raw.unit) else {
            return Ok((self.options.default_duration, DurationUnit::Milliseconds));
        };

        let unit = if unit.eq_ignore_ascii_case("s") {
            DurationUnit::Seconds
        } else {
            DurationUnit::Milliseconds
        };
        let scale = match unit {
            DurationUnit::Seconds => 1000,
            DurationUnit::Milliseconds => 1,
        };
        let parsed = digits
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(scale));

        match parsed {
            Some(duration) if !self.options.cap_duration || duration <= self.options.max_duration => {
                Ok((duration, unit))
            }
            _ if self.options.cap_duration => {
                let max = self.options.max_duration;
                log::debug!("Clamping '{}' to {} ms", raw.text, max);
                let unit = if unit == DurationUnit::Seconds && max % 1000 == 0 {
                    DurationUnit::Seconds
                } else {
                    DurationUnit::Milliseconds
                };
                Ok((max, unit))
            }
            _ => Err(ParseError::InvalidDuration(raw.text.to_string())),
        }
    }

    fn push(&mut self, token: InputToken) -> Result<(), ParseError> {
        let duplicate = self
            .current
            .iter()
            .any(|t| t.name == token.name && t.controller_port == token.controller_port);
        if duplicate {
            return Err(ParseError::DuplicateInput {
                name: token.name,
                port: token.controller_port,
            });
        }
        self.current.push(token);
        Ok(())
    }

    fn close_sub_sequence(&mut self) {
        let sub = std::mem::take(&mut self.current);

        let only_waits = sub.iter().all(|t| self.console.is_blank(&t.name));
        if self.options.release_held_on_wait && only_waits && !self.held.is_empty() {
            let releases = self
                .held
                .drain(..)
                .map(|(name, port)| {
                    let percent = self
                        .console
                        .input(&name)
                        .filter(|i| i.kind == InputKind::Axis)
                        .map(|i| i.default_percent);
                    InputToken {
                        name,
                        duration: 0,
                        duration_unit: DurationUnit::Milliseconds,
                        controller_port: port,
                        percent,
                        press: PressKind::Release,
                    }
                })
                .collect();
            self.inputs.push(releases);
        }

        for token in &sub {
            let key = (token.name.clone(), token.controller_port);
            match token.press {
                PressKind::Hold => {
                    if !self.held.contains(&key) {
                        self.held.push(key);
                    }
                }
                PressKind::Release => self.held.retain(|held| held != &key),
                PressKind::Tap => {}
            }
        }

        self.inputs.push(sub);
    }

    /// Explain why no token matched at the start of `rest`
    ///
    /// `matched` is the part of the current word already consumed as tokens,
    /// so the error names the whole word the user typed.
    fn unmatched(&self, matched: &str, rest: &str) -> ParseError {
        let markers = self.grammar.markers();
        let end = rest
            .find(|c: char| self.grammar.is_delimiter(c) || c == markers.simultaneous_marker)
            .unwrap_or(rest.len());
        let unmatched = &rest[..end];
        let word = format!("{matched}{unmatched}");

        let body = unmatched
            .strip_prefix(markers.port_marker)
            .map(|after| after.trim_start_matches(|c: char| c.is_ascii_digit()))
            .unwrap_or(unmatched)
            .trim_start_matches([markers.hold_marker, markers.release_marker]);

        if body.is_empty() || body.starts_with(|c: char| c.is_ascii_digit()) {
            return ParseError::MissingInputName(word);
        }

        let lower = body.to_lowercase();
        let disabled = self
            .console
            .inputs()
            .filter(|input| !input.enabled)
            .flat_map(|input| {
                std::iter::once(input.name.as_str())
                    .chain(self.console.aliases_of(&input.name))
                    .map(move |name| (name, input))
            })
            .filter(|(name, _)| lower.starts_with(*name))
            .max_by_key(|(name, _)| name.len());

        match disabled {
            Some((_, input)) => ParseError::DisabledInput(input.name.clone()),
            None => ParseError::UnknownInput(word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::sample_console;
    use crate::preparse::{InputMacro, MacroTable, PreparseError};

    fn parse_sample(text: &str) -> ParsedInputSequence {
        parse(text, &sample_console(), &ParserOptions::default()).expect("grammar compiles")
    }

    #[test]
    fn test_parse_simple_sequence() {
        let sequence = parse_sample("a b500ms");
        assert!(sequence.is_valid());
        assert_eq!(
            sequence.inputs,
            vec![
                vec![InputToken::new("a", 200)],
                vec![InputToken::new("b", 500)],
            ]
        );
        assert_eq!(sequence.total_duration, 700);
    }

    #[test]
    fn test_parse_simultaneous_and_back_to_back() {
        let sequence = parse_sample("a+b c,ab");
        assert_eq!(sequence.inputs.len(), 4);
        assert_eq!(sequence.inputs[0].len(), 2);
        assert_eq!(sequence.inputs[2][0].name, "a");
        assert_eq!(sequence.inputs[3][0].name, "b");
    }

    #[test]
    fn test_release_inserted_before_wait() {
        let sequence = parse_sample("a200ms+b_,r500ms");
        assert!(sequence.is_valid(), "{:?}", sequence.error);
        assert_eq!(
            sequence.inputs,
            vec![
                vec![
                    InputToken::new("a", 200),
                    InputToken::new("b", 200).with_press(PressKind::Hold),
                ],
                vec![InputToken::new("b", 0).with_press(PressKind::Release)],
                vec![InputToken::new("blank", 500)],
            ]
        );
        assert_eq!(sequence.total_duration, 700);
    }

    #[test]
    fn test_no_implicit_release_when_disabled() {
        let options = ParserOptions {
            release_held_on_wait: false,
            ..ParserOptions::default()
        };
        let sequence = parse("b_ #500ms", &sample_console(), &options).expect("grammar");
        assert_eq!(sequence.inputs.len(), 2);
    }

    #[test]
    fn test_port_and_percent() {
        let sequence = parse_sample("&2left50%1s right");
        let left = &sequence.inputs[0][0];
        assert_eq!(left.controller_port, 1);
        assert_eq!(left.percent, Some(50));
        assert_eq!(left.duration, 1000);
        assert_eq!(left.duration_unit, DurationUnit::Seconds);
        assert_eq!(sequence.inputs[1][0].percent, Some(80));
    }

    #[test]
    fn test_port_zero_is_invalid() {
        let sequence = parse_sample("&0a");
        assert!(matches!(sequence.error, Some(ParseError::InvalidPort(_))));
    }

    #[test]
    fn test_modifier_errors() {
        assert!(matches!(
            parse_sample("_a-").error,
            Some(ParseError::HoldAndRelease(_))
        ));
        assert!(matches!(
            parse_sample("_a_").error,
            Some(ParseError::RepeatedModifier(_))
        ));
        assert!(matches!(
            parse_sample("#_").error,
            Some(ParseError::ModifierOnBlank(_))
        ));
        assert_eq!(parse_sample("-a").inputs[0][0].press, PressKind::Release);
    }

    #[test]
    fn test_percent_errors() {
        assert_eq!(
            parse_sample("a50%").error,
            Some(ParseError::PercentOnNonAxis("a".to_string()))
        );
        assert!(matches!(
            parse_sample("left101%").error,
            Some(ParseError::PercentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_dangling_plus() {
        for text in ["+a", "a++b", "a+", "a+ "] {
            assert_eq!(
                parse_sample(text).error,
                Some(ParseError::DanglingSimultaneous('+')),
                "{text}"
            );
        }
        assert!(parse_sample("a+ b").is_valid());
    }

    #[test]
    fn test_unmatched_words() {
        assert_eq!(
            parse_sample("a xyz").error,
            Some(ParseError::UnknownInput("xyz".to_string()))
        );
        assert_eq!(
            parse_sample("a 500ms").error,
            Some(ParseError::MissingInputName("500ms".to_string()))
        );
        assert_eq!(
            parse_sample("turbo200ms").error,
            Some(ParseError::DisabledInput("turbo".to_string()))
        );
    }

    #[test]
    fn test_duration_without_unit_is_missing_input_name() {
        assert_eq!(
            parse_sample("a200").error,
            Some(ParseError::MissingInputName("a200".to_string()))
        );
        assert_eq!(
            parse_sample("b a5").error,
            Some(ParseError::MissingInputName("a5".to_string()))
        );
    }

    #[test]
    fn test_unmatched_reports_whole_word() {
        assert_eq!(
            parse_sample("b axyz").error,
            Some(ParseError::UnknownInput("axyz".to_string()))
        );
        assert_eq!(
            parse_sample("a+bq").error,
            Some(ParseError::UnknownInput("bq".to_string()))
        );
    }

    #[test]
    fn test_duplicate_in_sub_sequence() {
        assert!(matches!(
            parse_sample("a+a").error,
            Some(ParseError::DuplicateInput { .. })
        ));
        assert!(parse_sample("a+&2a").is_valid());
    }

    #[test]
    fn test_duration_clamped() {
        let options = ParserOptions {
            max_duration: 1500,
            ..ParserOptions::default()
        };
        let sequence = parse("a5s", &sample_console(), &options).expect("grammar");
        let token = &sequence.inputs[0][0];
        assert_eq!(token.duration, 1500);
        assert_eq!(token.duration_unit, DurationUnit::Milliseconds);
    }

    #[test]
    fn test_sequence_over_cap_is_invalid() {
        let options = ParserOptions {
            max_duration: 1000,
            ..ParserOptions::default()
        };
        let sequence = parse("a800ms b800ms", &sample_console(), &options).expect("grammar");
        assert_eq!(
            sequence.error,
            Some(ParseError::SequenceTooLong {
                total: 1600,
                max: 1000
            })
        );
    }

    #[test]
    fn test_uncapped_overflow_is_invalid() {
        let options = ParserOptions {
            cap_duration: false,
            ..ParserOptions::default()
        };
        let sequence =
            parse("a99999999999999999999s", &sample_console(), &options).expect("grammar");
        assert!(matches!(sequence.error, Some(ParseError::InvalidDuration(_))));
    }

    #[test]
    fn test_normal_message() {
        assert_eq!(parse_sample("").result, ParsedInputResult::NormalMsg);
        assert_eq!(parse_sample("  , ").result, ParsedInputResult::NormalMsg);
    }

    #[test]
    fn test_parse_message_pipeline() {
        let console = sample_console();
        let macros = MacroTable::from_macros([InputMacro::new("#x", "#x")]);
        let context = ParseContext::new(&console, &macros);

        let sequence = parse_message("jump", &context).expect("grammar");
        assert_eq!(sequence.inputs[0][0].name, "a");

        let looping = parse_message("#x", &context).expect("grammar");
        assert!(matches!(
            looping.error,
            Some(ParseError::Preparse(
                PreparseError::RecursionLimitExceeded { .. }
            ))
        ));
    }
}
