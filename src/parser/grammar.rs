//! Console Grammar
//!
//! Each console compiles its input names and grammar markers into one anchored
//! pattern. The tokenizer stays console-agnostic: it only asks the grammar
//! whether a token starts at the current position.

use regex::{Regex, RegexBuilder};

use crate::console::{Console, GrammarDef};

/// A console catalog whose grammar cannot be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("Console '{0}' has no enabled inputs")]
    NoInputs(String),

    #[error("Console '{console}' uses '{marker}' for more than one grammar role")]
    MarkerClash { console: String, marker: char },

    #[error("Console '{console}' cannot use '{marker}' as a grammar marker")]
    UnusableMarker { console: String, marker: char },

    #[error("Input '{input}' of console '{console}' contains the reserved character '{marker}'")]
    ReservedCharacter {
        console: String,
        input: String,
        marker: char,
    },

    #[error("Console '{console}' produced an invalid token pattern: {reason}")]
    InvalidPattern { console: String, reason: String },
}

/// Pieces of one matched token, still as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken<'t> {
    /// Everything the token consumed
    pub text: &'t str,
    pub port: Option<&'t str>,
    pub leading_modifier: Option<char>,
    pub input: &'t str,
    pub percent: Option<&'t str>,
    pub duration: Option<&'t str>,
    pub unit: Option<&'t str>,
    pub trailing_modifier: Option<char>,
}

#[derive(Debug, Clone)]
pub struct ConsoleGrammar {
    console: String,
    markers: GrammarDef,
    token: Regex,
}

impl ConsoleGrammar {
    pub fn compile(console: &Console) -> Result<Self, GrammarError> {
        let markers = console.grammar.clone();
        check_markers(&console.name, &markers)?;

        let mut names: Vec<String> = Vec::new();
        for input in console.enabled_inputs() {
            for reserved in markers
                .sequence_delimiters
                .iter()
                .chain(std::iter::once(&markers.simultaneous_marker))
            {
                if input.name.contains(*reserved) {
                    return Err(GrammarError::ReservedCharacter {
                        console: console.name.clone(),
                        input: input.name.clone(),
                        marker: *reserved,
                    });
                }
            }
            names.push(input.name.clone());
            names.extend(console.aliases_of(&input.name).map(str::to_string));
        }

        if names.is_empty() {
            return Err(GrammarError::NoInputs(console.name.clone()));
        }

        // Longest first so "left" is tried before "l"
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let alternatives = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let modifier = format!(
            "{}|{}",
            escape_char(markers.hold_marker),
            escape_char(markers.release_marker)
        );
        let pattern = format!(
            r"^(?:{port}(?P<port>[0-9]+))?(?P<pre>{modifier})?(?P<input>{alternatives})(?:(?P<percent>[0-9]+){percent})?(?:(?P<duration>[0-9]+)(?P<unit>ms|s))?(?P<post>{modifier})?",
            port = escape_char(markers.port_marker),
            percent = escape_char(markers.percent_marker),
        );

        let token = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| GrammarError::InvalidPattern {
                console: console.name.clone(),
                reason: e.to_string(),
            })?;

        log::debug!(
            "Compiled grammar for console '{}' with {} input names",
            console.name,
            names.len()
        );

        Ok(Self {
            console: console.name.clone(),
            markers,
            token,
        })
    }

    /// Match one token at the very start of `text`
    pub fn match_token<'t>(&self, text: &'t str) -> Option<RawToken<'t>> {
        let caps = self.token.captures(text)?;
        let whole = caps.get(0)?;
        let first_char = |name: &str| caps.name(name).and_then(|m| m.as_str().chars().next());

        Some(RawToken {
            text: whole.as_str(),
            port: caps.name("port").map(|m| m.as_str()),
            leading_modifier: first_char("pre"),
            input: caps.name("input")?.as_str(),
            percent: caps.name("percent").map(|m| m.as_str()),
            duration: caps.name("duration").map(|m| m.as_str()),
            unit: caps.name("unit").map(|m| m.as_str()),
            trailing_modifier: first_char("post"),
        })
    }

    pub fn console(&self) -> &str {
        &self.console
    }

    pub fn markers(&self) -> &GrammarDef {
        &self.markers
    }

    pub fn is_delimiter(&self, c: char) -> bool {
        self.markers.sequence_delimiters.contains(&c)
    }
}

fn escape_char(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0; 4]))
}

fn check_markers(console: &str, markers: &GrammarDef) -> Result<(), GrammarError> {
    let roles = [
        markers.port_marker,
        markers.hold_marker,
        markers.release_marker,
        markers.percent_marker,
        markers.simultaneous_marker,
    ];

    for (i, marker) in roles.iter().enumerate() {
        if marker.is_alphanumeric() || marker.is_whitespace() {
            return Err(GrammarError::UnusableMarker {
                console: console.to_string(),
                marker: *marker,
            });
        }
        if roles[..i].contains(marker) || markers.sequence_delimiters.contains(marker) {
            return Err(GrammarError::MarkerClash {
                console: console.to_string(),
                marker: *marker,
            });
        }
    }

    if let Some(bad) = markers
        .sequence_delimiters
        .iter()
        .find(|c| c.is_alphanumeric())
    {
        return Err(GrammarError::UnusableMarker {
            console: console.to_string(),
            marker: *bad,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{parse_console_content, sample_console};

    #[test]
    fn test_match_full_token() {
        let console = sample_console();
        let grammar = console.grammar().expect("grammar");

        let token = grammar.match_token("&2left50%1500ms_ b").expect("token");
        assert_eq!(token.text, "&2left50%1500ms_");
        assert_eq!(token.port, Some("2"));
        assert_eq!(token.input, "left");
        assert_eq!(token.percent, Some("50"));
        assert_eq!(token.duration, Some("1500"));
        assert_eq!(token.unit, Some("ms"));
        assert_eq!(token.trailing_modifier, Some('_'));
        assert_eq!(token.leading_modifier, None);
    }

    #[test]
    fn test_longest_name_wins() {
        let console = sample_console();
        let grammar = console.grammar().expect("grammar");

        assert_eq!(grammar.match_token("left").map(|t| t.input), Some("left"));
        assert_eq!(grammar.match_token("l200ms").map(|t| t.input), Some("l"));
        assert_eq!(grammar.match_token("ab").map(|t| t.text), Some("a"));
    }

    #[test]
    fn test_case_insensitive_and_prefix_modifier() {
        let console = sample_console();
        let grammar = console.grammar().expect("grammar");

        let token = grammar.match_token("-A2S").expect("token");
        assert_eq!(token.leading_modifier, Some('-'));
        assert_eq!(token.input, "A");
        assert_eq!(token.unit, Some("S"));
    }

    #[test]
    fn test_disabled_and_unknown_do_not_match() {
        let console = sample_console();
        let grammar = console.grammar().expect("grammar");

        assert!(grammar.match_token("turbo").is_none());
        assert!(grammar.match_token("xyz").is_none());
        assert!(grammar.match_token("500ms").is_none());
    }

    #[test]
    fn test_marker_clash_is_rejected() {
        let console = parse_console_content(
            r#"
[console]
name = "clash"

[grammar]
hold_marker = "-"

[[inputs]]
name = "a"
type = "button"
"#,
            None,
        )
        .expect("console");

        assert!(matches!(
            console.grammar(),
            Err(GrammarError::MarkerClash { marker: '-', .. })
        ));
    }

    #[test]
    fn test_no_enabled_inputs() {
        let console = parse_console_content(
            r#"
[console]
name = "empty"

[[inputs]]
name = "a"
type = "button"
enabled = false
"#,
            None,
        )
        .expect("console");

        assert_eq!(
            console.grammar().err(),
            Some(GrammarError::NoInputs("empty".to_string()))
        );
    }

    #[test]
    fn test_reserved_character_in_name() {
        let console = parse_console_content(
            r#"
[console]
name = "plus"

[[inputs]]
name = "a+b"
type = "button"
"#,
            None,
        )
        .expect("console");

        assert!(matches!(
            console.grammar(),
            Err(GrammarError::ReservedCharacter { marker: '+', .. })
        ));
    }
}
