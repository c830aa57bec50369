//! Console Schema Types
//!
//! Catalog definitions for one console: which inputs exist, how each input is
//! classified, which combinations are forbidden and which markers its grammar
//! uses. File types mirror the TOML layout; `Console` is the runtime form
//! optimised for lookups.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use crate::parser::grammar::{ConsoleGrammar, GrammarError};
use crate::preparse::InputSynonym;

/// Root console file structure (matches TOML)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConsoleFile {
    pub console: ConsoleMeta,
    #[serde(default)]
    pub grammar: GrammarDef,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    #[serde(default)]
    pub invalid_combos: Vec<InvalidCombo>,
    #[serde(default)]
    pub synonyms: Vec<InputSynonym>,
}

/// Console metadata
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConsoleMeta {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// How an input behaves on the virtual controller
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Button,
    Axis,
    /// A wait: occupies time without touching the controller
    Blank,
}

/// Input definition
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InputDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Minimum user level required to use the input
    #[serde(default)]
    pub level: i64,
    pub aliases: Option<Vec<String>>,
    #[serde(default = "default_min_axis")]
    pub min_axis: f64,
    #[serde(default = "default_max_axis")]
    pub max_axis: f64,
    #[serde(default = "default_percent")]
    pub default_percent: u8,
    pub description: Option<String>,
}

/// Inputs that must never be pressed together on one controller
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InvalidCombo {
    pub inputs: Vec<String>,
}

/// Where the reverse parser writes hold/release markers
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModifierPosition {
    Prefix,
    #[default]
    Suffix,
}

/// Grammar markers for a console
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GrammarDef {
    pub port_marker: char,
    pub hold_marker: char,
    pub release_marker: char,
    pub percent_marker: char,
    pub simultaneous_marker: char,
    pub sequence_delimiters: Vec<char>,
    pub modifier_position: ModifierPosition,
}

impl Default for GrammarDef {
    fn default() -> Self {
        Self {
            port_marker: '&',
            hold_marker: '_',
            release_marker: '-',
            percent_marker: '%',
            simultaneous_marker: '+',
            sequence_delimiters: vec![' ', ',', '\t', '\n', '\r'],
            modifier_position: ModifierPosition::Suffix,
        }
    }
}

impl GrammarDef {
    /// Delimiter written between sub-sequences
    pub fn preferred_delimiter(&self) -> char {
        self.sequence_delimiters.first().copied().unwrap_or(' ')
    }
}

fn default_enabled() -> bool {
    true
}

fn default_min_axis() -> f64 {
    -1.0
}

fn default_max_axis() -> f64 {
    1.0
}

fn default_percent() -> u8 {
    100
}

/// Runtime console (optimized for lookups)
#[derive(Debug, Clone)]
pub struct Console {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub grammar: GrammarDef,
    pub invalid_combos: Vec<InvalidCombo>,
    pub synonyms: Vec<InputSynonym>,
    /// Keyed by lowercase input name
    inputs: HashMap<String, InputDef>,
    /// Lowercase alias to lowercase input name
    aliases: HashMap<String, String>,
    compiled: OnceLock<Result<Arc<ConsoleGrammar>, GrammarError>>,
}

impl From<ConsoleFile> for Console {
    fn from(file: ConsoleFile) -> Self {
        let mut inputs = HashMap::new();
        let mut aliases = HashMap::new();

        for mut input in file.inputs {
            input.name = input.name.to_lowercase();
            if let Some(list) = &input.aliases {
                for alias in list {
                    aliases.insert(alias.to_lowercase(), input.name.clone());
                }
            }
            inputs.insert(input.name.clone(), input);
        }

        let invalid_combos = file
            .invalid_combos
            .into_iter()
            .map(|combo| InvalidCombo {
                inputs: combo.inputs.iter().map(|name| name.to_lowercase()).collect(),
            })
            .collect();

        Self {
            name: file.console.name,
            version: file.console.version,
            description: file.console.description,
            grammar: file.grammar,
            invalid_combos,
            synonyms: file.synonyms,
            inputs,
            aliases,
            compiled: OnceLock::new(),
        }
    }
}

impl ConsoleFile {
    /// Check the file for definitions that would never behave as written
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for input in &self.inputs {
            let name = input.name.to_lowercase();
            if name.is_empty() {
                problems.push("Input with an empty name".to_string());
                continue;
            }
            if !seen.insert(name.clone()) {
                problems.push(format!("Input '{}' is defined more than once", input.name));
            }
            if input.default_percent > 100 {
                problems.push(format!(
                    "Input '{}' default percent {} exceeds 100",
                    input.name, input.default_percent
                ));
            }
            if input.kind == InputKind::Axis && input.min_axis == input.max_axis {
                problems.push(format!("Axis '{}' has an empty range", input.name));
            }
        }

        for input in &self.inputs {
            for alias in input.aliases.iter().flatten() {
                if seen.contains(&alias.to_lowercase()) {
                    problems.push(format!(
                        "Alias '{}' of input '{}' shadows another input",
                        alias, input.name
                    ));
                }
            }
        }

        for combo in &self.invalid_combos {
            if combo.inputs.len() < 2 {
                problems.push(format!(
                    "Invalid combo {:?} needs at least two inputs",
                    combo.inputs
                ));
            }
            for name in &combo.inputs {
                if !seen.contains(&name.to_lowercase()) {
                    problems.push(format!("Invalid combo references unknown input '{}'", name));
                }
            }
        }

        problems
    }
}

impl Console {
    /// Look up an input by its canonical name
    pub fn input(&self, name: &str) -> Option<&InputDef> {
        match self.inputs.get(name) {
            Some(input) => Some(input),
            None => self.inputs.get(&name.to_lowercase()),
        }
    }

    /// Look up an input by name or alias
    pub fn resolve(&self, name: &str) -> Option<&InputDef> {
        let lower = name.to_lowercase();
        self.inputs.get(&lower).or_else(|| {
            self.aliases
                .get(&lower)
                .and_then(|canonical| self.inputs.get(canonical))
        })
    }

    /// All inputs, enabled or not
    pub fn inputs(&self) -> impl Iterator<Item = &InputDef> {
        self.inputs.values()
    }

    /// Enabled inputs sorted by name
    pub fn enabled_inputs(&self) -> Vec<&InputDef> {
        let mut inputs: Vec<&InputDef> = self.inputs.values().filter(|i| i.enabled).collect();
        inputs.sort_by(|a, b| a.name.cmp(&b.name));
        inputs
    }

    /// Aliases that point at the given input
    pub fn aliases_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.aliases
            .iter()
            .filter(move |(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.as_str())
    }

    pub fn is_blank(&self, name: &str) -> bool {
        self.input(name)
            .map(|input| input.kind == InputKind::Blank)
            .unwrap_or(false)
    }

    pub fn is_axis(&self, name: &str) -> bool {
        self.input(name)
            .map(|input| input.kind == InputKind::Axis)
            .unwrap_or(false)
    }

    /// Map a press percentage onto the axis range of an input
    pub fn axis_value(&self, name: &str, percent: u8) -> Option<f64> {
        let input = self.input(name).filter(|i| i.kind == InputKind::Axis)?;
        let fraction = f64::from(percent.min(100)) / 100.0;
        Some(input.min_axis + (input.max_axis - input.min_axis) * fraction)
    }

    /// The compiled token grammar, built on first use
    pub fn grammar(&self) -> Result<&ConsoleGrammar, GrammarError> {
        self.compiled
            .get_or_init(|| ConsoleGrammar::compile(self).map(Arc::new))
            .as_ref()
            .map(|grammar| grammar.as_ref())
            .map_err(Clone::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(name: &str) -> InputDef {
        InputDef {
            name: name.to_string(),
            kind: InputKind::Button,
            enabled: true,
            level: 0,
            aliases: None,
            min_axis: -1.0,
            max_axis: 1.0,
            default_percent: 100,
            description: None,
        }
    }

    #[test]
    fn test_console_from_file() {
        let mut blank = button(".");
        blank.kind = InputKind::Blank;
        blank.aliases = Some(vec!["Wait".to_string()]);

        let file = ConsoleFile {
            console: ConsoleMeta {
                name: "test".to_string(),
                version: Some("1.0".to_string()),
                description: None,
            },
            grammar: GrammarDef::default(),
            inputs: vec![button("A"), blank],
            invalid_combos: vec![InvalidCombo {
                inputs: vec!["A".to_string(), ".".to_string()],
            }],
            synonyms: vec![],
        };

        let console = Console::from(file);
        assert_eq!(console.name, "test");
        assert!(console.input("a").is_some());
        assert_eq!(console.resolve("WAIT").map(|i| i.name.as_str()), Some("."));
        assert!(console.is_blank("."));
        assert!(!console.is_axis("a"));
        assert_eq!(console.invalid_combos[0].inputs, vec!["a", "."]);
    }

    #[test]
    fn test_axis_value() {
        let mut left = button("left");
        left.kind = InputKind::Axis;
        left.min_axis = 0.0;
        left.max_axis = -1.0;

        let file = ConsoleFile {
            console: ConsoleMeta {
                name: "axes".to_string(),
                version: None,
                description: None,
            },
            grammar: GrammarDef::default(),
            inputs: vec![left, button("a")],
            invalid_combos: vec![],
            synonyms: vec![],
        };
        let console = Console::from(file);

        assert_eq!(console.axis_value("left", 50), Some(-0.5));
        assert_eq!(console.axis_value("left", 100), Some(-1.0));
        assert_eq!(console.axis_value("a", 50), None);
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut axis = button("stick");
        axis.kind = InputKind::Axis;
        axis.min_axis = 0.0;
        axis.max_axis = 0.0;
        let mut shadow = button("b");
        shadow.aliases = Some(vec!["a".to_string()]);

        let file = ConsoleFile {
            console: ConsoleMeta {
                name: "broken".to_string(),
                version: None,
                description: None,
            },
            grammar: GrammarDef::default(),
            inputs: vec![button("a"), button("A"), axis, shadow],
            invalid_combos: vec![InvalidCombo {
                inputs: vec!["a".to_string(), "missing".to_string()],
            }],
            synonyms: vec![],
        };

        let problems = file.validate();
        assert!(problems.iter().any(|p| p.contains("more than once")));
        assert!(problems.iter().any(|p| p.contains("empty range")));
        assert!(problems.iter().any(|p| p.contains("shadows")));
        assert!(problems.iter().any(|p| p.contains("unknown input 'missing'")));
    }

    #[test]
    fn test_grammar_markers_default() {
        let grammar: GrammarDef = toml::from_str("hold_marker = \"^\"").expect("grammar");
        assert_eq!(grammar.hold_marker, '^');
        assert_eq!(grammar.release_marker, '-');
        assert_eq!(grammar.modifier_position, ModifierPosition::Suffix);
    }
}
