//! Synonym Preprocessor
//!
//! Replaces console-scoped synonyms with their values in one pass. The
//! longest synonym wins at each position and replaced text is never rescanned,
//! so a synonym whose value contains another synonym's name cannot loop.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSynonym {
    pub name: String,
    pub value: String,
}

impl InputSynonym {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Substitute whole-word synonym occurrences, case-insensitively
pub fn apply_synonyms(text: &str, synonyms: &[InputSynonym]) -> String {
    if synonyms.is_empty() || text.is_empty() {
        return text.to_string();
    }

    let mut ordered: Vec<&InputSynonym> = synonyms.iter().filter(|s| !s.name.is_empty()).collect();
    ordered.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let found = ordered
            .iter()
            .find(|synonym| matches_word_at(rest, prev, &synonym.name));

        match found {
            Some(synonym) => {
                out.push_str(&synonym.value);
                pos += synonym.name.len();
                prev = synonym.name.chars().last();
            }
            None => {
                let Some(c) = rest.chars().next() else {
                    break;
                };
                out.push(c);
                pos += c.len_utf8();
                prev = Some(c);
            }
        }
    }

    out
}

/// True when `name` starts `rest` without splitting a run of letters
fn matches_word_at(rest: &str, prev: Option<char>, name: &str) -> bool {
    if rest.len() < name.len()
        || !rest.is_char_boundary(name.len())
        || !rest[..name.len()].eq_ignore_ascii_case(name)
    {
        return false;
    }

    let starts_alpha = name.chars().next().is_some_and(char::is_alphabetic);
    let ends_alpha = name.chars().last().is_some_and(char::is_alphabetic);
    let next = rest[name.len()..].chars().next();

    let joined_before = starts_alpha && prev.is_some_and(char::is_alphabetic);
    let joined_after = ends_alpha && next.is_some_and(char::is_alphabetic);
    !joined_before && !joined_after
}
