//! Macro Preprocessor
//!
//! Expands `#name` and `#name(arg, ...)` references into input text before
//! parsing. Macros are read from an immutable [`MacroSource`] snapshot; the
//! preprocessor never mutates it.
//!
//! Normal macros match by longest prefix, so `#testa` expands `#test` when
//! only `#test` exists and leaves `a` in place. Dynamic macros are stored
//! under their generic form (`#mash(*,*)`) and substitute `<0>`, `<1>`, ...
//! with the call's arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::{PreparseError, PreparseOptions};

pub const MACRO_START: char = '#';

/// A named piece of input text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMacro {
    pub name: String,
    pub value: String,
}

impl InputMacro {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Number of arguments of a dynamic macro, `None` for normal macros
    pub fn arity(&self) -> Option<usize> {
        generic_arity(&self.name)
    }

    pub fn is_dynamic(&self) -> bool {
        self.arity().is_some()
    }
}

/// What to do with the arguments of a dynamic macro call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DynamicArgs {
    /// Expand each argument, then replace `<i>` placeholders
    #[default]
    Fill,
    /// Leave placeholders and arguments untouched
    Keep,
}

/// Read-only macro lookup
pub trait MacroSource {
    /// Exact lookup, case-insensitive
    fn get(&self, name: &str) -> Option<&InputMacro>;

    /// Longest normal macro whose name prefixes `text`, with the matched length in bytes
    fn longest_prefix(&self, text: &str) -> Option<(usize, &InputMacro)>;
}

/// TOML macro file (`[[macros]]` entries)
#[derive(Debug, Clone, Deserialize)]
pub struct MacroFile {
    #[serde(default)]
    pub macros: Vec<InputMacro>,
}

/// In-memory macro snapshot keyed by lowercase name
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: BTreeMap<String, InputMacro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_macros(macros: impl IntoIterator<Item = InputMacro>) -> Self {
        let mut table = Self::new();
        for input_macro in macros {
            table.insert(input_macro);
        }
        table
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: MacroFile = toml::from_str(content).context("Failed to parse macro TOML")?;
        let mut table = Self::new();
        for input_macro in file.macros {
            if let Err(problem) = Self::validate_definition(&input_macro.name, &input_macro.value) {
                log::warn!("Skipping macro '{}': {}", input_macro.name, problem);
                continue;
            }
            table.insert(input_macro);
        }
        Ok(table)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read macro file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid macro file: {}", path.display()))
    }

    pub fn insert(&mut self, input_macro: InputMacro) -> Option<InputMacro> {
        self.macros
            .insert(input_macro.name.to_lowercase(), input_macro)
    }

    pub fn remove(&mut self, name: &str) -> Option<InputMacro> {
        self.macros.remove(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputMacro> {
        self.macros.values()
    }

    /// Check a macro definition before it is stored
    pub fn validate_definition(name: &str, value: &str) -> Result<(), String> {
        let Some(bare) = name.strip_prefix(MACRO_START) else {
            return Err(format!("Macro names must start with '{}'", MACRO_START));
        };
        if bare.is_empty() {
            return Err("Macro name is empty".to_string());
        }
        if value.trim().is_empty() {
            return Err("Macro value is empty".to_string());
        }

        let head = bare.split('(').next().unwrap_or(bare);
        if head.is_empty()
            || head
                .chars()
                .any(|c| c.is_whitespace() || c == MACRO_START || c == ')' || c == ',')
        {
            return Err(format!("Macro name '{}' contains invalid characters", name));
        }

        let placeholders = placeholder_indices(value);
        match generic_arity(name) {
            Some(arity) => {
                if let Some(bad) = placeholders.iter().find(|&&i| i >= arity) {
                    return Err(format!(
                        "Placeholder <{}> is out of range for a macro with {} argument(s)",
                        bad, arity
                    ));
                }
                if placeholders.is_empty() {
                    return Err(format!(
                        "Dynamic macro '{}' never uses its arguments",
                        name
                    ));
                }
            }
            None => {
                if bare.contains('(') {
                    return Err(format!(
                        "Dynamic macro '{}' must declare its arguments as '*', e.g. {}(*,*)",
                        name, head
                    ));
                }
            }
        }

        Ok(())
    }
}

impl MacroSource for MacroTable {
    fn get(&self, name: &str) -> Option<&InputMacro> {
        self.macros
            .get(name)
            .or_else(|| self.macros.get(&name.to_lowercase()))
    }

    fn longest_prefix(&self, text: &str) -> Option<(usize, &InputMacro)> {
        let lower = text.to_lowercase();
        if lower.len() != text.len() {
            // Lowercasing changed byte offsets; fall back to a scan
            return self
                .macros
                .values()
                .filter(|m| !m.is_dynamic() && starts_with_ignore_case(text, &m.name))
                .max_by_key(|m| m.name.len())
                .map(|m| (m.name.len(), m));
        }

        (2..=lower.len())
            .rev()
            .filter(|&end| lower.is_char_boundary(end))
            .find_map(|end| {
                self.macros
                    .get(&lower[..end])
                    .filter(|m| !m.is_dynamic())
                    .map(|m| (end, m))
            })
    }
}

/// Expand every macro reference in `text`
pub fn expand_macros(
    text: &str,
    macros: &dyn MacroSource,
    options: &PreparseOptions,
) -> Result<String, PreparseError> {
    let expanded = expand_at_depth(text, macros, options, 0)?;
    if expanded != text {
        log::debug!("Expanded macros: '{}' -> '{}'", text, expanded);
    }
    Ok(expanded)
}

fn expand_at_depth(
    text: &str,
    macros: &dyn MacroSource,
    options: &PreparseOptions,
    depth: usize,
) -> Result<String, PreparseError> {
    if !text.contains(MACRO_START) {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find(MACRO_START) {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx..];

        let Some(reference) = find_reference(candidate, macros) else {
            out.push(MACRO_START);
            rest = &candidate[MACRO_START.len_utf8()..];
            continue;
        };

        if depth >= options.max_macro_depth {
            return Err(PreparseError::RecursionLimitExceeded {
                name: reference.input_macro.name.clone(),
                limit: options.max_macro_depth,
            });
        }

        let body = match (options.dynamic_args, reference.args.is_empty()) {
            (DynamicArgs::Fill, false) => {
                let mut filled_args = Vec::with_capacity(reference.args.len());
                for arg in &reference.args {
                    filled_args.push(expand_at_depth(arg.trim(), macros, options, depth + 1)?);
                }
                fill_placeholders(&reference.input_macro.value, &filled_args)
            }
            _ => reference.input_macro.value.clone(),
        };

        let expanded = expand_at_depth(&body, macros, options, depth + 1)?;
        out.push_str(&expanded);
        if out.len() > options.max_expanded_len {
            return Err(PreparseError::ExpansionTooLong {
                limit: options.max_expanded_len,
            });
        }
        rest = &candidate[reference.consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

struct Reference<'a, 't> {
    input_macro: &'a InputMacro,
    args: Vec<&'t str>,
    consumed: usize,
}

/// Resolve the reference at the start of `candidate`, which begins with `#`
fn find_reference<'a, 't>(candidate: &'t str, macros: &'a dyn MacroSource) -> Option<Reference<'a, 't>> {
    let name_end = candidate[MACRO_START.len_utf8()..]
        .find(|c: char| c == MACRO_START || c == '(' || c.is_whitespace())
        .map(|i| i + MACRO_START.len_utf8())
        .unwrap_or(candidate.len());
    if name_end <= MACRO_START.len_utf8() {
        return None;
    }
    let name = &candidate[..name_end];

    if candidate[name_end..].starts_with('(') {
        if let Some(close) = matching_paren(&candidate[name_end..]) {
            let inner = &candidate[name_end + 1..name_end + close];
            let args = split_args(inner);
            let generic = format!("{}({})", name, vec!["*"; args.len()].join(","));
            if let Some(input_macro) = macros.get(&generic) {
                return Some(Reference {
                    input_macro,
                    args,
                    consumed: name_end + close + 1,
                });
            }
        }
        // No generic of that arity, or an unclosed list: the parentheses stay literal
    }

    macros
        .longest_prefix(name)
        .map(|(consumed, input_macro)| Reference {
            input_macro,
            args: Vec::new(),
            consumed,
        })
}

/// Offset of the `)` closing the `(` at the start of `text`
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on top-level commas
fn split_args(inner: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&inner[start..]);
    args
}

/// Replace `<i>` with the i-th argument in a single pass
fn fill_placeholders(value: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let index = after[..digits].parse::<usize>().ok();

        match index {
            Some(i) if after[digits..].starts_with('>') && i < args.len() => {
                out.push_str(&args[i]);
                rest = &after[digits + 1..];
            }
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn placeholder_indices(value: &str) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && after[digits..].starts_with('>') {
            if let Ok(i) = after[..digits].parse() {
                indices.push(i);
            }
        }
        rest = after;
    }
    indices
}

/// `#mash(*,*)` -> 2
fn generic_arity(name: &str) -> Option<usize> {
    let open = name.find('(')?;
    let inner = name[open + 1..].strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.iter().all(|p| *p == "*") {
        Some(parts.len())
    } else {
        None
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].to_lowercase() == prefix.to_lowercase()
}
