//! Input Preprocessing
//!
//! Text transformations applied before tokenizing: macro expansion, then
//! synonym substitution, then `[..]*N` repetition.

pub mod expand;
pub mod macros;
pub mod synonyms;

pub use expand::expand_repetitions;
pub use macros::{expand_macros, DynamicArgs, InputMacro, MacroSource, MacroTable};
pub use synonyms::{apply_synonyms, InputSynonym};

pub const DEFAULT_MAX_MACRO_DEPTH: usize = 10;
pub const DEFAULT_MAX_EXPANDED_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreparseError {
    #[error("Macro \"{name}\" nests more than {limit} levels deep")]
    RecursionLimitExceeded { name: String, limit: usize },

    #[error("Expanded input is longer than {limit} characters")]
    ExpansionTooLong { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparseOptions {
    pub max_macro_depth: usize,
    pub dynamic_args: DynamicArgs,
    pub max_expanded_len: usize,
}

impl Default for PreparseOptions {
    fn default() -> Self {
        Self {
            max_macro_depth: DEFAULT_MAX_MACRO_DEPTH,
            dynamic_args: DynamicArgs::Fill,
            max_expanded_len: DEFAULT_MAX_EXPANDED_LEN,
        }
    }
}

/// Run the whole preprocessing pipeline on a chat message
pub fn prepare(
    text: &str,
    macros: &dyn MacroSource,
    synonyms: &[InputSynonym],
    options: &PreparseOptions,
) -> Result<String, PreparseError> {
    let expanded = expand_macros(text, macros, options)?;
    let substituted = apply_synonyms(&expanded, synonyms);
    expand_repetitions(&substituted, options.max_expanded_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order() {
        let macros = MacroTable::from_macros([InputMacro::new("#mash(*)", "[<0> wait]*2")]);
        let synonyms = vec![InputSynonym::new("wait", "#")];

        let prepared =
            prepare("#mash(a)", &macros, &synonyms, &PreparseOptions::default()).expect("ok");
        assert_eq!(prepared, "a #a #");
    }

    #[test]
    fn test_prepare_is_idempotent_on_expanded_text() {
        let macros = MacroTable::from_macros([InputMacro::new("#jump", "a500ms")]);
        let options = PreparseOptions::default();

        let once = prepare("#jump b", &macros, &[], &options).expect("ok");
        let twice = prepare(&once, &macros, &[], &options).expect("ok");
        assert_eq!(once, twice);
    }
}
