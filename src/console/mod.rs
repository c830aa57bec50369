//! Console Catalogs
//!
//! Data-driven console definitions: input catalogs, invalid combos, synonyms
//! and grammar markers, loaded from TOML and published as immutable snapshots.

pub mod manager;
pub mod registry;
pub mod schema;

pub use manager::ConsoleManager;
pub use registry::{parse_console_content, ConsolePriority, ConsoleRegistry, LoadedConsole};
pub use schema::{
    Console, ConsoleFile, ConsoleMeta, GrammarDef, InputDef, InputKind, InvalidCombo,
    ModifierPosition,
};

#[cfg(test)]
pub(crate) const SAMPLE_CONSOLE: &str = r##"
[console]
name = "testpad"

[[inputs]]
name = "a"
type = "button"

[[inputs]]
name = "b"
type = "button"

[[inputs]]
name = "c"
type = "button"

[[inputs]]
name = "l"
type = "button"

[[inputs]]
name = "start"
type = "button"
level = 2

[[inputs]]
name = "turbo"
type = "button"
enabled = false

[[inputs]]
name = "left"
type = "axis"
min_axis = 0.0
max_axis = -1.0

[[inputs]]
name = "right"
type = "axis"
default_percent = 80

[[inputs]]
name = "blank"
type = "blank"
aliases = ["r", ".", "#"]

[[invalid_combos]]
inputs = ["a", "b"]

[[synonyms]]
name = "jump"
value = "a"
"##;

#[cfg(test)]
pub(crate) fn sample_console() -> Console {
    match parse_console_content(SAMPLE_CONSOLE, None) {
        Ok(console) => console,
        Err(e) => panic!("sample console must parse: {e:#}"),
    }
}
