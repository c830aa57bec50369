//! Console Registry
//!
//! In-memory catalog of loaded consoles. The manager builds a fresh registry on
//! every (re)load and publishes it as an immutable snapshot.

use super::schema::{Console, ConsoleFile};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loading priority of a console definition; higher wins on name clashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConsolePriority {
    BuiltIn = 0,
    UserGlobal = 1,
    Workspace = 2,
    Custom = 3,
}

/// A loaded console with its source and priority
#[derive(Debug, Clone)]
pub struct LoadedConsole {
    pub console: Arc<Console>,
    pub priority: ConsolePriority,
    pub source_path: Option<PathBuf>,
}

const EMBEDDED_CONSOLES: &[(&str, &str)] = &[
    (
        "snes",
        include_str!("../../resources/consoles/snes.console.toml"),
    ),
    ("n64", include_str!("../../resources/consoles/n64.console.toml")),
];

#[derive(Debug, Clone)]
pub struct ConsoleRegistry {
    consoles: HashMap<String, LoadedConsole>,
    active_console: Option<String>,
}

impl Default for ConsoleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRegistry {
    pub fn new() -> Self {
        Self {
            consoles: HashMap::new(),
            active_console: None,
        }
    }

    /// Add a console as a built-in definition, replacing any console of the same name
    pub fn add_console(&mut self, console: Console) {
        let key = console.name.to_lowercase();
        self.consoles.insert(
            key,
            LoadedConsole {
                console: Arc::new(console),
                priority: ConsolePriority::BuiltIn,
                source_path: None,
            },
        );
    }

    /// Add a loaded console unless a higher priority definition already owns the name
    pub fn add_loaded(&mut self, loaded: LoadedConsole) -> bool {
        let key = loaded.console.name.to_lowercase();
        let should_load = match self.consoles.get(&key) {
            Some(existing) => loaded.priority >= existing.priority,
            None => true,
        };

        if should_load {
            self.consoles.insert(key, loaded);
        }
        should_load
    }

    /// Set the active console
    pub fn set_active_console(&mut self, name: &str) -> bool {
        let key = name.to_lowercase();
        if self.consoles.contains_key(&key) {
            self.active_console = Some(key);
            true
        } else {
            false
        }
    }

    /// Get the currently active console
    pub fn get_active_console(&self) -> Option<&Arc<Console>> {
        self.active_console
            .as_ref()
            .and_then(|name| self.consoles.get(name))
            .map(|loaded| &loaded.console)
    }

    pub fn get_console(&self, name: &str) -> Option<&Arc<Console>> {
        self.get_loaded(name).map(|loaded| &loaded.console)
    }

    pub fn get_loaded(&self, name: &str) -> Option<&LoadedConsole> {
        self.consoles.get(&name.to_lowercase())
    }

    /// List all available consoles, sorted by name
    pub fn list_consoles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.consoles.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.consoles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consoles.is_empty()
    }

    /// Add the consoles shipped inside the binary
    pub fn add_embedded_consoles(&mut self) {
        for (name, content) in EMBEDDED_CONSOLES {
            match parse_console_content(content, None) {
                Ok(console) => self.add_console(console),
                Err(e) => {
                    log::warn!("Failed to parse embedded console '{}': {:#}", name, e);
                }
            }
        }
    }
}

/// Parse a console definition from TOML, logging definitions that look wrong
pub fn parse_console_content(content: &str, source_path: Option<&Path>) -> Result<Console> {
    let file: ConsoleFile = toml::from_str(content).with_context(|| match source_path {
        Some(path) => format!("Failed to parse console TOML: {}", path.display()),
        None => "Failed to parse built-in console TOML".to_string(),
    })?;

    for problem in file.validate() {
        log::warn!("Console '{}': {}", file.console.name, problem);
    }

    Ok(Console::from(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[console]
name = "Mini"

[[inputs]]
name = "a"
type = "button"
"#;

    #[test]
    fn test_registry_creation() {
        let registry = ConsoleRegistry::new();
        assert!(registry.list_consoles().is_empty());
        assert!(registry.get_active_console().is_none());
    }

    #[test]
    fn test_add_and_activate_console() {
        let mut registry = ConsoleRegistry::new();
        let console = parse_console_content(MINIMAL, None).expect("minimal console");

        registry.add_console(console);
        assert!(registry.set_active_console("MINI"));
        assert_eq!(
            registry.get_active_console().map(|c| c.name.as_str()),
            Some("Mini")
        );
    }

    #[test]
    fn test_priority_override() {
        let mut registry = ConsoleRegistry::new();
        let console = Arc::new(parse_console_content(MINIMAL, None).expect("minimal console"));

        assert!(registry.add_loaded(LoadedConsole {
            console: console.clone(),
            priority: ConsolePriority::Workspace,
            source_path: Some(PathBuf::from("workspace/mini.toml")),
        }));
        assert!(!registry.add_loaded(LoadedConsole {
            console,
            priority: ConsolePriority::UserGlobal,
            source_path: Some(PathBuf::from("global/mini.toml")),
        }));

        let loaded = registry.get_loaded("mini").expect("mini loaded");
        assert_eq!(loaded.priority, ConsolePriority::Workspace);
    }

    #[test]
    fn test_embedded_consoles() {
        let mut registry = ConsoleRegistry::new();
        registry.add_embedded_consoles();

        assert_eq!(registry.list_consoles(), vec!["n64", "snes"]);
        let snes = registry.get_console("snes").expect("snes embedded");
        assert!(snes.is_blank("#"));
        assert!(snes.input("start").is_some());
        assert!(snes.grammar().is_ok());
    }

    #[test]
    fn test_nonexistent_console() {
        let mut registry = ConsoleRegistry::new();
        assert!(!registry.set_active_console("nonexistent"));
        assert!(registry.get_console("nonexistent").is_none());
    }

    #[test]
    fn test_parse_error_mentions_path() {
        let err = parse_console_content("not = [valid", Some(Path::new("bad.toml")))
            .expect_err("should fail");
        assert!(format!("{:#}", err).contains("bad.toml"));
    }
}
