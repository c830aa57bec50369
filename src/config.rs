//! Configuration management for the crowd-input CLI.
//!
//! Handles:
//! - Command-line argument parsing
//! - Console directory configuration
//! - Parser and reverse parser options derived from the arguments

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::console::ConsolePriority;
use crate::parser::{ParserOptions, DEFAULT_DURATION_MS, DEFAULT_MAX_DURATION_MS};
use crate::reverse::{ReverseParserOptions, ShowDurationTypes, ShowPortTypes};

pub const MIN_CONTROLLERS: u32 = 1;
pub const MAX_CONTROLLERS: u32 = 16;
pub const DEFAULT_MAX_PAUSE_DURATION_MS: i64 = 500;

/// How parsed sequences are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact input syntax
    #[default]
    Text,
    /// English sentence
    Natural,
    /// The parsed sequence as JSON
    Json,
}

/// Command-line arguments for crowd-input
#[derive(Debug, Parser)]
#[command(name = "crowd-input")]
#[command(about = "Parse, validate and reverse parse crowd-sourced controller input")]
#[command(version)]
pub struct Args {
    /// Input text; read from stdin when absent
    pub text: Vec<String>,

    /// Console whose inputs and grammar are used
    #[arg(long, default_value = "snes", help = "Console to parse for (e.g., 'snes', 'n64')")]
    pub console: String,

    /// Custom console directory, loaded with the highest priority
    #[arg(long, help = "Directory containing console TOML files")]
    pub console_dir: Option<PathBuf>,

    /// Macro definitions file
    #[arg(long, help = "TOML file with [[macros]] name/value entries")]
    pub macros: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Default controller port, 1-based
    #[arg(long, default_value_t = 1)]
    pub port: u32,

    /// Default duration in milliseconds
    #[arg(long, default_value_t = DEFAULT_DURATION_MS)]
    pub duration: u64,

    /// Maximum duration in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_DURATION_MS)]
    pub max_duration: u64,

    /// Do not clamp durations or reject long sequences
    #[arg(long)]
    pub no_cap: bool,

    /// Always print controller ports in text output
    #[arg(long)]
    pub show_ports: bool,

    /// Number of connected controllers
    #[arg(long, default_value_t = 1)]
    pub controllers: u32,

    /// Permission level of the sender
    #[arg(long, default_value_t = 0)]
    pub level: i64,

    /// Input whose hold time is limited, usually the console's start button
    #[arg(long)]
    pub pause_input: Option<String>,

    /// Longest time in milliseconds the pause input may stay down; negative disables
    #[arg(long, default_value_t = DEFAULT_MAX_PAUSE_DURATION_MS, allow_negative_numbers = true)]
    pub max_pause_duration: i64,

    /// Read one input sequence per line and reload consoles on change
    #[arg(long, short)]
    pub interactive: bool,

    /// Print a random input exercise instead of parsing
    #[arg(long)]
    pub exercise: bool,

    /// Seed for the exercise generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    /// Console requested on the command line
    pub console: String,
    /// Console directories with the priority of the files they hold
    pub console_dirs: Vec<(PathBuf, ConsolePriority)>,
    pub macros_path: Option<PathBuf>,
    /// Input text given as arguments
    pub text: Option<String>,
    pub format: OutputFormat,
    pub parser: ParserOptions,
    pub reverse: ReverseParserOptions,
    pub controller_count: u32,
    pub user_level: i64,
    pub pause_input: Option<String>,
    pub max_pause_duration: i64,
    pub interactive: bool,
    pub exercise: bool,
    pub seed: Option<u64>,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        if !(MIN_CONTROLLERS..=MAX_CONTROLLERS).contains(&args.controllers) {
            bail!(
                "Controller count must be between {} and {}, got {}",
                MIN_CONTROLLERS,
                MAX_CONTROLLERS,
                args.controllers
            );
        }
        if args.port == 0 || args.port > args.controllers {
            bail!(
                "Default port must be between 1 and {}, got {}",
                args.controllers,
                args.port
            );
        }
        if !args.no_cap && args.duration > args.max_duration {
            bail!(
                "Default duration {} ms exceeds the maximum of {} ms",
                args.duration,
                args.max_duration
            );
        }

        let parser = ParserOptions {
            default_port: args.port - 1,
            default_duration: args.duration,
            cap_duration: !args.no_cap,
            max_duration: args.max_duration,
            ..ParserOptions::default()
        };

        let mut reverse = ReverseParserOptions::matching(&parser);
        if args.show_ports {
            reverse.show_ports = ShowPortTypes::ShowAllPorts;
            reverse.show_durations = ShowDurationTypes::ShowAllDurations;
        }

        let mut console_dirs = default_console_dirs();
        if let Some(custom_dir) = args.console_dir {
            console_dirs.push((custom_dir, ConsolePriority::Custom));
        }

        let text = (!args.text.is_empty()).then(|| args.text.join(" "));

        Ok(Config {
            console: args.console,
            console_dirs,
            macros_path: args.macros,
            text,
            format: args.format,
            parser,
            reverse,
            controller_count: args.controllers,
            user_level: args.level,
            pause_input: args.pause_input,
            max_pause_duration: args.max_pause_duration,
            interactive: args.interactive,
            exercise: args.exercise,
            seed: args.seed,
            log_level: args.log_level,
        })
    }
}

/// The standard console directories: user global then workspace
pub fn default_console_dirs() -> Vec<(PathBuf, ConsolePriority)> {
    let mut dirs = Vec::new();

    // ~/.config/crowd-input/consoles/
    if let Some(config_dir) = dirs::config_dir() {
        dirs.push((
            config_dir.join("crowd-input").join("consoles"),
            ConsolePriority::UserGlobal,
        ));
    }

    // ./.crowd-input/consoles/
    if let Ok(current) = std::env::current_dir() {
        dirs.push((
            current.join(".crowd-input").join("consoles"),
            ConsolePriority::Workspace,
        ));
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Result<Config> {
        let argv = std::iter::once("crowd-input").chain(args.iter().copied());
        Config::from_args(Args::parse_from(argv))
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).expect("config");
        assert_eq!(config.console, "snes");
        assert_eq!(config.parser, ParserOptions::default());
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(config.text, None);
        assert_eq!(config.reverse.show_ports, ShowPortTypes::ShowNonDefaultPorts);
    }

    #[test]
    fn test_text_and_ports() {
        let config = config(&["--controllers", "4", "--port", "2", "a", "b500ms"]).expect("config");
        assert_eq!(config.text.as_deref(), Some("a b500ms"));
        assert_eq!(config.parser.default_port, 1);
        assert_eq!(config.reverse.default_port, 1);
    }

    #[test]
    fn test_custom_dir_has_highest_priority() {
        let config = config(&["--console-dir", "/tmp/consoles"]).expect("config");
        let (path, priority) = config.console_dirs.last().expect("custom dir");
        assert_eq!(path, &PathBuf::from("/tmp/consoles"));
        assert_eq!(*priority, ConsolePriority::Custom);
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(config(&["--controllers", "0"]).is_err());
        assert!(config(&["--controllers", "17"]).is_err());
        assert!(config(&["--port", "2"]).is_err());
        assert!(config(&["--port", "0"]).is_err());
        assert!(config(&["--duration", "5000", "--max-duration", "1000"]).is_err());
        assert!(config(&["--duration", "5000", "--max-duration", "1000", "--no-cap"]).is_ok());
    }

    #[test]
    fn test_pause_limit() {
        let defaults = config(&[]).expect("config");
        assert_eq!(defaults.pause_input, None);
        assert_eq!(defaults.max_pause_duration, DEFAULT_MAX_PAUSE_DURATION_MS);

        let config = config(&["--pause-input", "start", "--max-pause-duration", "-1"])
            .expect("config");
        assert_eq!(config.pause_input.as_deref(), Some("start"));
        assert_eq!(config.max_pause_duration, -1);
    }

    #[test]
    fn test_format_value_enum() {
        let config = config(&["--format", "json"]).expect("config");
        assert_eq!(config.format, OutputFormat::Json);
    }
}
