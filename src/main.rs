use std::process::ExitCode;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crowd_input::config::{Config, OutputFormat};
use crowd_input::console::{Console, ConsoleManager};
use crowd_input::exercise::{generate_exercise, ExerciseOptions};
use crowd_input::parser::{parse_message, ParseContext, ParsedInputResult, ParsedInputSequence};
use crowd_input::preparse::MacroTable;
use crowd_input::reverse::{reverse_parse, reverse_parse_natural};
use crowd_input::validation::{
    validate_sequence, ControllerSnapshot, PauseLimit, ValidationContext,
};

/// Outcome of handling one line of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Accepted,
    Rejected,
    NotInput,
}

fn render(sequence: &ParsedInputSequence, console: &Console, config: &Config) -> Result<String> {
    Ok(match config.format {
        OutputFormat::Text => reverse_parse(sequence, console, &config.reverse),
        OutputFormat::Natural => reverse_parse_natural(sequence, console, &config.reverse),
        OutputFormat::Json => {
            serde_json::to_string_pretty(sequence).context("Failed to serialize sequence")?
        }
    })
}

fn handle_line(
    line: &str,
    console: &Console,
    macros: &MacroTable,
    config: &Config,
) -> Result<Outcome> {
    let mut context = ParseContext::new(console, macros);
    context.parser = config.parser;

    let sequence = parse_message(line, &context)
        .with_context(|| format!("Console '{}' is misconfigured", console.name))?;

    match sequence.result {
        ParsedInputResult::NormalMsg => {
            if config.format == OutputFormat::Json {
                println!("{}", render(&sequence, console, config)?);
            } else {
                println!("Not an input sequence.");
            }
            Ok(Outcome::NotInput)
        }
        ParsedInputResult::Invalid => {
            if config.format == OutputFormat::Json {
                println!("{}", render(&sequence, console, config)?);
            } else {
                println!(
                    "Invalid input: {}",
                    sequence.error_message().unwrap_or_default()
                );
            }
            Ok(Outcome::Rejected)
        }
        ParsedInputResult::Valid => {
            let controllers = ControllerSnapshot::new(config.controller_count);
            let validation = ValidationContext {
                console,
                controllers: &controllers,
                user_level: config.user_level,
                restricted: &[],
                now: chrono::Utc::now(),
                pause: config.pause_input.as_deref().map(|input| PauseLimit {
                    input,
                    max_duration: config.max_pause_duration,
                }),
            };

            if let Err(rejection) = validate_sequence(&sequence, &validation) {
                println!("Rejected: {}", rejection);
                return Ok(Outcome::Rejected);
            }

            println!("{}", render(&sequence, console, config)?);
            log::debug!("Total duration: {} ms", sequence.total_duration);
            Ok(Outcome::Accepted)
        }
    }
}

fn print_exercise(console: &Console, config: &Config) -> Result<ExitCode> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let options = ExerciseOptions {
        user_level: config.user_level,
        randomize_ports: config.controller_count > 1,
        controller_count: config.controller_count,
        default_port: config.parser.default_port,
        max_duration: config.parser.max_duration,
        ..ExerciseOptions::default()
    };

    let Some(exercise) = generate_exercise(&mut rng, console, &options) else {
        eprintln!("Console '{}' has no inputs available at level {}", console.name, config.user_level);
        return Ok(ExitCode::FAILURE);
    };

    println!("{}", reverse_parse_natural(&exercise, console, &config.reverse));
    println!("{}", reverse_parse(&exercise, console, &config.reverse));
    Ok(ExitCode::SUCCESS)
}

async fn run_interactive(manager: &ConsoleManager, macros: &MacroTable, config: &Config) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Take a fresh console each line so reloads apply
        let Some(console) = manager.get_effective_default_console().await else {
            log::warn!("No console loaded");
            continue;
        };
        if let Err(e) = handle_line(line, &console, macros, config) {
            log::warn!("{:#}", e);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse configuration from command line and environment
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut manager = ConsoleManager::new(&config);
    manager.initialize(config.interactive).await?;

    let Some(console) = manager.get_console(&config.console).await else {
        eprintln!(
            "Unknown console '{}'. Available: {}",
            config.console,
            manager.list_console_names().await.join(", ")
        );
        return Ok(ExitCode::FAILURE);
    };

    if config.exercise {
        return print_exercise(&console, &config);
    }

    let macros = match &config.macros_path {
        Some(path) => MacroTable::load(path).await?,
        None => MacroTable::new(),
    };
    log::debug!("Loaded {} macros", macros.len());

    if config.interactive {
        run_interactive(&manager, &macros, &config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let text = match &config.text {
        Some(text) => text.clone(),
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read input from stdin")?;
            buffer
        }
    };

    match handle_line(text.trim(), &console, &macros, &config)? {
        Outcome::Accepted | Outcome::NotInput => Ok(ExitCode::SUCCESS),
        Outcome::Rejected => Ok(ExitCode::FAILURE),
    }
}
