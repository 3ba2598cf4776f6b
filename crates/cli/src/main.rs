//! Meteo CLI
//!
//! Main entry point for the meteo command-line tool.
//! Trains few-shot task models, runs predictions and inspects prompts.

mod commands;

use clap::{Parser, Subcommand};
use commands::{PredictCommand, PromptCommand, TemplatesCommand, TrainCommand};
use meteo_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Meteo - few-shot prompting for local LLMs
#[derive(Parser, Debug)]
#[command(name = "meteo")]
#[command(
    about = "Few-shot example selection and prompt assembly for LLM tasks",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "METEO_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "METEO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, fake-llm)
    #[arg(short, long, global = true, env = "METEO_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "METEO_MODEL")]
    model: Option<String>,

    /// Prompt language (en, es)
    #[arg(short, long, global = true, env = "METEO_LANGUAGE")]
    language: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a task model from labelled examples
    Train(TrainCommand),

    /// Predict with a saved task model
    Predict(PredictCommand),

    /// Print the composed prompt without calling the model
    Prompt(PromptCommand),

    /// List registered prompt templates
    Templates(TemplatesCommand),
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.language,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;
    config.validate()?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Train(_) => "train",
        Commands::Predict(_) => "predict",
        Commands::Prompt(_) => "prompt",
        Commands::Templates(_) => "templates",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Train(cmd) => cmd.execute(&config),
        Commands::Predict(cmd) => cmd.execute(&config),
        Commands::Prompt(cmd) => cmd.execute(&config),
        Commands::Templates(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
