mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use devdeck::{Error as DeckError, Orchestrator, Parser as ConfigParser};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(deck_error) = e.downcast_ref::<DeckError>() {
            eprintln!("Error: {}", deck_error);
            if let Some(suggestion) = deck_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config_path = resolve_config_path(cli.config, cli.workdir.as_deref())?;
    tracing::debug!("Using config {}", config_path.display());

    let config = ConfigParser::new().load_config(&config_path)?;
    let orchestrator = Orchestrator::builder()
        .registry(Arc::new(config.to_registry()?))
        .settings(config.settings.clone())
        .config_store(Arc::new(config.to_store()?))
        .build();

    let out = output::CliOutput;
    match cli.command {
        Commands::Validate { json } => commands::run_validate(&orchestrator, json, &out),
        Commands::Order => commands::run_order(&orchestrator, &out),
        Commands::Deps => commands::run_deps(&orchestrator, &out),
        Commands::Up { services, profile } => {
            commands::run_up(&orchestrator, &services, profile.as_deref(), &out).await
        }
    }
}

fn resolve_config_path(config: Option<PathBuf>, workdir: Option<&Path>) -> anyhow::Result<PathBuf> {
    match (config, workdir) {
        (Some(path), Some(dir)) if path.is_relative() => Ok(dir.join(path)),
        (Some(path), _) => Ok(path),
        (None, Some(dir)) => Ok(ConfigParser::find_config_in_dir(dir)?),
        (None, None) => Ok(ConfigParser::new().find_config_file()?),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
