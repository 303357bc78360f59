//! Cadenza CLI
//!
//! Command-line front end for the Cadenza editing engine.

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use cadenza::cli::{commands, Cli, Commands};
use cadenza::config::EditorConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Cadenza v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    debug!("Using {:?}", config);

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Cadenza v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &EditorConfig) -> Result<()> {
    match cmd {
        Commands::Inspect { path } => commands::inspect(&path),
        Commands::Process {
            input,
            output,
            effect,
            start,
            end,
        } => commands::process(config, &input, &output, &effect, start, end),
        Commands::Mixdown {
            project,
            output,
            sample_rate,
        } => commands::mixdown(config, &project, &output, sample_rate),
        Commands::ProjectInfo { project } => commands::project_info(&project),
    }
}
