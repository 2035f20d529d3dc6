//! Aura CLI - Audio Engine
//!
//! Command-line interface for the Aura DSP engine.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aura::cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Aura Audio Engine v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cli.config.as_deref(), cmd),
        None => {
            println!("Aura Audio Engine v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: Option<&std::path::Path>, cmd: Commands) -> Result<()> {
    let config = commands::load_config(config)?;
    match cmd {
        Commands::Info { input } => commands::info(&input),
        Commands::Render {
            input,
            output,
            preset,
            bit_depth,
            json,
        } => commands::render(&config, &input, &output, &preset, bit_depth, json),
        Commands::Batch {
            input_dir,
            output_dir,
            preset,
        } => commands::batch(&config, &input_dir, &output_dir, &preset),
        Commands::Presets => commands::presets(),
        Commands::PresetDump { name } => commands::preset_dump(&name),
        Commands::Mix {
            first,
            second,
            output,
            crossfade_ms,
            preset_a,
            preset_b,
        } => commands::mix(
            &config,
            &first,
            &second,
            &output,
            crossfade_ms,
            preset_a.as_deref(),
            preset_b.as_deref(),
        ),
    }
}
