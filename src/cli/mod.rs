//! CLI Module
//!
//! Command-line front end for the Aura engine's offline pipeline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aura Audio Engine - effect chains, crossfades and WAV rendering
#[derive(Parser, Debug)]
#[command(name = "aura")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the format of a WAV file
    #[command(name = "info")]
    Info {
        /// Input WAV file
        input: PathBuf,
    },

    /// Process a WAV file through a preset
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Built-in preset name or path to a preset JSON file
        #[arg(short, long, default_value = "Flat")]
        preset: String,

        /// Output bit depth (defaults to the configured export depth)
        #[arg(short, long)]
        bit_depth: Option<u16>,

        /// Print the render report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render every WAV file under a directory
    #[command(name = "batch")]
    Batch {
        /// Directory to scan recursively
        input_dir: PathBuf,

        /// Directory receiving the rendered files
        output_dir: PathBuf,

        /// Built-in preset name or path to a preset JSON file
        #[arg(short, long, default_value = "Flat")]
        preset: String,
    },

    /// List the built-in presets
    #[command(name = "presets")]
    Presets,

    /// Print a built-in preset as JSON
    #[command(name = "preset-dump")]
    PresetDump {
        /// Preset name
        name: String,
    },

    /// Crossfade from one track into another
    #[command(name = "mix")]
    Mix {
        /// Outgoing track (deck A)
        first: PathBuf,

        /// Incoming track (deck B)
        second: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Crossfade length in milliseconds (defaults to the configured length)
        #[arg(long)]
        crossfade_ms: Option<f64>,

        /// Preset for deck A
        #[arg(long)]
        preset_a: Option<String>,

        /// Preset for deck B
        #[arg(long)]
        preset_b: Option<String>,
    },
}
