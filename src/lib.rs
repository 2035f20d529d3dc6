//! Aura - DSP engine for a desktop audio player
//!
//! Aura is a pure signal-processing library that any front end can drive:
//! 1. Effect chains - ordered stages (bass and treble shelves, EQ,
//!    compressor, widener, auto-pan, reverb, limiter, gain) built from
//!    serializable presets
//! 2. Dual-deck playback - two decks blended by a crossfade controller
//! 3. Offline rendering - WAV decode, process and export
//!
//! # Architecture
//!
//! - [`dsp`]: parameters, stages, chains and presets
//! - [`engine`]: buffers, WAV I/O, decks, mixer and render pipeline
//! - [`config`]: engine settings loaded from JSON
//! - [`cli`]: command-line front end used by `aura-cli`

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use error::{AuraError, Result};
