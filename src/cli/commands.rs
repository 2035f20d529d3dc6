//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::dsp::{EffectChain, MemoryPresetStore, PresetDescriptor, PresetStore};
use crate::engine::{self, DeckId, Mixer, RenderPipeline, SampleBuffer};

/// Load the config file if one was given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Resolve a preset argument: a JSON file path or a built-in name
pub fn resolve_preset(preset: &str) -> Result<PresetDescriptor> {
    let path = Path::new(preset);
    if path.extension().is_some_and(|ext| ext == "json") {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading preset {}", path.display()))?;
        return Ok(PresetDescriptor::from_json(&text)?);
    }
    Ok(MemoryPresetStore::with_builtins().load(preset)?)
}

fn build_chain(preset: &str) -> Result<EffectChain> {
    let descriptor = resolve_preset(preset)?;
    EffectChain::build(&descriptor).with_context(|| format!("building preset '{}'", preset))
}

/// Print the format of a WAV file.
pub fn info(input: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let wav = engine::probe(&bytes)?;
    let buffer = engine::decode(&bytes)?;

    println!("File:        {}", input.display());
    println!("Sample rate: {} Hz", wav.sample_rate);
    println!("Channels:    {}", wav.channels);
    println!("Bit depth:   {}", wav.bits_per_sample);
    println!("Frames:      {}", wav.num_frames);
    println!("Duration:    {:.3} s", wav.duration_secs());
    println!("Peak:        {:.2} dBFS", buffer.peak_db());
    println!("RMS:         {:.2} dBFS", buffer.rms_db());

    Ok(())
}

/// Render one file through a preset.
pub fn render(
    config: &EngineConfig,
    input: &Path,
    output: &Path,
    preset: &str,
    bit_depth: Option<u16>,
    json: bool,
) -> Result<()> {
    info!("Rendering {} with preset '{}'", input.display(), preset);

    let source = engine::read_wav_file(input)?;
    let mut chain = build_chain(preset)?;
    let bit_depth = bit_depth.unwrap_or(config.export_bit_depth);
    let report = RenderPipeline::new(config.block_size)?.render_to_file(
        &source,
        &mut chain,
        output,
        bit_depth,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Rendered: {}", output.display());
        println!("Frames:   {}", report.frames);
        println!("Peak:     {:.2} dBFS", report.peak_db);
        println!("SHA-256:  {}", report.sha256);
    }

    Ok(())
}

/// Render every WAV file found under `input_dir`, mirroring the tree.
pub fn batch(
    config: &EngineConfig,
    input_dir: &Path,
    output_dir: &Path,
    preset: &str,
) -> Result<()> {
    if !input_dir.is_dir() {
        bail!("{} is not a directory", input_dir.display());
    }
    let descriptor = resolve_preset(preset)?;
    let pipeline = RenderPipeline::new(config.block_size)?;

    let mut rendered = 0usize;
    let mut failed = 0usize;
    for entry in WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
    {
        let relative = entry.path().strip_prefix(input_dir)?;
        let target: PathBuf = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut chain = EffectChain::build(&descriptor)?;
        let result = engine::read_wav_file(entry.path()).and_then(|source| {
            pipeline.render_to_file(&source, &mut chain, &target, config.export_bit_depth)
        });
        match result {
            Ok(report) => {
                println!(
                    "{} -> {} ({} frames)",
                    entry.path().display(),
                    target.display(),
                    report.frames
                );
                rendered += 1;
            }
            Err(err) => {
                warn!("Skipping {}: {}", entry.path().display(), err);
                failed += 1;
            }
        }
    }

    println!("Rendered {} file(s), {} failed", rendered, failed);
    Ok(())
}

/// List the built-in presets.
pub fn presets() -> Result<()> {
    let store = MemoryPresetStore::with_builtins();
    println!("Built-in presets:");
    println!("{:-<60}", "");
    for name in store.list() {
        let preset = store.load(&name)?;
        let stages: Vec<&str> = preset.stages.iter().map(|s| s.kind.as_str()).collect();
        println!(
            "{:<18} mix {:.2}  intensity {:.2}  [{}]",
            preset.name,
            preset.mix,
            preset.intensity,
            stages.join(", ")
        );
    }
    Ok(())
}

/// Print one preset as JSON.
pub fn preset_dump(name: &str) -> Result<()> {
    let preset = resolve_preset(name)?;
    println!("{}", preset.to_json()?);
    Ok(())
}

/// Mix two tracks with an automatic crossfade and write the result.
pub fn mix(
    config: &EngineConfig,
    first: &Path,
    second: &Path,
    output: &Path,
    crossfade_ms: Option<f64>,
    preset_a: Option<&str>,
    preset_b: Option<&str>,
) -> Result<()> {
    let mut config = config.clone();
    config.crossfade.auto = true;
    if let Some(ms) = crossfade_ms {
        config.crossfade.duration_ms = ms;
    }

    let mut mixer = Mixer::new(&config)?;
    mixer.load_track(DeckId::A, first)?;
    mixer.load_track(DeckId::B, second)?;
    if let Some(preset) = preset_a {
        mixer.attach_chain(DeckId::A, build_chain(preset)?);
    }
    if let Some(preset) = preset_b {
        mixer.attach_chain(DeckId::B, build_chain(preset)?);
    }
    mixer.play(DeckId::A)?;

    let total: usize = [DeckId::A, DeckId::B]
        .iter()
        .map(|&id| mixer.deck(id).remaining_frames())
        .sum();
    let mut out = SampleBuffer::silence(engine::ChannelLayout::Stereo, 0, config.sample_rate);
    while out.num_frames() <= total {
        let block = mixer.next_block(config.block_size)?;
        for event in &block.events {
            info!(?event, "mixer");
        }
        out.append(&block.buffer)?;
        let idle = !mixer.is_crossfading()
            && !mixer.deck(DeckId::A).is_playing()
            && !mixer.deck(DeckId::B).is_playing();
        if idle {
            break;
        }
    }

    let bytes = engine::write_wav_file(output, &out, config.export_bit_depth)?;
    println!("Mixed: {}", output.display());
    println!("Duration: {:.2} s", out.duration_secs());
    println!("Bytes:    {}", bytes.len());
    Ok(())
}
