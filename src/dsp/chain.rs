//! Effect chain
//!
//! Stages are processed in chain order (index 0 first), each one receiving
//! the previous stage's output. Order is exactly as configured; nothing is
//! re-sorted behind the caller's back.
//!
//! Live editing goes through a [`ChainHandle`]. The handle shares the
//! stages' parameter sets and bypass flags, so edits from another thread
//! take effect on the next processed block without locking the audio path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::effect::{EffectStage, StageKind, StageProcessor};
use super::eq::{DEFAULT_BANDS, MAX_BANDS};
use super::params::{ParamSet, ParamSpec};
use super::preset::{PresetDescriptor, StageDescriptor};
use crate::engine::SampleBuffer;
use crate::error::{AuraError, Result};

const MIX: usize = 0;
const INTENSITY: usize = 1;

/// Chain-level controls: wet/dry `mix` and per-stage `intensity`
fn chain_params() -> ParamSet {
    ParamSet::new(
        "chain",
        vec![
            ParamSpec::new("mix", 0.0, 1.0, 1.0),
            ParamSpec::new("intensity", 0.0, 1.0, 1.0),
        ],
    )
}

/// Editor-side view of one stage
#[derive(Debug, Clone)]
struct StageSlot {
    id: String,
    kind: StageKind,
    params: Arc<ParamSet>,
    enabled: Arc<AtomicBool>,
}

impl StageSlot {
    fn of(stage: &EffectStage) -> Self {
        Self {
            id: stage.id().to_string(),
            kind: stage.kind(),
            params: Arc::clone(stage.params()),
            enabled: Arc::clone(stage.enabled_flag()),
        }
    }
}

type Layout = Arc<RwLock<Vec<StageSlot>>>;

/// Ordered chain of effect stages
#[derive(Debug)]
pub struct EffectChain {
    name: String,
    stages: Vec<EffectStage>,
    mix: Arc<ParamSet>,
    layout: Layout,
    sample_rate: u32,
    channels: usize,
    /// Scratch copy of the input for wet/dry mixing
    dry: Vec<f64>,
    /// Scratch copy of one stage's input for intensity blending
    stage_input: Vec<f64>,
}

impl EffectChain {
    /// Create an empty chain
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            mix: Arc::new(chain_params()),
            layout: Arc::new(RwLock::new(Vec::new())),
            sample_rate: 44100,
            channels: 2,
            dry: Vec::new(),
            stage_input: Vec::new(),
        }
    }

    /// Build a chain from a preset descriptor
    ///
    /// The whole descriptor is validated; any unknown stage kind, unknown
    /// parameter or out-of-range value rejects the load.
    pub fn build(descriptor: &PresetDescriptor) -> Result<Self> {
        let mut chain = Self::new(descriptor.name.clone());
        chain.mix.set("mix", descriptor.mix)?;
        chain.mix.set("intensity", descriptor.intensity)?;
        for stage in &descriptor.stages {
            chain.stages.push(build_stage(stage)?);
        }
        chain.sync_layout();
        debug!(
            preset = %descriptor.name,
            stages = chain.stages.len(),
            mix = descriptor.mix,
            "built effect chain"
        );
        Ok(chain)
    }

    /// Parse and build a chain from descriptor JSON
    pub fn deserialize(json: &str) -> Result<Self> {
        Self::build(&PresetDescriptor::from_json(json)?)
    }

    /// Describe the chain as a preset, including every parameter value
    pub fn serialize(&self) -> PresetDescriptor {
        PresetDescriptor {
            name: self.name.clone(),
            mix: self.mix(),
            intensity: self.intensity(),
            stages: self.stages.iter().map(describe_stage).collect(),
        }
    }

    /// Serialized descriptor as JSON text
    pub fn to_json(&self) -> Result<String> {
        self.serialize().to_json()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, index: usize) -> Option<&EffectStage> {
        self.stages.get(index)
    }

    pub fn stages(&self) -> impl Iterator<Item = &EffectStage> {
        self.stages.iter()
    }

    /// Kinds in processing order
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(EffectStage::kind).collect()
    }

    /// Wet/dry mix (1.0 = fully processed)
    pub fn mix(&self) -> f64 {
        self.mix.value(MIX)
    }

    pub fn set_mix(&self, mix: f64) -> Result<()> {
        self.mix.set("mix", mix)
    }

    /// How strongly each stage applies (0 = every stage transparent)
    pub fn intensity(&self) -> f64 {
        self.mix.value(INTENSITY)
    }

    pub fn set_intensity(&self, intensity: f64) -> Result<()> {
        self.mix.set("intensity", intensity)
    }

    /// Update one parameter of the stage at `index`
    pub fn update_stage_parameter(&self, index: usize, name: &str, value: f64) -> Result<()> {
        self.stage_at(index)?.set_param(name, value)
    }

    // ------------------------------------------------------------------
    // Structure editing
    // ------------------------------------------------------------------

    /// Append a stage at the end of the chain
    pub fn push(&mut self, mut stage: EffectStage) {
        stage.prepare(self.sample_rate, self.channels);
        self.stages.push(stage);
        self.sync_layout();
    }

    /// Insert a stage before `index` (`index == len` appends)
    pub fn insert(&mut self, index: usize, mut stage: EffectStage) -> Result<()> {
        if index > self.stages.len() {
            return Err(AuraError::OutOfRange {
                index,
                len: self.stages.len(),
            });
        }
        stage.prepare(self.sample_rate, self.channels);
        self.stages.insert(index, stage);
        self.sync_layout();
        Ok(())
    }

    /// Remove and return the stage at `index`
    pub fn remove(&mut self, index: usize) -> Result<EffectStage> {
        self.stage_at(index)?;
        let stage = self.stages.remove(index);
        self.sync_layout();
        Ok(stage)
    }

    /// Move the stage at `from` so it ends up at position `to`
    pub fn move_stage(&mut self, from: usize, to: usize) -> Result<()> {
        self.stage_at(from)?;
        self.stage_at(to)?;
        let stage = self.stages.remove(from);
        self.stages.insert(to, stage);
        self.sync_layout();
        Ok(())
    }

    /// Exchange two stages
    pub fn swap_stages(&mut self, a: usize, b: usize) -> Result<()> {
        self.stage_at(a)?;
        self.stage_at(b)?;
        self.stages.swap(a, b);
        self.sync_layout();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Size every stage for a sample rate and channel count
    pub fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        for stage in &mut self.stages {
            stage.prepare(sample_rate, channels);
        }
    }

    /// Clear all runtime state (filter history, envelopes, delay lines)
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Run the buffer through every enabled stage in order
    pub fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.sample_rate() != self.sample_rate || buffer.channels() != self.channels {
            self.prepare(buffer.sample_rate(), buffer.channels());
        }

        let mix = self.mix.value(MIX);
        if mix < 1.0 {
            self.dry.clear();
            self.dry.extend_from_slice(buffer.samples());
        }

        let intensity = self.mix.value(INTENSITY);
        for stage in &mut self.stages {
            if intensity >= 1.0 || !stage.is_enabled() {
                stage.process(buffer);
                continue;
            }
            self.stage_input.clear();
            self.stage_input.extend_from_slice(buffer.samples());
            stage.process(buffer);
            for (out, input) in buffer.samples_mut().iter_mut().zip(&self.stage_input) {
                *out = input + (*out - input) * intensity;
            }
        }

        if mix < 1.0 {
            for (wet, dry) in buffer.samples_mut().iter_mut().zip(&self.dry) {
                *wet = dry * (1.0 - mix) + *wet * mix;
            }
        }
    }

    /// Editing handle sharing this chain's parameters
    pub fn handle(&self) -> ChainHandle {
        ChainHandle {
            layout: Arc::clone(&self.layout),
            mix: Arc::clone(&self.mix),
        }
    }

    /// Deep copy with independent parameters and fresh runtime state
    pub fn detached(&self) -> Self {
        let mut copy = Self::new(self.name.clone());
        copy.mix = Arc::new(self.mix.duplicate());
        copy.stages = self.stages.iter().map(EffectStage::duplicate).collect();
        copy.prepare(self.sample_rate, self.channels);
        copy.sync_layout();
        copy
    }

    fn stage_at(&self, index: usize) -> Result<&EffectStage> {
        self.stages.get(index).ok_or(AuraError::OutOfRange {
            index,
            len: self.stages.len(),
        })
    }

    fn sync_layout(&self) {
        let slots = self.stages.iter().map(StageSlot::of).collect();
        *self.layout.write().unwrap_or_else(PoisonError::into_inner) = slots;
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

fn build_stage(descriptor: &StageDescriptor) -> Result<EffectStage> {
    let kind: StageKind = descriptor.kind.parse()?;
    let bands = descriptor
        .bands
        .unwrap_or_else(|| infer_band_count(&descriptor.parameters));
    let processor = StageProcessor::with_defaults(kind, bands)?;
    processor.params().apply(&descriptor.parameters)?;

    let stage = match &descriptor.id {
        Some(id) => EffectStage::with_id(id.clone(), processor),
        None => EffectStage::new(processor),
    };
    stage.set_enabled(descriptor.enabled);
    Ok(stage)
}

/// Band count implied by `band{i}_*` parameter names, never below the default
fn infer_band_count(parameters: &BTreeMap<String, f64>) -> usize {
    parameters
        .keys()
        .filter_map(|name| {
            let rest = name.strip_prefix("band")?;
            let (index, _) = rest.split_once('_')?;
            index.parse::<usize>().ok()
        })
        .map(|i| (i + 1).min(MAX_BANDS + 1))
        .fold(DEFAULT_BANDS, usize::max)
}

fn describe_stage(stage: &EffectStage) -> StageDescriptor {
    let bands = match stage.processor() {
        StageProcessor::ParametricEq(eq) => Some(eq.band_count()),
        _ => None,
    };
    StageDescriptor {
        kind: stage.kind().as_str().to_string(),
        id: Some(stage.id().to_string()),
        enabled: stage.is_enabled(),
        bands,
        parameters: stage.params().to_map(),
    }
}

// ============================================================================
// Chain Handle
// ============================================================================

/// Thread-safe editing handle for a live chain
///
/// Parameter writes are validated exactly as on the chain itself and become
/// audible on the next processed block. Structural edits (adding, removing,
/// reordering stages) are only possible on the chain; the handle follows
/// them automatically.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    layout: Layout,
    mix: Arc<ParamSet>,
}

impl ChainHandle {
    fn with_slot<T>(&self, index: usize, f: impl FnOnce(&StageSlot) -> Result<T>) -> Result<T> {
        let layout = self.layout.read().unwrap_or_else(PoisonError::into_inner);
        let slot = layout.get(index).ok_or(AuraError::OutOfRange {
            index,
            len: layout.len(),
        })?;
        f(slot)
    }

    /// Number of stages in the chain
    pub fn len(&self) -> usize {
        self.layout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set a parameter on the stage at `index`
    pub fn set_parameter(&self, index: usize, name: &str, value: f64) -> Result<()> {
        self.with_slot(index, |slot| slot.params.set(name, value))
    }

    /// Read a parameter on the stage at `index`
    pub fn parameter(&self, index: usize, name: &str) -> Result<f64> {
        self.with_slot(index, |slot| slot.params.get(name))
    }

    /// Instance id of the stage at `index`
    pub fn stage_id(&self, index: usize) -> Result<String> {
        self.with_slot(index, |slot| Ok(slot.id.clone()))
    }

    /// Bypass or re-enable the stage at `index`
    pub fn set_enabled(&self, index: usize, enabled: bool) -> Result<()> {
        self.with_slot(index, |slot| {
            slot.enabled.store(enabled, Ordering::Relaxed);
            Ok(())
        })
    }

    /// Kind of the stage at `index`
    pub fn kind(&self, index: usize) -> Result<StageKind> {
        self.with_slot(index, |slot| Ok(slot.kind))
    }

    pub fn set_mix(&self, mix: f64) -> Result<()> {
        self.mix.set("mix", mix)
    }

    pub fn set_intensity(&self, intensity: f64) -> Result<()> {
        self.mix.set("intensity", intensity)
    }
}

// ============================================================================
// Tests
// ============================================================================
