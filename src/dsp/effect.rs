//! Effect stage definitions
//!
//! The stage set is closed: every concrete processor implements [`Effect`],
//! and [`StageProcessor`] dispatches over the fixed list of variants with an
//! exhaustive `match`.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::params::ParamSet;
use super::{
    AutoPan, BassBoost, Compressor, Gain, Limiter, ParametricEq, Reverb, StereoWidener,
    TrebleBoost,
};
use crate::engine::SampleBuffer;
use crate::error::{AuraError, Result};

/// Base trait for all DSP stages
///
/// Stages process buffers in place and keep their own history (filter
/// state, envelopes, delay lines) between calls so block boundaries are
/// seamless.
pub trait Effect: Send {
    /// Process audio buffer in place
    fn process(&mut self, buffer: &mut SampleBuffer);

    /// Size internal state for a sample rate and channel count
    ///
    /// Clears any existing history.
    fn prepare(&mut self, sample_rate: u32, channels: usize);

    /// Reset runtime state without touching parameters
    fn reset(&mut self);

    /// Stage kind
    fn kind(&self) -> StageKind;

    /// Shared parameter set
    fn params(&self) -> &Arc<ParamSet>;

    /// Copy with independent parameters holding the same values and fresh state
    fn duplicate(&self) -> Self
    where
        Self: Sized;
}

/// Identifies a stage variant in preset descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    BassBoost,
    TrebleBoost,
    ParametricEq,
    Compressor,
    StereoWidener,
    AutoPan,
    Reverb,
    Limiter,
    Gain,
}

impl StageKind {
    /// All supported kinds
    pub const ALL: [StageKind; 9] = [
        StageKind::BassBoost,
        StageKind::TrebleBoost,
        StageKind::ParametricEq,
        StageKind::Compressor,
        StageKind::StereoWidener,
        StageKind::AutoPan,
        StageKind::Reverb,
        StageKind::Limiter,
        StageKind::Gain,
    ];

    /// Identifier used in descriptors
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::BassBoost => "bass_boost",
            StageKind::TrebleBoost => "treble_boost",
            StageKind::ParametricEq => "parametric_eq",
            StageKind::Compressor => "compressor",
            StageKind::StereoWidener => "stereo_widener",
            StageKind::AutoPan => "auto_pan",
            StageKind::Reverb => "reverb",
            StageKind::Limiter => "limiter",
            StageKind::Gain => "gain",
        }
    }

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            StageKind::BassBoost => "Bass Boost",
            StageKind::TrebleBoost => "Treble Boost",
            StageKind::ParametricEq => "Parametric EQ",
            StageKind::Compressor => "Compressor",
            StageKind::StereoWidener => "Stereo Widener",
            StageKind::AutoPan => "Auto Pan",
            StageKind::Reverb => "Reverb",
            StageKind::Limiter => "Limiter",
            StageKind::Gain => "Gain",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = AuraError;

    fn from_str(s: &str) -> Result<Self> {
        StageKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AuraError::UnsupportedStage {
                kind: s.to_string(),
            })
    }
}

/// Closed set of stage processors
#[derive(Debug)]
pub enum StageProcessor {
    BassBoost(BassBoost),
    TrebleBoost(TrebleBoost),
    ParametricEq(ParametricEq),
    Compressor(Compressor),
    StereoWidener(StereoWidener),
    AutoPan(AutoPan),
    Reverb(Reverb),
    Limiter(Limiter),
    Gain(Gain),
}

macro_rules! dispatch {
    ($self:expr, $stage:ident => $body:expr) => {
        match $self {
            StageProcessor::BassBoost($stage) => $body,
            StageProcessor::TrebleBoost($stage) => $body,
            StageProcessor::ParametricEq($stage) => $body,
            StageProcessor::Compressor($stage) => $body,
            StageProcessor::StereoWidener($stage) => $body,
            StageProcessor::AutoPan($stage) => $body,
            StageProcessor::Reverb($stage) => $body,
            StageProcessor::Limiter($stage) => $body,
            StageProcessor::Gain($stage) => $body,
        }
    };
}

impl StageProcessor {
    /// Create a processor with default parameters
    ///
    /// `eq_bands` only applies to [`StageKind::ParametricEq`].
    pub fn with_defaults(kind: StageKind, eq_bands: usize) -> Result<Self> {
        Ok(match kind {
            StageKind::BassBoost => StageProcessor::BassBoost(BassBoost::new()),
            StageKind::TrebleBoost => StageProcessor::TrebleBoost(TrebleBoost::new()),
            StageKind::ParametricEq => {
                StageProcessor::ParametricEq(ParametricEq::with_bands(eq_bands)?)
            }
            StageKind::Compressor => StageProcessor::Compressor(Compressor::new()),
            StageKind::StereoWidener => StageProcessor::StereoWidener(StereoWidener::new()),
            StageKind::AutoPan => StageProcessor::AutoPan(AutoPan::new()),
            StageKind::Reverb => StageProcessor::Reverb(Reverb::new()),
            StageKind::Limiter => StageProcessor::Limiter(Limiter::new()),
            StageKind::Gain => StageProcessor::Gain(Gain::new()),
        })
    }

    pub fn process(&mut self, buffer: &mut SampleBuffer) {
        dispatch!(self, s => s.process(buffer))
    }

    pub fn prepare(&mut self, sample_rate: u32, channels: usize) {
        dispatch!(self, s => s.prepare(sample_rate, channels))
    }

    pub fn reset(&mut self) {
        dispatch!(self, s => s.reset())
    }

    pub fn kind(&self) -> StageKind {
        dispatch!(self, s => s.kind())
    }

    pub fn params(&self) -> &Arc<ParamSet> {
        dispatch!(self, s => s.params())
    }

    pub fn duplicate(&self) -> Self {
        match self {
            StageProcessor::BassBoost(s) => StageProcessor::BassBoost(s.duplicate()),
            StageProcessor::TrebleBoost(s) => StageProcessor::TrebleBoost(s.duplicate()),
            StageProcessor::ParametricEq(s) => StageProcessor::ParametricEq(s.duplicate()),
            StageProcessor::Compressor(s) => StageProcessor::Compressor(s.duplicate()),
            StageProcessor::StereoWidener(s) => StageProcessor::StereoWidener(s.duplicate()),
            StageProcessor::AutoPan(s) => StageProcessor::AutoPan(s.duplicate()),
            StageProcessor::Reverb(s) => StageProcessor::Reverb(s.duplicate()),
            StageProcessor::Limiter(s) => StageProcessor::Limiter(s.duplicate()),
            StageProcessor::Gain(s) => StageProcessor::Gain(s.duplicate()),
        }
    }
}

/// One slot of an effect chain
///
/// Wraps a processor with a stable instance id and a bypass switch that an
/// editor thread may flip while audio is running.
#[derive(Debug)]
pub struct EffectStage {
    id: String,
    enabled: Arc<AtomicBool>,
    processor: StageProcessor,
}

impl EffectStage {
    /// Wrap a processor with a freshly generated id
    pub fn new(processor: StageProcessor) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), processor)
    }

    /// Wrap a processor with a known id
    pub fn with_id(id: String, processor: StageProcessor) -> Self {
        Self {
            id,
            enabled: Arc::new(AtomicBool::new(true)),
            processor,
        }
    }

    /// Create a stage of the given kind with default parameters
    pub fn of_kind(kind: StageKind) -> Result<Self> {
        Ok(Self::new(StageProcessor::with_defaults(
            kind,
            super::eq::DEFAULT_BANDS,
        )?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> StageKind {
        self.processor.kind()
    }

    pub fn params(&self) -> &Arc<ParamSet> {
        self.processor.params()
    }

    pub fn processor(&self) -> &StageProcessor {
        &self.processor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn enabled_flag(&self) -> &Arc<AtomicBool> {
        &self.enabled
    }

    /// Set a single parameter by name
    pub fn set_param(&self, name: &str, value: f64) -> Result<()> {
        self.params().set(name, value)
    }

    /// Process a buffer unless bypassed
    pub fn process(&mut self, buffer: &mut SampleBuffer) {
        if self.is_enabled() {
            self.processor.process(buffer);
        }
    }

    pub fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.processor.prepare(sample_rate, channels);
    }

    pub fn reset(&mut self) {
        self.processor.reset();
    }

    /// Independent copy: same id, values and bypass state, fresh runtime state
    pub fn duplicate(&self) -> Self {
        let copy = Self::with_id(self.id.clone(), self.processor.duplicate());
        copy.set_enabled(self.is_enabled());
        copy
    }
}
