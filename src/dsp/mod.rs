//! DSP Effects Library
//!
//! Effect stages, the ordered effect chain and preset descriptors.
//! Every stage implements the [`Effect`] trait and is dispatched through
//! the closed [`StageProcessor`] enum.

mod auto_pan;
mod bass_boost;
mod chain;
mod compressor;
mod effect;
mod eq;
mod gain;
mod limiter;
mod params;
mod preset;
mod reverb;
mod treble_boost;
mod widener;

pub use auto_pan::AutoPan;
pub use bass_boost::BassBoost;
pub use chain::{ChainHandle, EffectChain};
pub use compressor::{Compressor, Detection};
pub use effect::{Effect, EffectStage, StageKind, StageProcessor};
pub use eq::{band_param, ParametricEq, DEFAULT_BANDS, MAX_BANDS};
pub use gain::Gain;
pub use limiter::Limiter;
pub use params::{ParamSet, ParamSpec, StageParameter};
pub use preset::{
    builtin_presets, MemoryPresetStore, PresetDescriptor, PresetStore, StageDescriptor,
};
pub use reverb::Reverb;
pub use treble_boost::TrebleBoost;
pub use widener::StereoWidener;
