//! Gain Effect
//!
//! Static trim stage with a dB-based interface.

use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::buffer::db_to_linear;
use crate::engine::SampleBuffer;

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
const MIN_GAIN_DB: f64 = -96.0;

/// Maximum gain in dB (+24 dB)
const MAX_GAIN_DB: f64 = 24.0;

const GAIN_DB: usize = 0;

// ============================================================================
// Gain Effect
// ============================================================================

/// Simple gain adjustment
///
/// # Parameters
/// - `gain_db`: Gain in decibels (-96 to +24 dB)
#[derive(Debug)]
pub struct Gain {
    params: Arc<ParamSet>,
}

impl Gain {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::Gain.as_str(),
            vec![ParamSpec::new("gain_db", MIN_GAIN_DB, MAX_GAIN_DB, 0.0)],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self { params }
    }

    /// Current gain as a linear factor
    pub fn gain_linear(&self) -> f64 {
        db_to_linear(self.params.value(GAIN_DB))
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Gain {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        let gain_db = self.params.value(GAIN_DB);
        if gain_db == 0.0 {
            return;
        }
        buffer.apply_gain(db_to_linear(gain_db));
    }

    fn prepare(&mut self, _sample_rate: u32, _channels: usize) {}

    fn reset(&mut self) {}

    fn kind(&self) -> StageKind {
        StageKind::Gain
    }

    fn params(&self) -> &Arc<ParamSet> {
        &self.params
    }

    fn duplicate(&self) -> Self {
        Self::from_params(Arc::new(self.params.duplicate()))
    }
}

// ============================================================================
// Tests
// ============================================================================
