//! Auto Pan
//!
//! Sine LFO sweeping a stereo signal between the channels with an
//! equal-power pan law. The LFO phase is stage state: it keeps running
//! across blocks and is only zeroed by `prepare`/`reset`.

use std::f64::consts::{FRAC_PI_4, TAU};
use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::SampleBuffer;

const DEPTH: usize = 0;
const SPEED_HZ: usize = 1;

/// Depths at or below this leave the signal untouched
const MIN_DEPTH: f64 = 0.01;

/// LFO auto-panner
///
/// # Parameters
/// - `depth`: Sweep amount (0 to 1, 1 reaches hard left/right)
/// - `speed_hz`: LFO rate (0 to 10 Hz)
#[derive(Debug)]
pub struct AutoPan {
    params: Arc<ParamSet>,
    sample_rate: u32,
    phase: f64,
}

impl AutoPan {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::AutoPan.as_str(),
            vec![
                ParamSpec::new("depth", 0.0, 1.0, 0.5),
                ParamSpec::new("speed_hz", 0.0, 10.0, 0.25),
            ],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self {
            params,
            sample_rate: 44100,
            phase: 0.0,
        }
    }

    /// Current LFO phase in radians, in [0, 2π)
    pub fn phase(&self) -> f64 {
        self.phase
    }
}

impl Default for AutoPan {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for AutoPan {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != 2 {
            return;
        }
        if buffer.sample_rate() != self.sample_rate {
            self.prepare(buffer.sample_rate(), 2);
        }

        let depth = self.params.value(DEPTH);
        let step = TAU * self.params.value(SPEED_HZ) / self.sample_rate as f64;
        let active = depth > MIN_DEPTH;

        for frame in buffer.frames_mut() {
            if active {
                let pan = self.phase.sin() * depth;
                let theta = (pan + 1.0) * FRAC_PI_4;
                frame[0] *= theta.cos();
                frame[1] *= theta.sin();
            }
            self.phase = (self.phase + step) % TAU;
        }
    }

    fn prepare(&mut self, sample_rate: u32, _channels: usize) {
        self.sample_rate = sample_rate;
        self.phase = 0.0;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn kind(&self) -> StageKind {
        StageKind::AutoPan
    }

    fn params(&self) -> &Arc<ParamSet> {
        &self.params
    }

    fn duplicate(&self) -> Self {
        let mut copy = Self::from_params(Arc::new(self.params.duplicate()));
        copy.sample_rate = self.sample_rate;
        copy
    }
}
