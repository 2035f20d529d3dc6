//! Bass Boost
//!
//! Low-shelf biquad applied per channel. Filter history is kept between
//! blocks so block boundaries are click-free.

use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::eq::{BiquadCoeffs, BiquadState, FilterShape};
use super::params::{ParamSet, ParamSpec};
use crate::engine::SampleBuffer;

const GAIN_DB: usize = 0;
const CUTOFF_HZ: usize = 1;

/// Shelf slope expressed as Q (S = 1 in cookbook terms)
const SHELF_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Low-shelf bass boost
///
/// # Parameters
/// - `gain_db`: Shelf gain (-24 to +24 dB)
/// - `cutoff_hz`: Shelf corner frequency (20 to 500 Hz)
#[derive(Debug)]
pub struct BassBoost {
    params: Arc<ParamSet>,
    sample_rate: u32,
    channels: usize,
    seen_version: Option<u64>,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl BassBoost {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::BassBoost.as_str(),
            vec![
                ParamSpec::new("gain_db", -24.0, 24.0, 4.0),
                ParamSpec::new("cutoff_hz", 20.0, 500.0, 120.0),
            ],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self {
            params,
            sample_rate: 44100,
            channels: 2,
            seen_version: None,
            coeffs: BiquadCoeffs::unity(),
            states: vec![BiquadState::default(); 2],
        }
    }

    /// Magnitude response in dB at a frequency
    pub fn response_db(&mut self, frequency: f64) -> f64 {
        self.update_coefficients();
        self.coeffs.magnitude_db(frequency, self.sample_rate)
    }

    fn update_coefficients(&mut self) {
        let version = self.params.version();
        if self.seen_version == Some(version) {
            return;
        }
        self.coeffs = BiquadCoeffs::calculate(
            FilterShape::LowShelf,
            self.sample_rate,
            self.params.value(CUTOFF_HZ),
            self.params.value(GAIN_DB),
            SHELF_Q,
        );
        self.seen_version = Some(version);
    }
}

impl Default for BassBoost {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for BassBoost {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != self.channels || buffer.sample_rate() != self.sample_rate {
            self.prepare(buffer.sample_rate(), buffer.channels());
        }
        self.update_coefficients();

        for frame in buffer.frames_mut() {
            for (sample, state) in frame.iter_mut().zip(self.states.iter_mut()) {
                *sample = state.process(*sample, &self.coeffs);
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.states = vec![BiquadState::default(); channels];
        self.seen_version = None;
    }

    fn reset(&mut self) {
        self.states.iter_mut().for_each(BiquadState::reset);
    }

    fn kind(&self) -> StageKind {
        StageKind::BassBoost
    }

    fn params(&self) -> &Arc<ParamSet> {
        &self.params
    }

    fn duplicate(&self) -> Self {
        let mut copy = Self::from_params(Arc::new(self.params.duplicate()));
        copy.prepare(self.sample_rate, self.channels);
        copy
    }
}
