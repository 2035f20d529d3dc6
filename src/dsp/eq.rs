//! Parametric EQ
//!
//! A bank of peaking biquad filters applied in series per channel.
//! The biquad primitives here are shared with the bass boost shelf.

use std::f64::consts::PI;
use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::SampleBuffer;
use crate::error::{AuraError, Result};

/// Maximum number of EQ bands
pub const MAX_BANDS: usize = 8;

/// Band count used when a preset does not say otherwise
pub const DEFAULT_BANDS: usize = 5;

/// Default centre frequency per band slot
const DEFAULT_CENTERS: [f64; MAX_BANDS] =
    [60.0, 150.0, 400.0, 1000.0, 2400.0, 6000.0, 12000.0, 16000.0];

/// Parameters per band: centre, gain, Q
const PARAMS_PER_BAND: usize = 3;

/// Biquad filter shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterShape {
    Peak,
    LowShelf,
    HighShelf,
}

/// Normalised biquad coefficients
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::unity()
    }
}

impl BiquadCoeffs {
    /// Pass-through coefficients
    pub(crate) fn unity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Calculate coefficients using the Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub(crate) fn calculate(
        shape: FilterShape,
        sample_rate: u32,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        let sample_rate = sample_rate as f64;
        // Keep the corner below Nyquist so low sample rates stay stable
        let freq = frequency.clamp(1.0, sample_rate * 0.49);
        let q = q.max(0.01);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match shape {
            FilterShape::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterShape::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterShape::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response in dB at a frequency
    pub(crate) fn magnitude_db(&self, frequency: f64, sample_rate: u32) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate as f64;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num / den).log10()
    }
}

/// Biquad filter history for one channel
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    #[inline]
    pub(crate) fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Parameter name for a band
pub fn band_param(band: usize, field: &str) -> String {
    format!("band{}_{}", band, field)
}

fn eq_specs(bands: usize) -> Vec<ParamSpec> {
    (0..bands)
        .flat_map(|i| {
            [
                ParamSpec::new(band_param(i, "center_hz"), 20.0, 20000.0, DEFAULT_CENTERS[i]),
                ParamSpec::new(band_param(i, "gain_db"), -24.0, 24.0, 0.0),
                ParamSpec::new(band_param(i, "q"), 0.1, 10.0, 1.0),
            ]
        })
        .collect()
}

/// Parametric EQ with up to eight peaking bands
#[derive(Debug)]
pub struct ParametricEq {
    params: Arc<ParamSet>,
    bands: usize,
    sample_rate: u32,
    channels: usize,
    seen_version: Option<u64>,
    coeffs: Vec<BiquadCoeffs>,
    /// `states[band][channel]`
    states: Vec<Vec<BiquadState>>,
}

impl ParametricEq {
    /// Create an EQ with the given number of bands, all flat
    pub fn with_bands(bands: usize) -> Result<Self> {
        if bands == 0 || bands > MAX_BANDS {
            return Err(AuraError::InvalidParameter {
                stage: StageKind::ParametricEq.to_string(),
                param: "bands".to_string(),
                value: bands as f64,
                min: 1.0,
                max: MAX_BANDS as f64,
            });
        }
        let params = Arc::new(ParamSet::new(
            StageKind::ParametricEq.as_str(),
            eq_specs(bands),
        ));
        Ok(Self::from_params(params, bands))
    }

    fn from_params(params: Arc<ParamSet>, bands: usize) -> Self {
        let mut eq = Self {
            params,
            bands,
            sample_rate: 44100,
            channels: 2,
            seen_version: None,
            coeffs: vec![BiquadCoeffs::unity(); bands],
            states: Vec::new(),
        };
        eq.prepare(44100, 2);
        eq
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands
    }

    /// Combined magnitude response of all bands in dB
    pub fn response_db(&mut self, frequency: f64) -> f64 {
        self.update_coefficients();
        self.coeffs
            .iter()
            .map(|c| c.magnitude_db(frequency, self.sample_rate))
            .sum()
    }

    fn update_coefficients(&mut self) {
        let version = self.params.version();
        if self.seen_version == Some(version) {
            return;
        }
        for (band, coeffs) in self.coeffs.iter_mut().enumerate() {
            let base = band * PARAMS_PER_BAND;
            *coeffs = BiquadCoeffs::calculate(
                FilterShape::Peak,
                self.sample_rate,
                self.params.value(base),
                self.params.value(base + 1),
                self.params.value(base + 2),
            );
        }
        self.seen_version = Some(version);
    }
}

impl Effect for ParametricEq {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != self.channels || buffer.sample_rate() != self.sample_rate {
            self.prepare(buffer.sample_rate(), buffer.channels());
        }
        self.update_coefficients();

        for frame in buffer.frames_mut() {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let mut x = *sample;
                for (coeffs, states) in self.coeffs.iter().zip(self.states.iter_mut()) {
                    x = states[ch].process(x, coeffs);
                }
                *sample = x;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.states = vec![vec![BiquadState::default(); channels]; self.bands];
        self.seen_version = None;
    }

    fn reset(&mut self) {
        for band in &mut self.states {
            for state in band {
                state.reset();
            }
        }
    }

    fn kind(&self) -> StageKind {
        StageKind::ParametricEq
    }

    fn params(&self) -> &Arc<ParamSet> {
        &self.params
    }

    fn duplicate(&self) -> Self {
        let mut copy = Self::from_params(Arc::new(self.params.duplicate()), self.bands);
        copy.prepare(self.sample_rate, self.channels);
        copy
    }
}
