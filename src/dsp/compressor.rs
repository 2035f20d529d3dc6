//! Compressor
//!
//! Feed-forward dynamics processor with a linked-stereo level detector,
//! hard-knee gain computer and attack/release smoothing of the gain
//! reduction. The detector is either instantaneous peak or a short RMS
//! window, selected by the `detection` parameter.

use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::SampleBuffer;

const THRESHOLD_DB: usize = 0;
const RATIO: usize = 1;
const ATTACK_MS: usize = 2;
const RELEASE_MS: usize = 3;
const MAKEUP_GAIN_DB: usize = 4;
const DETECTION: usize = 5;

/// Averaging window of the RMS detector
const RMS_WINDOW_MS: f64 = 10.0;

/// Level detection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Instantaneous absolute peak across channels
    Peak,
    /// Exponentially averaged mean square over ~10 ms
    Rms,
}

impl Detection {
    fn from_param(value: f64) -> Self {
        if value >= 0.5 {
            Detection::Rms
        } else {
            Detection::Peak
        }
    }
}

/// Calculate envelope coefficient from a time constant
#[inline]
pub(crate) fn time_to_coeff(time_ms: f64, sample_rate: u32) -> f64 {
    let samples = sample_rate as f64 * time_ms / 1000.0;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Compressor dynamics processor
///
/// # Parameters
/// - `threshold_db`: -60 to 0 dB
/// - `ratio`: 1 to 20
/// - `attack_ms`: 0.1 to 100 ms
/// - `release_ms`: 10 to 1000 ms
/// - `makeup_gain_db`: 0 to 24 dB
/// - `detection`: 0 = peak, 1 = RMS
#[derive(Debug)]
pub struct Compressor {
    params: Arc<ParamSet>,
    sample_rate: u32,
    channels: usize,
    /// Smoothed gain reduction in dB (positive = attenuating)
    envelope_db: f64,
    /// Running mean square for the RMS detector
    mean_square: f64,
}

impl Compressor {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::Compressor.as_str(),
            vec![
                ParamSpec::new("threshold_db", -60.0, 0.0, -18.0),
                ParamSpec::new("ratio", 1.0, 20.0, 4.0),
                ParamSpec::new("attack_ms", 0.1, 100.0, 10.0),
                ParamSpec::new("release_ms", 10.0, 1000.0, 100.0),
                ParamSpec::new("makeup_gain_db", 0.0, 24.0, 0.0),
                ParamSpec::new("detection", 0.0, 1.0, 0.0),
            ],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self {
            params,
            sample_rate: 44100,
            channels: 2,
            envelope_db: 0.0,
            mean_square: 0.0,
        }
    }

    /// Current gain reduction in dB, for metering
    pub fn gain_reduction_db(&self) -> f64 {
        self.envelope_db
    }

    /// Static gain computer: reduction in dB for a detected level
    pub fn compute_gain_reduction_db(level_db: f64, threshold_db: f64, ratio: f64) -> f64 {
        if level_db <= threshold_db {
            return 0.0;
        }
        let ratio = ratio.max(1.0);
        (level_db - threshold_db) * (1.0 - 1.0 / ratio)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Compressor {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != self.channels || buffer.sample_rate() != self.sample_rate {
            self.prepare(buffer.sample_rate(), buffer.channels());
        }

        // Parameters are sampled once per block
        let threshold_db = self.params.value(THRESHOLD_DB);
        let ratio = self.params.value(RATIO);
        let attack_coeff = time_to_coeff(self.params.value(ATTACK_MS), self.sample_rate);
        let release_coeff = time_to_coeff(self.params.value(RELEASE_MS), self.sample_rate);
        let makeup_db = self.params.value(MAKEUP_GAIN_DB);
        let detection = Detection::from_param(self.params.value(DETECTION));
        let rms_coeff = time_to_coeff(RMS_WINDOW_MS, self.sample_rate);

        for frame in buffer.frames_mut() {
            let peak = frame.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
            let level = match detection {
                Detection::Peak => peak,
                Detection::Rms => {
                    self.mean_square = rms_coeff * self.mean_square + (1.0 - rms_coeff) * peak * peak;
                    self.mean_square.sqrt()
                }
            };

            let target_db = Self::compute_gain_reduction_db(linear_to_db(level), threshold_db, ratio);
            let coeff = if target_db > self.envelope_db {
                attack_coeff
            } else {
                release_coeff
            };
            self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target_db;

            let gain = db_to_linear(makeup_db - self.envelope_db);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.reset();
    }

    fn reset(&mut self) {
        self.envelope_db = 0.0;
        self.mean_square = 0.0;
    }

    fn kind(&self) -> StageKind {
        StageKind::Compressor
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_abs_diff_eq;

    fn constant_buffer(value: f64, frames: usize) -> SampleBuffer {
        SampleBuffer::from_interleaved(vec![value; frames * 2], 2, 44100).unwrap()
    }

    #[test]
    fn test_default_params() {
        let comp = Compressor::new();
        let p = comp.params();
        assert_eq!(p.get("threshold_db").unwrap(), -18.0);
        assert_eq!(p.get("ratio").unwrap(), 4.0);
        assert_eq!(p.get("attack_ms").unwrap(), 10.0);
        assert_eq!(p.get("release_ms").unwrap(), 100.0);
        assert_eq!(p.get("makeup_gain_db").unwrap(), 0.0);
    }

    #[test]
    fn test_gain_computer() {
        // Below and at threshold: nothing
        assert_eq!(Compressor::compute_gain_reduction_db(-30.0, -20.0, 4.0), 0.0);
        assert_eq!(Compressor::compute_gain_reduction_db(-20.0, -20.0, 4.0), 0.0);
        // 8 dB over at 4:1 -> 6 dB reduction
        assert_abs_diff_eq!(
            Compressor::compute_gain_reduction_db(-12.0, -20.0, 4.0),
            6.0,
            epsilon = 1e-12
        );
        // 1:1 never reduces
        assert_eq!(Compressor::compute_gain_reduction_db(0.0, -20.0, 1.0), 0.0);
    }

    #[test]
    fn test_smoothing_coefficient() {
        let coeff = time_to_coeff(10.0, 44100);
        assert_abs_diff_eq!(coeff, (-1.0_f64 / 441.0).exp(), epsilon = 1e-15);
        assert_eq!(time_to_coeff(0.0, 44100), 0.0);
    }

    #[test]
    fn test_below_threshold_untouched() {
        let mut comp = Compressor::new();
        comp.params().set("threshold_db", -10.0).unwrap();
        comp.prepare(44100, 2);

        let mut buffer = constant_buffer(0.1, 1000); // -20 dB
        comp.process(&mut buffer);
        assert_abs_diff_eq!(buffer.sample(999, 0).unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_settles_to_static_curve() {
        let mut comp = Compressor::new();
        comp.params().set("threshold_db", -20.0).unwrap();
        comp.params().set("ratio", 4.0).unwrap();
        comp.params().set("attack_ms", 1.0).unwrap();
        comp.prepare(44100, 2);

        // -6.02 dB input, 13.98 dB over -> 10.49 dB reduction
        let mut buffer = constant_buffer(0.5, 44100);
        comp.process(&mut buffer);
        let expected_db = Compressor::compute_gain_reduction_db(linear_to_db(0.5), -20.0, 4.0);
        assert_abs_diff_eq!(comp.gain_reduction_db(), expected_db, epsilon = 1e-6);
        let out = buffer.sample(44099, 0).unwrap();
        assert_abs_diff_eq!(out, 0.5 * db_to_linear(-expected_db), epsilon = 1e-6);
    }

    #[test]
    fn test_makeup_gain() {
        let mut comp = Compressor::new();
        comp.params().set("threshold_db", 0.0).unwrap();
        comp.params().set("makeup_gain_db", 6.0).unwrap();
        let mut buffer = constant_buffer(0.1, 10);
        comp.process(&mut buffer);
        assert_abs_diff_eq!(buffer.sample(5, 1).unwrap(), 0.1 * db_to_linear(6.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rms_detection_reacts_slower() {
        let mut peak = Compressor::new();
        peak.params().set("attack_ms", 0.1).unwrap();
        let mut rms = Compressor::new();
        rms.params().set("attack_ms", 0.1).unwrap();
        rms.params().set("detection", 1.0).unwrap();

        let mut a = constant_buffer(0.9, 44);
        let mut b = a.clone();
        peak.process(&mut a);
        rms.process(&mut b);
        assert!(peak.gain_reduction_db() > rms.gain_reduction_db());
    }

    #[test]
    fn test_linked_stereo() {
        let mut comp = Compressor::new();
        comp.params().set("threshold_db", -20.0).unwrap();
        comp.params().set("attack_ms", 0.1).unwrap();
        let mut frames = Vec::new();
        for _ in 0..2000 {
            frames.push([0.9, 0.1]);
        }
        let mut buffer = SampleBuffer::from_frames(&frames, 44100).unwrap();
        comp.process(&mut buffer);
        let left = buffer.sample(1999, 0).unwrap();
        let right = buffer.sample(1999, 1).unwrap();
        assert_abs_diff_eq!(right / left, 0.1 / 0.9, epsilon = 1e-9);
        assert!(right < 0.1);
    }

    #[test]
    fn test_silence_and_full_scale_are_finite() {
        let mut comp = Compressor::new();
        comp.params().set("ratio", 20.0).unwrap();
        let mut silence = SampleBuffer::silence(ChannelLayout::Stereo, 512, 44100);
        comp.process(&mut silence);
        assert!(silence.is_silent());

        let mut loud = constant_buffer(1.0, 512);
        comp.process(&mut loud);
        assert!(loud.is_finite());
    }

    #[test]
    fn test_reset_clears_envelope() {
        let mut comp = Compressor::new();
        let mut buffer = constant_buffer(0.9, 1000);
        comp.process(&mut buffer);
        assert!(comp.gain_reduction_db() > 0.0);
        comp.reset();
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }
}
