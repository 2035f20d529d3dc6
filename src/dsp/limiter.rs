//! Limiter Effect
//!
//! Brickwall peak limiter. Keeps every output sample at or below the
//! ceiling with zero look-ahead: gain drops instantly when a frame would
//! exceed the ceiling and recovers exponentially over the release time.

use std::sync::Arc;

use super::compressor::time_to_coeff;
use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::buffer::db_to_linear;
use crate::engine::SampleBuffer;

// ============================================================================
// Constants
// ============================================================================

const CEILING_DB: usize = 0;
const RELEASE_MS: usize = 1;

// ============================================================================
// Limiter Effect
// ============================================================================

/// Brickwall limiter
///
/// Detection is linked across channels so the stereo image is preserved.
///
/// # Parameters
/// - `ceiling_db`: Maximum output level (-24 to 0 dB)
/// - `release_ms`: Release time for gain recovery (1 to 1000 ms)
#[derive(Debug)]
pub struct Limiter {
    params: Arc<ParamSet>,
    sample_rate: u32,
    channels: usize,
    /// Current linear gain, 1.0 when idle
    gain: f64,
}

impl Limiter {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::Limiter.as_str(),
            vec![
                ParamSpec::new("ceiling_db", -24.0, 0.0, -1.0),
                ParamSpec::new("release_ms", 1.0, 1000.0, 100.0),
            ],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self {
            params,
            sample_rate: 44100,
            channels: 2,
            gain: 1.0,
        }
    }

    /// Current gain reduction in dB (0 when not limiting)
    pub fn gain_reduction_db(&self) -> f64 {
        -20.0 * self.gain.max(f64::MIN_POSITIVE).log10()
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Limiter {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != self.channels || buffer.sample_rate() != self.sample_rate {
            self.prepare(buffer.sample_rate(), buffer.channels());
        }

        let ceiling = db_to_linear(self.params.value(CEILING_DB));
        let release = time_to_coeff(self.params.value(RELEASE_MS), self.sample_rate);

        for frame in buffer.frames_mut() {
            let peak = frame.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
            let target = if peak > ceiling { ceiling / peak } else { 1.0 };

            self.gain = if target < self.gain {
                target
            } else {
                release * self.gain + (1.0 - release) * target
            };

            for sample in frame.iter_mut() {
                *sample = (*sample * self.gain).clamp(-ceiling, ceiling);
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.reset();
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn kind(&self) -> StageKind {
        StageKind::Limiter
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test]
    fn test_limiter_defaults() {
        let limiter = Limiter::new();
        assert_eq!(limiter.params().get("ceiling_db").unwrap(), -1.0);
        assert_eq!(limiter.params().get("release_ms").unwrap(), 100.0);
        assert_eq!(limiter.gain_reduction_db(), 0.0);
    }

    #[test_case(0.0 ; "zero dBFS")]
    #[test_case(-1.0 ; "minus one")]
    #[test_case(-6.0 ; "minus six")]
    #[test_case(-24.0 ; "floor")]
    fn test_output_never_exceeds_ceiling(ceiling_db: f64) {
        let mut limiter = Limiter::new();
        limiter.params().set("ceiling_db", ceiling_db).unwrap();

        let mut buffer = SampleBuffer::stereo_sine(440.0, 660.0, 4.0, 8192, 44100);
        limiter.process(&mut buffer);
        assert!(buffer.peak() <= db_to_linear(ceiling_db) + 1e-12);
    }

    #[test]
    fn test_below_ceiling_passes_through() {
        let mut limiter = Limiter::new();
        let mut buffer = SampleBuffer::sine(440.0, 0.5, 4096, 44100);
        let original = buffer.clone();
        limiter.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_gain_recovers_after_release() {
        let mut limiter = Limiter::new();
        limiter.params().set("ceiling_db", -6.0).unwrap();
        limiter.params().set("release_ms", 10.0).unwrap();

        let mut loud = SampleBuffer::from_interleaved(vec![1.0; 200], 2, 44100).unwrap();
        limiter.process(&mut loud);
        assert!(limiter.gain_reduction_db() > 5.9);

        // 100 ms of quiet material is ten release time constants
        let mut quiet = SampleBuffer::from_interleaved(vec![0.01; 8820], 2, 44100).unwrap();
        limiter.process(&mut quiet);
        assert_abs_diff_eq!(limiter.gain_reduction_db(), 0.0, epsilon = 0.01);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut limiter = Limiter::new();
        let mut buffer = SampleBuffer::silence(ChannelLayout::Stereo, 512, 44100);
        limiter.process(&mut buffer);
        assert!(buffer.is_silent());
    }

    #[test]
    fn test_linked_channels_keep_balance() {
        let mut limiter = Limiter::new();
        limiter.params().set("ceiling_db", -6.0).unwrap();
        let mut buffer = SampleBuffer::from_frames(&[[1.0, 0.25]; 64], 44100).unwrap();
        limiter.process(&mut buffer);
        let frame = buffer.frame(63).unwrap();
        assert_abs_diff_eq!(frame[1] / frame[0], 0.25, epsilon = 1e-12);
    }
}
