//! Reverb
//!
//! Freeverb topology:
//! - 8 parallel lowpass-feedback comb filters per channel
//! - 4 series allpass filters per channel for diffusion
//! - Right channel delays offset by a fixed stereo spread
//!
//! Delay line contents persist across blocks so the tail survives block
//! boundaries. Both channels are fed the mono sum of the input.

use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::SampleBuffer;

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Stereo spread offset in samples (for right channel)
const STEREO_SPREAD: usize = 23;

/// Fixed gain for allpass filters
const ALLPASS_GAIN: f64 = 0.5;

/// Input attenuation ahead of the comb bank
const INPUT_GAIN: f64 = 0.015;

/// Scale factor for room size parameter to feedback
const ROOM_SCALE: f64 = 0.28;

/// Offset for room size parameter to feedback
const ROOM_OFFSET: f64 = 0.7;

/// Scale factor for damping parameter
const DAMP_SCALE: f64 = 0.4;

const ROOM_SIZE: usize = 0;
const DAMPING: usize = 1;
const WET_LEVEL: usize = 2;
const DRY_LEVEL: usize = 3;
const WIDTH: usize = 4;

// ============================================================================
// Filter Components
// ============================================================================

/// Lowpass-feedback comb filter
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f64>,
    index: usize,
    filter_state: f64,
}

impl CombFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            index: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f64, feedback: f64, damp1: f64, damp2: f64) -> f64 {
        let output = self.buffer[self.index];
        self.filter_state = output * damp2 + self.filter_state * damp1;
        self.buffer[self.index] = input + self.filter_state * feedback;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
        self.filter_state = 0.0;
    }
}

/// Schroeder allpass filter
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f64>,
    index: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let delayed = self.buffer[self.index];
        let output = delayed - input;
        self.buffer[self.index] = input + delayed * ALLPASS_GAIN;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

/// One channel's comb bank and allpass chain
#[derive(Debug, Clone)]
struct Tank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl Tank {
    fn new(sample_rate: u32, spread: usize) -> Self {
        let scale = sample_rate as f64 / REFERENCE_SAMPLE_RATE;
        let scaled = |delay: usize| (((delay + spread) as f64) * scale).round() as usize;
        Self {
            combs: COMB_DELAYS.iter().map(|&d| CombFilter::new(scaled(d))).collect(),
            allpasses: ALLPASS_DELAYS
                .iter()
                .map(|&d| AllpassFilter::new(scaled(d)))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f64, feedback: f64, damp1: f64, damp2: f64) -> f64 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input, feedback, damp1, damp2);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
    }

    fn has_energy(&self) -> bool {
        self.combs
            .iter()
            .any(|c| c.filter_state != 0.0 || c.buffer.iter().any(|&s| s != 0.0))
            || self
                .allpasses
                .iter()
                .any(|a| a.buffer.iter().any(|&s| s != 0.0))
    }
}

// ============================================================================
// Main Reverb Effect
// ============================================================================

/// Freeverb-style reverb
///
/// # Parameters
/// - `room_size`: 0 (tiny) to 1 (huge hall)
/// - `damping`: 0 (bright) to 1 (dark)
/// - `wet_level`: 0 to 1
/// - `dry_level`: 0 to 1
/// - `width`: 0 (mono tail) to 1 (full stereo tail)
#[derive(Debug)]
pub struct Reverb {
    params: Arc<ParamSet>,
    sample_rate: u32,
    channels: usize,
    left: Tank,
    right: Tank,
}

impl Reverb {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::Reverb.as_str(),
            vec![
                ParamSpec::new("room_size", 0.0, 1.0, 0.5),
                ParamSpec::new("damping", 0.0, 1.0, 0.5),
                ParamSpec::new("wet_level", 0.0, 1.0, 0.33),
                ParamSpec::new("dry_level", 0.0, 1.0, 1.0),
                ParamSpec::new("width", 0.0, 1.0, 1.0),
            ],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self {
            params,
            sample_rate: 44100,
            channels: 2,
            left: Tank::new(44100, 0),
            right: Tank::new(44100, STEREO_SPREAD),
        }
    }

    /// True while any delay line still holds a non-zero sample
    pub fn has_tail(&self) -> bool {
        self.left.has_energy() || self.right.has_energy()
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Reverb {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != self.channels || buffer.sample_rate() != self.sample_rate {
            self.prepare(buffer.sample_rate(), buffer.channels());
        }

        let feedback = self.params.value(ROOM_SIZE) * ROOM_SCALE + ROOM_OFFSET;
        let damp2 = 1.0 - self.params.value(DAMPING) * DAMP_SCALE;
        let damp1 = 1.0 - damp2;
        let wet = self.params.value(WET_LEVEL);
        let dry = self.params.value(DRY_LEVEL);
        let width = self.params.value(WIDTH);

        // wet1 feeds the same side, wet2 the opposite side
        let wet1 = wet * (1.0 + width) / 2.0;
        let wet2 = wet * (1.0 - width) / 2.0;

        if self.channels == 1 {
            for frame in buffer.frames_mut() {
                let input = frame[0];
                let out = self.left.process(input * INPUT_GAIN, feedback, damp1, damp2);
                frame[0] = input * dry + out * wet;
            }
            return;
        }

        for frame in buffer.frames_mut() {
            let (in_l, in_r) = (frame[0], frame[1]);
            let input = (in_l + in_r) * INPUT_GAIN;
            let out_l = self.left.process(input, feedback, damp1, damp2);
            let out_r = self.right.process(input, feedback, damp1, damp2);
            frame[0] = in_l * dry + out_l * wet1 + out_r * wet2;
            frame[1] = in_r * dry + out_r * wet1 + out_l * wet2;
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.left = Tank::new(sample_rate, 0);
        self.right = Tank::new(sample_rate, STEREO_SPREAD);
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn kind(&self) -> StageKind {
        StageKind::Reverb
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

    fn impulse(channels: ChannelLayout, frames: usize) -> SampleBuffer {
        let mut buffer = SampleBuffer::silence(channels, frames, 44100);
        for ch in 0..buffer.channels() {
            buffer.set_sample(0, ch, 1.0).unwrap();
        }
        buffer
    }

    fn tail_energy(buffer: &SampleBuffer, from: usize) -> f64 {
        buffer.samples()[from * buffer.channels()..]
            .iter()
            .map(|s| s * s)
            .sum()
    }

    fn wet_only(room_size: f64, damping: f64) -> Reverb {
        let reverb = Reverb::new();
        reverb.params().set("room_size", room_size).unwrap();
        reverb.params().set("damping", damping).unwrap();
        reverb.params().set("wet_level", 1.0).unwrap();
        reverb.params().set("dry_level", 0.0).unwrap();
        reverb
    }

    #[test]
    fn test_default_params() {
        let reverb = Reverb::new();
        assert_eq!(reverb.params().get("room_size").unwrap(), 0.5);
        assert_eq!(reverb.params().get("damping").unwrap(), 0.5);
        assert_eq!(reverb.params().get("wet_level").unwrap(), 0.33);
        assert_eq!(reverb.params().get("dry_level").unwrap(), 1.0);
    }

    #[test]
    fn test_comb_filter_delay() {
        let mut comb = CombFilter::new(4);
        let out: Vec<f64> = [1.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|&x| comb.process(x, 0.5, 0.0, 1.0))
            .collect();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_delays_scale_with_sample_rate() {
        let tank = Tank::new(88200, 0);
        assert_eq!(tank.combs[0].buffer.len(), 2232);
        let spread = Tank::new(44100, STEREO_SPREAD);
        assert_eq!(spread.allpasses[3].buffer.len(), 225 + STEREO_SPREAD);
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut reverb = Reverb::new();
        let mut buffer = SampleBuffer::silence(ChannelLayout::Stereo, 4096, 44100);
        reverb.process(&mut buffer);
        assert!(buffer.is_silent());
        assert!(!reverb.has_tail());
    }

    #[test]
    fn test_tail_survives_block_boundary() {
        let mut reverb = wet_only(0.8, 0.2);
        let mut first = impulse(ChannelLayout::Stereo, 512);
        reverb.process(&mut first);
        assert!(reverb.has_tail());

        let mut second = SampleBuffer::silence(ChannelLayout::Stereo, 4096, 44100);
        reverb.process(&mut second);
        assert!(!second.is_silent());
    }

    #[test]
    fn test_room_size_affects_decay() {
        let mut small = wet_only(0.1, 0.5);
        let mut large = wet_only(0.9, 0.5);

        let mut a = impulse(ChannelLayout::Mono, 20000);
        let mut b = impulse(ChannelLayout::Mono, 20000);
        small.process(&mut a);
        large.process(&mut b);
        assert!(tail_energy(&b, 10000) > tail_energy(&a, 10000));
    }

    #[test]
    fn test_damping_changes_output() {
        let mut bright = wet_only(0.5, 0.0);
        let mut dark = wet_only(0.5, 1.0);
        let mut a = impulse(ChannelLayout::Mono, 5000);
        let mut b = impulse(ChannelLayout::Mono, 5000);
        bright.process(&mut a);
        dark.process(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stereo_tail_has_side_content() {
        let mut reverb = wet_only(0.5, 0.5);
        let mut buffer = impulse(ChannelLayout::Stereo, 8192);
        reverb.process(&mut buffer);
        let side: f64 = buffer.frames().map(|f| (f[0] - f[1]).abs()).sum();
        assert!(side > 0.0);
    }

    #[test]
    fn test_zero_width_gives_mono_tail() {
        let mut reverb = wet_only(0.5, 0.5);
        reverb.params().set("width", 0.0).unwrap();
        let mut buffer = impulse(ChannelLayout::Stereo, 8192);
        reverb.process(&mut buffer);
        for frame in buffer.frames() {
            assert!((frame[0] - frame[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reset_clears_tail() {
        let mut reverb = Reverb::new();
        let mut buffer = impulse(ChannelLayout::Stereo, 1000);
        reverb.process(&mut buffer);
        reverb.reset();
        assert!(!reverb.has_tail());
    }

    #[test]
    fn test_no_nan_at_extremes() {
        let mut reverb = wet_only(1.0, 0.0);
        let mut buffer = SampleBuffer::stereo_sine(100.0, 150.0, 1.0, 44100, 44100);
        reverb.process(&mut buffer);
        assert!(buffer.is_finite());
    }
}
