//! Stereo Widener
//!
//! Mid/side width control. `width` scales the side signal: 0 collapses to
//! mono, 1 is unchanged, 2 doubles the side content. Mono buffers pass
//! through untouched.

use std::sync::Arc;

use super::effect::{Effect, StageKind};
use super::params::{ParamSet, ParamSpec};
use crate::engine::SampleBuffer;

const WIDTH: usize = 0;

/// Mid/side stereo widener
#[derive(Debug)]
pub struct StereoWidener {
    params: Arc<ParamSet>,
}

impl StereoWidener {
    pub fn new() -> Self {
        Self::from_params(Arc::new(ParamSet::new(
            StageKind::StereoWidener.as_str(),
            vec![ParamSpec::new("width", 0.0, 2.0, 1.0)],
        )))
    }

    fn from_params(params: Arc<ParamSet>) -> Self {
        Self { params }
    }
}

impl Default for StereoWidener {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for StereoWidener {
    fn process(&mut self, buffer: &mut SampleBuffer) {
        if buffer.channels() != 2 {
            return;
        }
        let width = self.params.value(WIDTH);
        if width == 1.0 {
            return;
        }

        for frame in buffer.frames_mut() {
            let mid = (frame[0] + frame[1]) * 0.5;
            let side = (frame[0] - frame[1]) * 0.5 * width;
            frame[0] = mid + side;
            frame[1] = mid - side;
        }
    }

    fn prepare(&mut self, _sample_rate: u32, _channels: usize) {}

    fn reset(&mut self) {}

    fn kind(&self) -> StageKind {
        StageKind::StereoWidener
    }

    fn params(&self) -> &Arc<ParamSet> {
        &self.params
    }

    fn duplicate(&self) -> Self {
        Self::from_params(Arc::new(self.params.duplicate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn widen(width: f64, buffer: &mut SampleBuffer) {
        let mut widener = StereoWidener::new();
        widener.params().set("width", width).unwrap();
        widener.process(buffer);
    }

    #[test]
    fn test_unity_width_is_identity() {
        let mut buffer = SampleBuffer::stereo_sine(300.0, 500.0, 0.7, 2048, 44100);
        let original = buffer.clone();
        widen(1.0, &mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_zero_width_collapses_to_mid() {
        let mut buffer = SampleBuffer::from_frames(&[[0.8, 0.2], [-0.4, 0.6]], 44100).unwrap();
        widen(0.0, &mut buffer);
        assert_abs_diff_eq!(buffer.sample(0, 0).unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(buffer.sample(0, 1).unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(buffer.sample(1, 0).unwrap(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(buffer.sample(1, 1).unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_double_width_doubles_side() {
        let mut buffer = SampleBuffer::from_frames(&[[0.6, 0.2]], 44100).unwrap();
        widen(2.0, &mut buffer);
        // mid 0.4, side 0.2 -> 0.4
        assert_abs_diff_eq!(buffer.sample(0, 0).unwrap(), 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(buffer.sample(0, 1).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mono_is_passthrough() {
        let mut buffer = SampleBuffer::sine(440.0, 0.5, 512, 44100);
        let original = buffer.clone();
        widen(2.0, &mut buffer);
        assert_eq!(buffer, original);
    }
}
