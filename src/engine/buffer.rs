//! Sample Buffer
//!
//! The unit of audio every stage, deck and codec operates on.
//! Samples are 64-bit floats stored interleaved: `[L0, R0, L1, R1, ...]`.

use num_traits::Float;

use crate::error::{AuraError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Floor used when converting silence to decibels
pub const SILENCE_FLOOR_DB: f64 = -120.0;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear<T: Float>(db: T) -> T {
    let ten = T::from(10.0).unwrap_or_else(T::one);
    let twenty = T::from(20.0).unwrap_or_else(T::one);
    ten.powf(db / twenty)
}

/// Convert linear amplitude to decibels
///
/// Returns [`SILENCE_FLOOR_DB`] for zero or negative input so callers in the
/// processing path never see `-inf`.
#[inline]
pub fn linear_to_db<T: Float>(linear: T) -> T {
    let floor = T::from(SILENCE_FLOOR_DB).unwrap_or_else(T::neg_infinity);
    if linear <= T::zero() {
        return floor;
    }
    let twenty = T::from(20.0).unwrap_or_else(T::one);
    (twenty * linear.log10()).max(floor)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Result<Self> {
        match count {
            1 => Ok(ChannelLayout::Mono),
            2 => Ok(ChannelLayout::Stereo),
            _ => Err(AuraError::InvalidBuffer {
                reason: format!("{} channels (only mono and stereo are supported)", count),
            }),
        }
    }
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Interleaved 64-bit audio buffer
///
/// Sample rate and channel layout are fixed for the lifetime of the buffer.
/// Stages mutate samples in place but never change the frame count.
///
/// # Example
/// ```
/// use aura::engine::{ChannelLayout, SampleBuffer};
///
/// let buffer = SampleBuffer::silence(ChannelLayout::Stereo, 1024, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.num_frames(), 1024);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f64>,
    layout: ChannelLayout,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer of `num_frames` frames of silence
    pub fn silence(layout: ChannelLayout, num_frames: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; num_frames * layout.num_channels()],
            layout,
            sample_rate,
        }
    }

    /// Create a buffer from existing interleaved samples
    pub fn from_interleaved(samples: Vec<f64>, channels: usize, sample_rate: u32) -> Result<Self> {
        let layout = ChannelLayout::from_count(channels)?;
        if samples.len() % channels != 0 {
            return Err(AuraError::InvalidBuffer {
                reason: format!(
                    "sample count {} is not divisible by channel count {}",
                    samples.len(),
                    channels
                ),
            });
        }
        if sample_rate == 0 {
            return Err(AuraError::InvalidBuffer {
                reason: "sample rate must be non-zero".to_string(),
            });
        }
        Ok(Self {
            samples,
            layout,
            sample_rate,
        })
    }

    /// Create a buffer from a list of frames
    pub fn from_frames<const N: usize>(frames: &[[f64; N]], sample_rate: u32) -> Result<Self> {
        let samples = frames.iter().flat_map(|f| f.iter().copied()).collect();
        Self::from_interleaved(samples, N, sample_rate)
    }

    /// Generate a mono sine wave
    pub fn sine(frequency: f64, amplitude: f64, num_frames: usize, sample_rate: u32) -> Self {
        let w = 2.0 * std::f64::consts::PI * frequency / sample_rate as f64;
        Self {
            samples: (0..num_frames).map(|i| amplitude * (w * i as f64).sin()).collect(),
            layout: ChannelLayout::Mono,
            sample_rate,
        }
    }

    /// Generate a stereo signal with a different sine in each channel
    pub fn stereo_sine(
        freq_left: f64,
        freq_right: f64,
        amplitude: f64,
        num_frames: usize,
        sample_rate: u32,
    ) -> Self {
        let wl = 2.0 * std::f64::consts::PI * freq_left / sample_rate as f64;
        let wr = 2.0 * std::f64::consts::PI * freq_right / sample_rate as f64;
        let mut samples = Vec::with_capacity(num_frames * 2);
        for i in 0..num_frames {
            samples.push(amplitude * (wl * i as f64).sin());
            samples.push(amplitude * (wr * i as f64).sin());
        }
        Self {
            samples,
            layout: ChannelLayout::Stereo,
            sample_rate,
        }
    }

    /// Channel layout
    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Number of channels (1 or 2)
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.num_channels()
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.channels()
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// All interleaved samples
    #[inline]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// All interleaved samples, mutable
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Consume the buffer, returning the interleaved samples
    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Iterate over frames
    pub fn frames(&self) -> std::slice::ChunksExact<'_, f64> {
        self.samples.chunks_exact(self.layout.num_channels())
    }

    /// Iterate over frames, mutable
    pub fn frames_mut(&mut self) -> std::slice::ChunksExactMut<'_, f64> {
        self.samples.chunks_exact_mut(self.layout.num_channels())
    }

    /// Get one frame
    pub fn frame(&self, index: usize) -> Result<&[f64]> {
        let channels = self.channels();
        let len = self.num_frames();
        if index >= len {
            return Err(AuraError::OutOfRange { index, len });
        }
        Ok(&self.samples[index * channels..(index + 1) * channels])
    }

    /// Get a sample at the given frame and channel
    pub fn sample(&self, frame: usize, channel: usize) -> Result<f64> {
        let idx = self.index_of(frame, channel)?;
        Ok(self.samples[idx])
    }

    /// Set a sample at the given frame and channel
    pub fn set_sample(&mut self, frame: usize, channel: usize, value: f64) -> Result<()> {
        let idx = self.index_of(frame, channel)?;
        self.samples[idx] = value;
        Ok(())
    }

    fn index_of(&self, frame: usize, channel: usize) -> Result<usize> {
        let channels = self.channels();
        if channel >= channels {
            return Err(AuraError::OutOfRange {
                index: channel,
                len: channels,
            });
        }
        let len = self.num_frames();
        if frame >= len {
            return Err(AuraError::OutOfRange { index: frame, len });
        }
        Ok(frame * channels + channel)
    }

    /// Copy `len` frames starting at `start` into a new buffer
    ///
    /// The copy is truncated at the end of the buffer.
    pub fn slice(&self, start: usize, len: usize) -> Result<SampleBuffer> {
        let total = self.num_frames();
        if start > total {
            return Err(AuraError::OutOfRange {
                index: start,
                len: total,
            });
        }
        let end = (start + len).min(total);
        let channels = self.channels();
        Ok(Self {
            samples: self.samples[start * channels..end * channels].to_vec(),
            layout: self.layout,
            sample_rate: self.sample_rate,
        })
    }

    /// Append the frames of another buffer with the same format
    pub fn append(&mut self, other: &SampleBuffer) -> Result<()> {
        if other.layout != self.layout || other.sample_rate != self.sample_rate {
            return Err(AuraError::InvalidBuffer {
                reason: format!(
                    "cannot append {}ch/{}Hz to {}ch/{}Hz",
                    other.channels(),
                    other.sample_rate,
                    self.channels(),
                    self.sample_rate
                ),
            });
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Copy into a stereo buffer, duplicating mono content to both channels
    pub fn to_stereo(&self) -> SampleBuffer {
        match self.layout {
            ChannelLayout::Stereo => self.clone(),
            ChannelLayout::Mono => Self {
                samples: self.samples.iter().flat_map(|&s| [s, s]).collect(),
                layout: ChannelLayout::Stereo,
                sample_rate: self.sample_rate,
            },
        }
    }

    /// Resample to a different rate using linear interpolation
    pub fn resampled(&self, target_rate: u32) -> SampleBuffer {
        if target_rate == self.sample_rate || self.is_empty() {
            return Self {
                samples: self.samples.clone(),
                layout: self.layout,
                sample_rate: target_rate,
            };
        }

        let channels = self.channels();
        let source_len = self.num_frames();
        let ratio = target_rate as f64 / self.sample_rate as f64;
        let target_len = ((source_len as f64) * ratio).ceil() as usize;
        let mut samples = Vec::with_capacity(target_len * channels);

        for i in 0..target_len {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos - src_idx as f64;
            for ch in 0..channels {
                let sample = if src_idx + 1 < source_len {
                    let a = self.samples[src_idx * channels + ch];
                    let b = self.samples[(src_idx + 1) * channels + ch];
                    a * (1.0 - frac) + b * frac
                } else if src_idx < source_len {
                    self.samples[src_idx * channels + ch]
                } else {
                    0.0
                };
                samples.push(sample);
            }
        }

        Self {
            samples,
            layout: self.layout,
            sample_rate: target_rate,
        }
    }

    /// Multiply every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f64) {
        for s in &mut self.samples {
            *s *= gain;
        }
    }

    /// Absolute peak across all channels (linear)
    pub fn peak(&self) -> f64 {
        self.samples.iter().fold(0.0_f64, |acc, &s| acc.max(s.abs()))
    }

    /// Absolute peak across all channels in dBFS
    pub fn peak_db(&self) -> f64 {
        linear_to_db(self.peak())
    }

    /// RMS level across all channels in dBFS
    pub fn rms_db(&self) -> f64 {
        if self.samples.is_empty() {
            return SILENCE_FLOOR_DB;
        }
        let sum_sq: f64 = self.samples.iter().map(|s| s * s).sum();
        linear_to_db((sum_sq / self.samples.len() as f64).sqrt())
    }

    /// Check that the buffer contains no NaN or infinite samples
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Check if every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_silence_buffer() {
        let buf = SampleBuffer::silence(ChannelLayout::Stereo, 1000, 44100);
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.num_frames(), 1000);
        assert_eq!(buf.sample_rate(), 44100);
        assert!(buf.is_silent());
    }

    #[test]
    fn test_from_interleaved_rejects_odd_length() {
        let result = SampleBuffer::from_interleaved(vec![0.0; 5], 2, 44100);
        assert!(matches!(result, Err(AuraError::InvalidBuffer { .. })));
    }

    #[test]
    fn test_from_interleaved_rejects_surround() {
        let result = SampleBuffer::from_interleaved(vec![0.0; 6], 6, 44100);
        assert!(matches!(result, Err(AuraError::InvalidBuffer { .. })));
    }

    #[test]
    fn test_get_set() {
        let mut buf = SampleBuffer::silence(ChannelLayout::Stereo, 100, 44100);
        buf.set_sample(0, 0, 0.5).unwrap();
        buf.set_sample(0, 1, -0.5).unwrap();
        assert_eq!(buf.sample(0, 0).unwrap(), 0.5);
        assert_eq!(buf.frame(0).unwrap(), &[0.5, -0.5]);
    }

    #[test]
    fn test_out_of_range() {
        let buf = SampleBuffer::silence(ChannelLayout::Mono, 10, 44100);
        assert!(matches!(
            buf.sample(10, 0),
            Err(AuraError::OutOfRange { index: 10, len: 10 })
        ));
        assert!(matches!(
            buf.sample(0, 1),
            Err(AuraError::OutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_slice_truncates_at_end() {
        let buf = SampleBuffer::sine(440.0, 0.5, 100, 44100);
        let tail = buf.slice(90, 50).unwrap();
        assert_eq!(tail.num_frames(), 10);
        assert_eq!(tail.sample(0, 0).unwrap(), buf.sample(90, 0).unwrap());
        assert!(buf.slice(101, 1).is_err());
    }

    #[test]
    fn test_to_stereo_duplicates_mono() {
        let buf = SampleBuffer::from_interleaved(vec![0.1, 0.2], 1, 44100).unwrap();
        let stereo = buf.to_stereo();
        assert_eq!(stereo.samples(), &[0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_resample_doubles_length() {
        let buf = SampleBuffer::sine(100.0, 0.5, 1000, 22050);
        let up = buf.resampled(44100);
        assert_eq!(up.sample_rate(), 44100);
        assert_eq!(up.num_frames(), 2000);
        // Even output frames land exactly on source frames
        assert_relative_eq!(up.sample(200, 0).unwrap(), buf.sample(100, 0).unwrap());
    }

    #[test]
    fn test_rms_of_sine() {
        let buf = SampleBuffer::sine(441.0, 1.0, 44100, 44100);
        // RMS of a unit sine is 1/sqrt(2) = -3.01 dB
        assert!((buf.rms_db() - (-3.01)).abs() < 0.05);
    }

    #[test]
    fn test_db_conversions() {
        assert_relative_eq!(db_to_linear(-6.0_f64), 0.501187, epsilon = 1e-5);
        assert_relative_eq!(linear_to_db(0.1_f64), -20.0, epsilon = 1e-9);
        assert_eq!(linear_to_db(0.0_f64), SILENCE_FLOOR_DB);
    }
}
