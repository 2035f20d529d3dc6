//! Crossfade controller
//!
//! Blends an outgoing and an incoming deck. The gain law `g` maps fade
//! position to amplitude; frame `k` of a timed transition uses
//! `p = k / duration` and outputs `outgoing * g(1 - p) + incoming * g(p)`.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;
use super::deck::DeckId;
use crate::error::{AuraError, Result};

/// Longest accepted transition
pub const MAX_CROSSFADE_MS: f64 = 60_000.0;

/// Gain law for both sides of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeLaw {
    /// `g(x) = sin(x * pi/2)`; constant summed power for uncorrelated material
    #[default]
    EqualPower,
    /// `g(x) = x`; constant summed amplitude
    Linear,
}

impl FadeLaw {
    /// Gain at fade position `x`, clamped to `[0, 1]`
    #[inline]
    pub fn gain(self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            FadeLaw::EqualPower => (x * FRAC_PI_2).sin(),
            FadeLaw::Linear => x,
        }
    }

    /// `(outgoing, incoming)` gains at progress `p`
    #[inline]
    pub fn gains(self, p: f64) -> (f64, f64) {
        (self.gain(1.0 - p), self.gain(p))
    }
}

/// Convert a duration to frames, enforcing the 1 frame .. 60 s bounds
pub fn crossfade_frames(duration_ms: f64, sample_rate: u32) -> Result<usize> {
    if !duration_ms.is_finite() || duration_ms <= 0.0 || duration_ms > MAX_CROSSFADE_MS {
        return Err(AuraError::InvalidCrossfade {
            reason: format!(
                "duration {} ms outside (0, {}] ms",
                duration_ms, MAX_CROSSFADE_MS
            ),
        });
    }
    let frames = (duration_ms * sample_rate as f64 / 1000.0).round() as usize;
    Ok(frames.max(1))
}

/// How progress advances
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrossfadeMode {
    /// Progress advances with every rendered frame
    Timed { duration: usize, elapsed: usize },
    /// Progress is set explicitly by the caller
    Manual { progress: f64 },
}

/// One running transition between two decks
#[derive(Debug, Clone)]
pub struct CrossfadeController {
    from: DeckId,
    to: DeckId,
    law: FadeLaw,
    mode: CrossfadeMode,
}

impl CrossfadeController {
    /// Transition that completes after `duration` frames
    pub fn timed(from: DeckId, to: DeckId, duration: usize, law: FadeLaw) -> Result<Self> {
        Self::check_decks(from, to)?;
        if duration == 0 {
            return Err(AuraError::InvalidCrossfade {
                reason: "duration must be at least one frame".to_string(),
            });
        }
        Ok(Self {
            from,
            to,
            law,
            mode: CrossfadeMode::Timed {
                duration,
                elapsed: 0,
            },
        })
    }

    /// Transition driven by [`set_progress`](Self::set_progress)
    pub fn manual(from: DeckId, to: DeckId, law: FadeLaw) -> Result<Self> {
        Self::check_decks(from, to)?;
        Ok(Self {
            from,
            to,
            law,
            mode: CrossfadeMode::Manual { progress: 0.0 },
        })
    }

    fn check_decks(from: DeckId, to: DeckId) -> Result<()> {
        if from == to {
            return Err(AuraError::InvalidCrossfade {
                reason: format!("cannot crossfade deck {} into itself", from),
            });
        }
        Ok(())
    }

    pub fn from(&self) -> DeckId {
        self.from
    }

    pub fn to(&self) -> DeckId {
        self.to
    }

    pub fn law(&self) -> FadeLaw {
        self.law
    }

    pub fn mode(&self) -> CrossfadeMode {
        self.mode
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.mode, CrossfadeMode::Manual { .. })
    }

    /// Current progress in `[0, 1]`
    pub fn progress(&self) -> f64 {
        match self.mode {
            CrossfadeMode::Timed { duration, elapsed } => {
                (elapsed as f64 / duration as f64).min(1.0)
            }
            CrossfadeMode::Manual { progress } => progress,
        }
    }

    /// Set manual progress
    pub fn set_progress(&mut self, progress: f64) -> Result<()> {
        match &mut self.mode {
            CrossfadeMode::Manual { progress: current } => {
                if !(0.0..=1.0).contains(&progress) {
                    return Err(AuraError::InvalidCrossfade {
                        reason: format!("progress {} outside [0, 1]", progress),
                    });
                }
                *current = progress;
                Ok(())
            }
            CrossfadeMode::Timed { .. } => Err(AuraError::InvalidCrossfade {
                reason: "progress can only be set on a manual crossfade".to_string(),
            }),
        }
    }

    /// True once the incoming deck has fully taken over
    pub fn is_complete(&self) -> bool {
        match self.mode {
            CrossfadeMode::Timed { duration, elapsed } => elapsed >= duration,
            CrossfadeMode::Manual { progress } => progress >= 1.0,
        }
    }

    /// Blend one block and advance the transition
    ///
    /// Both inputs must share layout, rate and length.
    pub fn mix(&mut self, outgoing: &SampleBuffer, incoming: &SampleBuffer) -> Result<SampleBuffer> {
        if outgoing.layout() != incoming.layout()
            || outgoing.num_frames() != incoming.num_frames()
            || outgoing.sample_rate() != incoming.sample_rate()
        {
            return Err(AuraError::InvalidBuffer {
                reason: "crossfade inputs differ in format or length".to_string(),
            });
        }

        let mut output = outgoing.clone();
        let channels = output.channels();
        match &mut self.mode {
            CrossfadeMode::Timed { duration, elapsed } => {
                for (k, (out, inc)) in output
                    .frames_mut()
                    .zip(incoming.samples().chunks_exact(channels))
                    .enumerate()
                {
                    let p = ((*elapsed + k) as f64 / *duration as f64).min(1.0);
                    let (g_out, g_in) = self.law.gains(p);
                    for (o, i) in out.iter_mut().zip(inc) {
                        *o = *o * g_out + i * g_in;
                    }
                }
                *elapsed += incoming.num_frames();
            }
            CrossfadeMode::Manual { progress } => {
                let (g_out, g_in) = self.law.gains(*progress);
                for (o, i) in output.samples_mut().iter_mut().zip(incoming.samples()) {
                    *o = *o * g_out + i * g_in;
                }
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn dc(value: f64, frames: usize) -> SampleBuffer {
        SampleBuffer::from_interleaved(vec![value; frames * 2], 2, 44100).unwrap()
    }

    #[test_case(FadeLaw::EqualPower ; "equal power")]
    #[test_case(FadeLaw::Linear ; "linear")]
    fn test_law_endpoints(law: FadeLaw) {
        assert_eq!(law.gain(0.0), 0.0);
        assert_abs_diff_eq!(law.gain(1.0), 1.0, epsilon = 1e-15);
        assert_eq!(law.gain(-1.0), 0.0);
        assert_abs_diff_eq!(law.gain(2.0), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_equal_power_sums_to_unity_power() {
        for i in 0..=100 {
            let (a, b) = FadeLaw::EqualPower.gains(i as f64 / 100.0);
            assert_abs_diff_eq!(a * a + b * b, 1.0, epsilon = 1e-12);
        }
        let (a, b) = FadeLaw::EqualPower.gains(0.5);
        assert_abs_diff_eq!(a, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_abs_diff_eq!(b, std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_sums_to_unity() {
        let (a, b) = FadeLaw::Linear.gains(0.25);
        assert_eq!(a + b, 1.0);
    }

    #[test]
    fn test_frame_conversion_bounds() {
        assert_eq!(crossfade_frames(1000.0, 44100).unwrap(), 44100);
        assert_eq!(crossfade_frames(0.001, 44100).unwrap(), 1);
        assert_eq!(crossfade_frames(60_000.0, 44100).unwrap(), 2_646_000);
        assert!(crossfade_frames(0.0, 44100).is_err());
        assert!(crossfade_frames(-5.0, 44100).is_err());
        assert!(crossfade_frames(60_001.0, 44100).is_err());
        assert!(crossfade_frames(f64::NAN, 44100).is_err());
    }

    #[test]
    fn test_same_deck_rejected() {
        assert!(CrossfadeController::timed(DeckId::A, DeckId::A, 10, FadeLaw::Linear).is_err());
        assert!(CrossfadeController::manual(DeckId::B, DeckId::B, FadeLaw::Linear).is_err());
        assert!(CrossfadeController::timed(DeckId::A, DeckId::B, 0, FadeLaw::Linear).is_err());
    }

    #[test]
    fn test_timed_per_frame_progress() {
        let mut fade =
            CrossfadeController::timed(DeckId::A, DeckId::B, 4, FadeLaw::Linear).unwrap();
        let out = fade.mix(&dc(1.0, 3), &dc(0.0, 3)).unwrap();
        // Outgoing gain 1 - k/4 at frame k
        assert_eq!(out.frame(0).unwrap(), &[1.0, 1.0]);
        assert_eq!(out.frame(1).unwrap(), &[0.75, 0.75]);
        assert_eq!(out.frame(2).unwrap(), &[0.5, 0.5]);
        assert!(!fade.is_complete());
        assert_eq!(fade.progress(), 0.75);

        let out = fade.mix(&dc(1.0, 3), &dc(0.0, 3)).unwrap();
        assert_eq!(out.frame(0).unwrap(), &[0.25, 0.25]);
        assert_eq!(out.frame(1).unwrap(), &[0.0, 0.0]);
        assert!(fade.is_complete());
        assert_eq!(fade.progress(), 1.0);
    }

    #[test]
    fn test_manual_progress() {
        let mut fade =
            CrossfadeController::manual(DeckId::B, DeckId::A, FadeLaw::EqualPower).unwrap();
        assert!(fade.is_manual());
        fade.set_progress(0.5).unwrap();
        let out = fade.mix(&dc(1.0, 2), &dc(1.0, 2)).unwrap();
        assert_abs_diff_eq!(out.sample(1, 0).unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert!(!fade.is_complete());

        assert!(fade.set_progress(1.5).is_err());
        assert_eq!(fade.progress(), 0.5);
        fade.set_progress(1.0).unwrap();
        assert!(fade.is_complete());
    }

    #[test]
    fn test_timed_rejects_manual_progress() {
        let mut fade =
            CrossfadeController::timed(DeckId::A, DeckId::B, 100, FadeLaw::Linear).unwrap();
        assert!(fade.set_progress(0.5).is_err());
    }

    #[test]
    fn test_mismatched_inputs() {
        let mut fade =
            CrossfadeController::timed(DeckId::A, DeckId::B, 100, FadeLaw::Linear).unwrap();
        let mono = SampleBuffer::silence(ChannelLayout::Mono, 4, 44100);
        assert!(fade.mix(&dc(0.0, 4), &mono).is_err());
        assert!(fade.mix(&dc(0.0, 4), &dc(0.0, 5)).is_err());
    }
}
