//! Two-deck mixer
//!
//! The mixer is the single processing timeline: every call to
//! [`Mixer::next_block`] pulls the active deck (and, during a transition,
//! the incoming deck) in lockstep, blends them through the crossfade
//! controller and applies the master volume and output clip. Output is
//! always stereo at the engine rate and exactly the requested number of
//! frames.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::buffer::{linear_to_db, ChannelLayout, SampleBuffer};
use super::crossfade::{crossfade_frames, CrossfadeController, FadeLaw};
use super::deck::{BlockResult, Deck, DeckId, Track};
use super::transport::TransportState;
use crate::config::{EngineConfig, MAX_MASTER_VOLUME};
use crate::dsp::{ChainHandle, EffectChain};
use crate::error::{AuraError, Result};

/// Time for a held peak to fall to 1/e of its value
const METER_RELEASE_MS: f64 = 300.0;

/// Something that happened while rendering a block
///
/// Every `CrossfadeStarted` is eventually followed by exactly one
/// `CrossfadeFinished` or `CrossfadeCancelled`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MixerEvent {
    CrossfadeStarted { from: DeckId, to: DeckId },
    CrossfadeFinished { active: DeckId },
    /// The incoming deck was stopped; `active` is the deck left playing
    CrossfadeCancelled { active: DeckId },
    TrackEnded { deck: DeckId },
}

/// Final stage applied after the master volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputClip {
    /// Samples pass through unchanged
    Off,
    /// `tanh` saturation
    Soft,
    /// Clamp to [-1, 1]
    #[default]
    Hard,
}

impl OutputClip {
    pub fn apply(self, buffer: &mut SampleBuffer) {
        match self {
            OutputClip::Off => {}
            OutputClip::Soft => {
                for sample in buffer.samples_mut() {
                    *sample = (*sample).tanh();
                }
            }
            OutputClip::Hard => {
                for sample in buffer.samples_mut() {
                    *sample = (*sample).clamp(-1.0, 1.0);
                }
            }
        }
    }
}

/// Block peak meter with exponential fall-off
///
/// Each update holds the louder of the new block's peak and the previous
/// reading decayed over the block's length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakMeter {
    level: f64,
    decay_per_frame: f64,
}

impl PeakMeter {
    fn new(sample_rate: u32) -> Self {
        Self {
            level: 0.0,
            decay_per_frame: (-1000.0 / (METER_RELEASE_MS * sample_rate as f64)).exp(),
        }
    }

    fn update(&mut self, buffer: &SampleBuffer) {
        let decayed = self.level * self.decay_per_frame.powf(buffer.num_frames() as f64);
        self.level = buffer.peak().max(decayed);
    }

    /// Linear peak level
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn level_db(&self) -> f64 {
        linear_to_db(self.level)
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

/// One rendered block plus the events it produced
#[derive(Debug, Clone)]
pub struct EngineBlock {
    pub buffer: SampleBuffer,
    pub events: Vec<MixerEvent>,
}

/// Dual-deck playback engine
#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    decks: [Deck; 2],
    active: DeckId,
    crossfade: Option<CrossfadeController>,
    master_volume: f64,
    output_clip: OutputClip,
    auto_crossfade: bool,
    fade_law: FadeLaw,
    fade_frames: usize,
    input_meter: PeakMeter,
    output_meter: PeakMeter,
    /// Events raised between blocks, delivered with the next one
    pending_events: Vec<MixerEvent>,
}

impl Mixer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sample_rate: config.sample_rate,
            decks: [
                Deck::new(DeckId::A, config.sample_rate),
                Deck::new(DeckId::B, config.sample_rate),
            ],
            active: DeckId::A,
            crossfade: None,
            master_volume: config.master_volume,
            output_clip: config.output_clip,
            auto_crossfade: config.crossfade.auto,
            fade_law: config.crossfade.law,
            fade_frames: crossfade_frames(config.crossfade.duration_ms, config.sample_rate)?,
            input_meter: PeakMeter::new(config.sample_rate),
            output_meter: PeakMeter::new(config.sample_rate),
            pending_events: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    /// Deck currently audible outside a transition
    pub fn active_deck(&self) -> DeckId {
        self.active
    }

    /// Make a deck the audible one; rejected during a transition
    pub fn set_active_deck(&mut self, id: DeckId) -> Result<()> {
        if self.crossfade.is_some() {
            return Err(AuraError::CrossfadeInProgress);
        }
        self.active = id;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tracks and chains
    // ------------------------------------------------------------------

    /// Decode a WAV file onto a deck
    pub fn load_track(&mut self, deck: DeckId, path: &Path) -> Result<()> {
        let track = Track::from_file(path)?;
        self.deck_mut(deck).load(track);
        Ok(())
    }

    /// Load an in-memory buffer onto a deck
    pub fn load_buffer(&mut self, deck: DeckId, name: &str, buffer: SampleBuffer) {
        self.deck_mut(deck).load(Track::new(name, buffer));
    }

    /// Replace a deck's effect chain, returning the previous one
    pub fn attach_chain(&mut self, deck: DeckId, chain: EffectChain) -> EffectChain {
        self.deck_mut(deck).attach_chain(chain)
    }

    /// Editing handle for a deck's chain
    pub fn chain_handle(&self, deck: DeckId) -> ChainHandle {
        self.deck(deck).chain_handle()
    }

    /// Update one stage parameter on a deck's chain
    pub fn set_parameter(
        &self,
        deck: DeckId,
        stage_index: usize,
        name: &str,
        value: f64,
    ) -> Result<()> {
        self.deck(deck)
            .chain()
            .update_stage_parameter(stage_index, name, value)
            .inspect_err(|err| warn!(%deck, stage_index, name, %err, "parameter rejected"))
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub fn play(&mut self, deck: DeckId) -> Result<()> {
        self.deck_mut(deck).play()
    }

    pub fn pause(&mut self, deck: DeckId) -> Result<()> {
        self.deck_mut(deck).pause()
    }

    /// Stop a deck; a transition involving it ends immediately
    pub fn stop(&mut self, deck: DeckId) {
        self.deck_mut(deck).stop();
        if let Some(fade) = &self.crossfade {
            let (from, to) = (fade.from(), fade.to());
            if from == deck {
                self.active = to;
                self.crossfade = None;
                debug!(%deck, active = %to, "outgoing deck stopped, crossfade ended");
                self.pending_events.push(MixerEvent::CrossfadeFinished { active: to });
            } else if to == deck {
                self.active = from;
                self.crossfade = None;
                debug!(%deck, "incoming deck stopped, crossfade cancelled");
                self.pending_events.push(MixerEvent::CrossfadeCancelled { active: from });
            }
        }
    }

    // ------------------------------------------------------------------
    // Mixer settings
    // ------------------------------------------------------------------

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f64) -> Result<()> {
        if !volume.is_finite() || !(0.0..=MAX_MASTER_VOLUME).contains(&volume) {
            return Err(AuraError::InvalidParameter {
                stage: "mixer".to_string(),
                param: "master_volume".to_string(),
                value: volume,
                min: 0.0,
                max: MAX_MASTER_VOLUME,
            });
        }
        self.master_volume = volume;
        Ok(())
    }

    pub fn output_clip(&self) -> OutputClip {
        self.output_clip
    }

    pub fn set_output_clip(&mut self, clip: OutputClip) {
        self.output_clip = clip;
    }

    /// Peak of the mixed decks before master volume
    pub fn input_meter(&self) -> &PeakMeter {
        &self.input_meter
    }

    /// Peak of the final output
    pub fn output_meter(&self) -> &PeakMeter {
        &self.output_meter
    }

    pub fn set_auto_crossfade(&mut self, enabled: bool) {
        self.auto_crossfade = enabled;
    }

    pub fn set_fade_law(&mut self, law: FadeLaw) {
        self.fade_law = law;
    }

    /// Window used by automatic transitions
    pub fn set_crossfade_duration(&mut self, duration_ms: f64) -> Result<()> {
        self.fade_frames = crossfade_frames(duration_ms, self.sample_rate)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Crossfades
    // ------------------------------------------------------------------

    fn check_can_start(&self, from: DeckId, to: DeckId) -> Result<()> {
        if self.crossfade.is_some() {
            return Err(AuraError::CrossfadeInProgress);
        }
        if from == to {
            return Err(AuraError::InvalidCrossfade {
                reason: format!("cannot crossfade deck {} into itself", from),
            });
        }
        if !self.deck(to).has_track() {
            return Err(AuraError::NoTrackLoaded {
                deck: to.to_string(),
            });
        }
        Ok(())
    }

    fn begin(&mut self, controller: CrossfadeController) -> Result<()> {
        let (from, to) = (controller.from(), controller.to());
        if self.deck(to).state() != TransportState::Playing {
            self.deck_mut(to).play()?;
        }
        self.active = from;
        self.crossfade = Some(controller);
        debug!(%from, %to, "crossfade started");
        self.pending_events.push(MixerEvent::CrossfadeStarted { from, to });
        Ok(())
    }

    /// Start a timed transition from one deck to the other
    pub fn start_crossfade(&mut self, from: DeckId, to: DeckId, duration_ms: f64) -> Result<()> {
        self.check_can_start(from, to)?;
        let frames = crossfade_frames(duration_ms, self.sample_rate)?;
        self.begin(CrossfadeController::timed(from, to, frames, self.fade_law)?)
    }

    /// Start a transition driven by [`set_crossfade_progress`](Self::set_crossfade_progress)
    pub fn start_manual_crossfade(&mut self, from: DeckId, to: DeckId) -> Result<()> {
        self.check_can_start(from, to)?;
        self.begin(CrossfadeController::manual(from, to, self.fade_law)?)
    }

    /// Set the position of a manual transition (0 = outgoing, 1 = incoming)
    pub fn set_crossfade_progress(&mut self, progress: f64) -> Result<()> {
        match &mut self.crossfade {
            Some(fade) => fade.set_progress(progress),
            None => Err(AuraError::InvalidCrossfade {
                reason: "no crossfade in progress".to_string(),
            }),
        }
    }

    pub fn crossfade(&self) -> Option<&CrossfadeController> {
        self.crossfade.as_ref()
    }

    /// Progress of the running transition, if any
    pub fn crossfade_progress(&self) -> Option<f64> {
        self.crossfade.as_ref().map(CrossfadeController::progress)
    }

    pub fn is_crossfading(&self) -> bool {
        self.crossfade.is_some()
    }

    /// Start the automatic transition once the active track enters the
    /// fade window. Tracks no longer than the window never trigger it.
    fn maybe_auto_crossfade(&mut self) -> Result<()> {
        if !self.auto_crossfade || self.crossfade.is_some() {
            return Ok(());
        }
        let from = self.active;
        let to = from.other();
        let active = self.deck(from);
        let track_frames = active.track().map_or(0, |track| track.num_frames());
        if !active.is_playing()
            || !self.deck(to).has_track()
            || track_frames <= self.fade_frames
            || active.remaining_frames() > self.fade_frames
        {
            return Ok(());
        }
        self.begin(CrossfadeController::timed(
            from,
            to,
            self.fade_frames,
            self.fade_law,
        )?)
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Pull `frames` stereo frames from a deck, padding with silence
    fn pull(
        &mut self,
        id: DeckId,
        frames: usize,
        events: &mut Vec<MixerEvent>,
    ) -> Result<SampleBuffer> {
        let was_playing = self.deck(id).is_playing();
        let block = match self.deck_mut(id).next_block(frames)? {
            BlockResult::Audio(block) => block.to_stereo(),
            BlockResult::EndOfTrack => {
                if was_playing {
                    info!(deck = %id, "track ended");
                    events.push(MixerEvent::TrackEnded { deck: id });
                }
                SampleBuffer::silence(ChannelLayout::Stereo, 0, self.sample_rate)
            }
        };
        if block.num_frames() < frames {
            let mut padded = block;
            padded.append(&SampleBuffer::silence(
                ChannelLayout::Stereo,
                frames - padded.num_frames(),
                self.sample_rate,
            ))?;
            return Ok(padded);
        }
        Ok(block)
    }

    fn pull_transition(
        &mut self,
        fade: &mut CrossfadeController,
        frames: usize,
        events: &mut Vec<MixerEvent>,
    ) -> Result<SampleBuffer> {
        let outgoing = self.pull(fade.from(), frames, events)?;
        let incoming = self.pull(fade.to(), frames, events)?;
        fade.mix(&outgoing, &incoming)
    }

    /// Render the next block of the mix
    pub fn next_block(&mut self, frames: usize) -> Result<EngineBlock> {
        self.maybe_auto_crossfade()?;
        let mut events = std::mem::take(&mut self.pending_events);

        let mut buffer = match self.crossfade.take() {
            Some(mut fade) => {
                let mixed = match self.pull_transition(&mut fade, frames, &mut events) {
                    Ok(mixed) => mixed,
                    Err(err) => {
                        self.crossfade = Some(fade);
                        self.pending_events = events;
                        return Err(err);
                    }
                };
                if fade.is_complete() {
                    self.deck_mut(fade.from()).stop();
                    self.active = fade.to();
                    debug!(active = %self.active, "crossfade finished");
                    events.push(MixerEvent::CrossfadeFinished {
                        active: self.active,
                    });
                } else {
                    self.crossfade = Some(fade);
                }
                mixed
            }
            None => self.pull(self.active, frames, &mut events)?,
        };

        self.input_meter.update(&buffer);
        if self.master_volume != 1.0 {
            buffer.apply_gain(self.master_volume);
        }
        self.output_clip.apply(&mut buffer);
        self.output_meter.update(&buffer);
        Ok(EngineBlock { buffer, events })
    }
}
