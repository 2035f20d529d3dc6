//! Playback decks
//!
//! A deck owns one loaded track, a read cursor, its own effect chain and a
//! transport state machine. Each call to [`Deck::next_block`] pulls the next
//! run of frames through the chain.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::buffer::SampleBuffer;
use super::io::read_wav_file;
use super::transport::{Transport, TransportState};
use crate::dsp::{ChainHandle, EffectChain};
use crate::error::{AuraError, Result};

/// Maximum per-deck linear gain
pub const MAX_DECK_GAIN: f64 = 2.0;

/// Deck identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    /// The opposite deck
    pub fn other(self) -> DeckId {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckId::A => write!(f, "A"),
            DeckId::B => write!(f, "B"),
        }
    }
}

/// A decoded track ready for playback
#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    buffer: Arc<SampleBuffer>,
}

impl Track {
    pub fn new(name: impl Into<String>, buffer: SampleBuffer) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::new(buffer),
        }
    }

    /// Decode a WAV file; the file stem becomes the track name
    pub fn from_file(path: &Path) -> Result<Self> {
        let buffer = read_wav_file(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, buffer))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn num_frames(&self) -> usize {
        self.buffer.num_frames()
    }
}

/// Result of pulling a block from a deck
#[derive(Debug, Clone, PartialEq)]
pub enum BlockResult {
    /// Processed (or silent) audio; the last block of a track may be short
    Audio(SampleBuffer),
    /// The track is exhausted or no track is loaded
    EndOfTrack,
}

impl BlockResult {
    pub fn is_end(&self) -> bool {
        matches!(self, BlockResult::EndOfTrack)
    }

    pub fn into_audio(self) -> Option<SampleBuffer> {
        match self {
            BlockResult::Audio(buffer) => Some(buffer),
            BlockResult::EndOfTrack => None,
        }
    }
}

/// One playback deck
#[derive(Debug)]
pub struct Deck {
    id: DeckId,
    sample_rate: u32,
    transport: Transport,
    track: Option<Track>,
    cursor: usize,
    chain: EffectChain,
    gain: f64,
}

impl Deck {
    /// Create an empty deck running at the engine sample rate
    pub fn new(id: DeckId, sample_rate: u32) -> Self {
        Self {
            id,
            sample_rate,
            transport: Transport::new(id.to_string()),
            track: None,
            cursor: 0,
            chain: EffectChain::new(format!("Deck {}", id)),
            gain: 1.0,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    /// Load a track, resampling it to the engine rate when needed
    ///
    /// Resets the cursor and chain state. A playing deck keeps playing the
    /// new track from its start.
    pub fn load(&mut self, track: Track) {
        let track = if track.buffer.sample_rate() != self.sample_rate {
            debug!(
                deck = %self.id,
                from = track.buffer.sample_rate(),
                to = self.sample_rate,
                "resampling track"
            );
            Track::new(track.name, track.buffer.resampled(self.sample_rate))
        } else {
            track
        };

        debug!(deck = %self.id, track = %track.name, frames = track.num_frames(), "load");
        self.chain.prepare(self.sample_rate, track.buffer.channels());
        self.chain.reset();
        self.cursor = 0;
        self.track = Some(track);
        self.transport.load();
    }

    fn require_track(&self) -> Result<&Track> {
        self.track.as_ref().ok_or_else(|| AuraError::NoTrackLoaded {
            deck: self.id.to_string(),
        })
    }

    pub fn play(&mut self) -> Result<()> {
        self.require_track()?;
        self.transport.play()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transport.pause()
    }

    /// Stop playback, release the track and clear chain state
    pub fn stop(&mut self) {
        self.transport.stop();
        self.track = None;
        self.cursor = 0;
        self.chain.reset();
    }

    /// Move the cursor to an absolute frame
    pub fn seek(&mut self, frame: usize) -> Result<()> {
        let len = self.require_track()?.num_frames();
        if frame > len {
            return Err(AuraError::OutOfRange { index: frame, len });
        }
        self.cursor = frame;
        Ok(())
    }

    /// Current cursor in frames
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn position_secs(&self) -> f64 {
        self.cursor as f64 / self.sample_rate as f64
    }

    /// Frames left before the end of the track (0 when nothing is loaded)
    pub fn remaining_frames(&self) -> usize {
        self.track
            .as_ref()
            .map(|t| t.num_frames().saturating_sub(self.cursor))
            .unwrap_or(0)
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Set the deck's linear output gain (0 to 2)
    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        if !gain.is_finite() || !(0.0..=MAX_DECK_GAIN).contains(&gain) {
            return Err(AuraError::InvalidParameter {
                stage: format!("deck {}", self.id),
                param: "gain".to_string(),
                value: gain,
                min: 0.0,
                max: MAX_DECK_GAIN,
            });
        }
        self.gain = gain;
        Ok(())
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut EffectChain {
        &mut self.chain
    }

    pub fn chain_handle(&self) -> ChainHandle {
        self.chain.handle()
    }

    /// Replace the deck's chain, returning the previous one
    pub fn attach_chain(&mut self, mut chain: EffectChain) -> EffectChain {
        let channels = self
            .track
            .as_ref()
            .map(|t| t.buffer.channels())
            .unwrap_or(2);
        chain.prepare(self.sample_rate, channels);
        chain.reset();
        debug!(deck = %self.id, preset = %chain.name(), "attach chain");
        std::mem::replace(&mut self.chain, chain)
    }

    /// Pull up to `frames` frames
    ///
    /// - Playing: the next processed frames; the cursor advances. At the end
    ///   of the track returns [`BlockResult::EndOfTrack`] and stops the deck.
    /// - Ready / Paused: `frames` frames of silence; the cursor is kept.
    /// - Stopped: [`BlockResult::EndOfTrack`].
    pub fn next_block(&mut self, frames: usize) -> Result<BlockResult> {
        let track = match (&self.track, self.transport.state()) {
            (_, TransportState::Stopped) | (None, _) => return Ok(BlockResult::EndOfTrack),
            (Some(track), TransportState::Ready | TransportState::Paused) => {
                return Ok(BlockResult::Audio(SampleBuffer::silence(
                    track.buffer.layout(),
                    frames,
                    self.sample_rate,
                )));
            }
            (Some(track), TransportState::Playing) => track,
        };

        if self.cursor >= track.num_frames() {
            debug!(deck = %self.id, "end of track");
            self.stop();
            return Ok(BlockResult::EndOfTrack);
        }

        let mut block = track.buffer.slice(self.cursor, frames)?;
        self.cursor += block.num_frames();
        self.chain.process(&mut block);
        if self.gain != 1.0 {
            block.apply_gain(self.gain);
        }
        Ok(BlockResult::Audio(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{PresetDescriptor, StageDescriptor};
    use crate::engine::ChannelLayout;

    fn ramp(frames: usize) -> SampleBuffer {
        let samples = (0..frames).map(|i| i as f64 / frames as f64).collect();
        SampleBuffer::from_interleaved(samples, 1, 44100).unwrap()
    }

    fn loaded(frames: usize) -> Deck {
        let mut deck = Deck::new(DeckId::A, 44100);
        deck.load(Track::new("ramp", ramp(frames)));
        deck
    }

    #[test]
    fn test_deck_id() {
        assert_eq!(DeckId::A.other(), DeckId::B);
        assert_eq!(DeckId::B.other(), DeckId::A);
        assert_eq!(DeckId::B.to_string(), "B");
    }

    #[test]
    fn test_empty_deck() {
        let mut deck = Deck::new(DeckId::B, 44100);
        assert_eq!(deck.state(), TransportState::Stopped);
        assert!(deck.next_block(64).unwrap().is_end());
        assert!(matches!(deck.play(), Err(AuraError::NoTrackLoaded { .. })));
        assert!(deck.seek(0).is_err());
        assert_eq!(deck.remaining_frames(), 0);
    }

    #[test]
    fn test_ready_outputs_silence_without_advancing() {
        let mut deck = loaded(1000);
        assert_eq!(deck.state(), TransportState::Ready);
        let block = deck.next_block(128).unwrap().into_audio().unwrap();
        assert_eq!(block.num_frames(), 128);
        assert!(block.is_silent());
        assert_eq!(deck.position(), 0);
    }

    #[test]
    fn test_plays_blocks_then_end_of_track() {
        let source = ramp(1000);
        let mut deck = loaded(1000);
        deck.play().unwrap();

        let mut collected = SampleBuffer::silence(ChannelLayout::Mono, 0, 44100);
        let mut sizes = Vec::new();
        loop {
            match deck.next_block(300).unwrap() {
                BlockResult::Audio(block) => {
                    sizes.push(block.num_frames());
                    collected.append(&block).unwrap();
                }
                BlockResult::EndOfTrack => break,
            }
        }
        assert_eq!(sizes, vec![300, 300, 300, 100]);
        assert_eq!(collected, source);
        assert_eq!(deck.state(), TransportState::Stopped);
        assert!(!deck.has_track());
        assert!(deck.next_block(300).unwrap().is_end());
    }

    #[test]
    fn test_pause_keeps_cursor() {
        let mut deck = loaded(1000);
        deck.play().unwrap();
        deck.next_block(100).unwrap();
        deck.pause().unwrap();
        let block = deck.next_block(100).unwrap().into_audio().unwrap();
        assert!(block.is_silent());
        assert_eq!(deck.position(), 100);

        deck.play().unwrap();
        let block = deck.next_block(1).unwrap().into_audio().unwrap();
        assert_eq!(block.sample(0, 0).unwrap(), 0.1);
    }

    #[test]
    fn test_seek_and_remaining() {
        let mut deck = loaded(44100);
        deck.seek(22050).unwrap();
        assert_eq!(deck.remaining_frames(), 22050);
        assert_eq!(deck.position_secs(), 0.5);
        assert!(matches!(
            deck.seek(50000),
            Err(AuraError::OutOfRange { index: 50000, len: 44100 })
        ));
    }

    #[test]
    fn test_load_while_playing_restarts() {
        let mut deck = loaded(1000);
        deck.play().unwrap();
        deck.next_block(500).unwrap();
        deck.load(Track::new("next", ramp(200)));
        assert!(deck.is_playing());
        assert_eq!(deck.position(), 0);
        assert_eq!(deck.remaining_frames(), 200);
    }

    #[test]
    fn test_load_resamples_to_engine_rate() {
        let mut deck = Deck::new(DeckId::A, 48000);
        deck.load(Track::new("low", SampleBuffer::sine(440.0, 0.5, 22050, 22050)));
        let track = deck.track().unwrap();
        assert_eq!(track.buffer().sample_rate(), 48000);
        assert!((track.num_frames() as i64 - 48000).abs() <= 1);
    }

    #[test]
    fn test_chain_and_gain_applied() {
        let mut deck = Deck::new(DeckId::A, 44100);
        deck.load(Track::new(
            "dc",
            SampleBuffer::from_interleaved(vec![0.5; 100], 1, 44100).unwrap(),
        ));
        let chain = EffectChain::build(
            &PresetDescriptor::new("cut").with_stage(StageDescriptor::new("gain").with("gain_db", -96.0)),
        )
        .unwrap();
        deck.attach_chain(chain);
        deck.play().unwrap();
        let block = deck.next_block(10).unwrap().into_audio().unwrap();
        assert!(block.peak() < 1e-4);

        deck.chain_handle().set_parameter(0, "gain_db", 0.0).unwrap();
        deck.set_gain(2.0).unwrap();
        let block = deck.next_block(10).unwrap().into_audio().unwrap();
        assert_eq!(block.sample(0, 0).unwrap(), 1.0);

        assert!(deck.set_gain(2.5).is_err());
        assert!(deck.set_gain(f64::NAN).is_err());
    }

    #[test]
    fn test_stop_releases_track() {
        let mut deck = loaded(1000);
        deck.play().unwrap();
        deck.next_block(10).unwrap();
        deck.stop();
        assert!(!deck.has_track());
        assert_eq!(deck.position(), 0);
        assert!(matches!(deck.play(), Err(AuraError::NoTrackLoaded { .. })));
    }
}
