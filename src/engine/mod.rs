//! Audio Engine Module
//!
//! Playback and rendering built on the DSP layer:
//! - Sample buffers and WAV I/O
//! - Deck transport state machine
//! - Two-deck mixer with crossfading
//! - Offline render pipeline

pub mod buffer;
pub mod crossfade;
pub mod deck;
pub mod io;
pub mod mixer;
pub mod render;
pub mod transport;

pub use buffer::{db_to_linear, linear_to_db, ChannelLayout, SampleBuffer};
pub use crossfade::{crossfade_frames, CrossfadeController, CrossfadeMode, FadeLaw};
pub use deck::{BlockResult, Deck, DeckId, Track};
pub use io::{decode, encode, probe, read_wav_file, write_wav_file, WavInfo};
pub use mixer::{EngineBlock, Mixer, MixerEvent, OutputClip, PeakMeter};
pub use render::{render_to_file, CancelToken, RenderPipeline, RenderReport};
pub use transport::{Transport, TransportState};
