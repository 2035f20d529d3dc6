//! Transport State Machine
//!
//! Playback state of a single deck:
//!
//! ```text
//! Stopped --load--> Ready --play--> Playing --pause--> Paused --play--> Playing
//!    ^                                 |
//!    +-------------- end / stop -------+
//! ```
//!
//! `stop` is accepted from every state. Loading while playing keeps the
//! deck playing; loading from any other state leaves it `Ready`.

use std::fmt;

use tracing::debug;

use crate::error::{AuraError, Result};

/// Transport states representing the current playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No track loaded (default state)
    #[default]
    Stopped,
    /// Track loaded, cursor parked
    Ready,
    /// Audio is actively playing
    Playing,
    /// Playback suspended, cursor kept
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Ready => write!(f, "Ready"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
        }
    }
}

/// Validated state transitions for one deck
///
/// # Example
/// ```
/// use aura::engine::{Transport, TransportState};
///
/// let mut transport = Transport::new("A");
/// assert!(transport.play().is_err());
///
/// transport.load();
/// transport.play().unwrap();
/// assert_eq!(transport.state(), TransportState::Playing);
/// ```
#[derive(Debug, Clone)]
pub struct Transport {
    /// Owner label used in errors and logs
    label: String,
    state: TransportState,
}

impl Transport {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: TransportState::Stopped,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_stopped(&self) -> bool {
        self.state == TransportState::Stopped
    }

    fn reject(&self, action: &'static str) -> AuraError {
        AuraError::InvalidTransition {
            deck: self.label.clone(),
            action,
            state: self.state.to_string(),
        }
    }

    fn transition(&mut self, next: TransportState) {
        if next != self.state {
            debug!(deck = %self.label, from = %self.state, to = %next, "transport");
            self.state = next;
        }
    }

    /// A track was loaded
    pub fn load(&mut self) {
        if self.state != TransportState::Playing {
            self.transition(TransportState::Ready);
        }
    }

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            TransportState::Ready | TransportState::Paused | TransportState::Playing => {
                self.transition(TransportState::Playing);
                Ok(())
            }
            TransportState::Stopped => Err(self.reject("play")),
        }
    }

    /// Suspend playback
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            TransportState::Playing | TransportState::Paused => {
                self.transition(TransportState::Paused);
                Ok(())
            }
            TransportState::Stopped | TransportState::Ready => Err(self.reject("pause")),
        }
    }

    /// Stop playback and release the track
    pub fn stop(&mut self) {
        self.transition(TransportState::Stopped);
    }
}
