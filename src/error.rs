//! Error handling for Aura
//!
//! Every fallible engine operation returns [`Result`]. Stage processing itself
//! never fails for valid input; errors are raised at the boundary (parameter
//! updates, preset loading, decoding, file I/O and transport control).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Aura operations
pub type Result<T> = std::result::Result<T, AuraError>;

/// Main error type for Aura operations
#[derive(Error, Debug)]
pub enum AuraError {
    // Parameter Errors
    #[error("Invalid value {value} for {stage}.{param}: expected {min} to {max}")]
    InvalidParameter {
        stage: String,
        param: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Unknown parameter '{param}' for stage {stage}")]
    UnknownParameter { stage: String, param: String },

    #[error("Unsupported stage kind: {kind}")]
    UnsupportedStage { kind: String },

    #[error("Preset not found: {name}")]
    PresetNotFound { name: String },

    // Audio Format Errors
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio buffer: {reason}")]
    InvalidBuffer { reason: String },

    #[error("Index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },

    // Transport Errors
    #[error("Deck {deck}: cannot {action} while {state}")]
    InvalidTransition {
        deck: String,
        action: &'static str,
        state: String,
    },

    #[error("Deck {deck} has no track loaded")]
    NoTrackLoaded { deck: String },

    #[error("A crossfade is already in progress")]
    CrossfadeInProgress,

    #[error("Invalid crossfade: {reason}")]
    InvalidCrossfade { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Render Errors
    #[error("Render cancelled after {frames_done} frames")]
    Cancelled { frames_done: usize },

    // I/O Errors
    #[error("Failed to read file: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuraError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AuraError::InvalidParameter { .. } => "INVALID_PARAMETER",
            AuraError::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            AuraError::UnsupportedStage { .. } => "UNSUPPORTED_STAGE",
            AuraError::PresetNotFound { .. } => "PRESET_NOT_FOUND",
            AuraError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            AuraError::InvalidBuffer { .. } => "INVALID_BUFFER",
            AuraError::OutOfRange { .. } => "OUT_OF_RANGE",
            AuraError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AuraError::NoTrackLoaded { .. } => "NO_TRACK_LOADED",
            AuraError::CrossfadeInProgress => "CROSSFADE_IN_PROGRESS",
            AuraError::InvalidCrossfade { .. } => "INVALID_CROSSFADE",
            AuraError::InvalidConfig { .. } => "INVALID_CONFIG",
            AuraError::Cancelled { .. } => "CANCELLED",
            AuraError::FileRead { .. } | AuraError::FileWrite { .. } | AuraError::Io(_) => {
                "IO_FAILURE"
            }
            AuraError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error leaves the engine in a usable state
    ///
    /// Boundary rejections never touch the chain or deck they were aimed at,
    /// so the caller can simply correct the input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuraError::InvalidParameter { .. }
                | AuraError::UnknownParameter { .. }
                | AuraError::UnsupportedStage { .. }
                | AuraError::PresetNotFound { .. }
                | AuraError::UnsupportedFormat { .. }
                | AuraError::InvalidTransition { .. }
                | AuraError::NoTrackLoaded { .. }
                | AuraError::CrossfadeInProgress
                | AuraError::InvalidCrossfade { .. }
                | AuraError::Cancelled { .. }
                | AuraError::FileRead { .. }
        )
    }
}
