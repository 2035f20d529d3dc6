//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so partial files are
//! accepted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::crossfade::MAX_CROSSFADE_MS;
use crate::engine::io::SUPPORTED_BIT_DEPTHS;
use crate::engine::{FadeLaw, OutputClip};
use crate::error::{AuraError, Result};

/// Maximum master volume (linear)
pub const MAX_MASTER_VOLUME: f64 = 2.0;

/// Crossfade behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// Transition length in milliseconds
    pub duration_ms: f64,
    pub law: FadeLaw,
    /// Start a transition automatically near the end of the active track
    pub auto: bool,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            duration_ms: 5000.0,
            law: FadeLaw::EqualPower,
            auto: true,
        }
    }
}

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Processing rate; tracks are resampled to it on load
    pub sample_rate: u32,
    /// Frames per processing block
    pub block_size: usize,
    /// Master output gain, 0 to 2
    pub master_volume: f64,
    pub crossfade: CrossfadeConfig,
    /// Clip policy applied to the mixer output after master volume
    pub output_clip: OutputClip,
    /// Integer PCM depth used for exports
    pub export_bit_depth: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,
            master_volume: 1.0,
            crossfade: CrossfadeConfig::default(),
            output_clip: OutputClip::Hard,
            export_bit_depth: 24,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| AuraError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(AuraError::InvalidConfig { reason });

        if !(8000..=192_000).contains(&self.sample_rate) {
            return invalid(format!(
                "sample_rate {} outside 8000..=192000",
                self.sample_rate
            ));
        }
        if self.block_size == 0 || self.block_size > 65_536 {
            return invalid(format!("block_size {} outside 1..=65536", self.block_size));
        }
        if !self.master_volume.is_finite()
            || !(0.0..=MAX_MASTER_VOLUME).contains(&self.master_volume)
        {
            return invalid(format!(
                "master_volume {} outside 0..={}",
                self.master_volume, MAX_MASTER_VOLUME
            ));
        }
        let fade = self.crossfade.duration_ms;
        if !fade.is_finite() || fade <= 0.0 || fade > MAX_CROSSFADE_MS {
            return invalid(format!(
                "crossfade.duration_ms {} outside (0, {}]",
                fade, MAX_CROSSFADE_MS
            ));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.export_bit_depth) {
            return invalid(format!(
                "export_bit_depth {} not one of {:?}",
                self.export_bit_depth, SUPPORTED_BIT_DEPTHS
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.crossfade.law, FadeLaw::EqualPower);
        assert!(config.crossfade.auto);
        assert_eq!(config.output_clip, OutputClip::Hard);
    }

    #[test]
    fn test_output_clip_from_json() {
        let config = EngineConfig::from_json(r#"{"output_clip": "soft"}"#).unwrap();
        assert_eq!(config.output_clip, OutputClip::Soft);
        assert!(matches!(
            EngineConfig::from_json(r#"{"output_clip": "fold"}"#),
            Err(AuraError::Serialization(_))
        ));
    }

    #[test]
    fn test_partial_json() {
        let config =
            EngineConfig::from_json(r#"{"block_size": 256, "crossfade": {"law": "linear"}}"#)
                .unwrap();
        assert_eq!(config.block_size, 256);
        assert_eq!(config.crossfade.law, FadeLaw::Linear);
        assert_eq!(config.crossfade.duration_ms, 5000.0);
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn test_round_trip() {
        let mut config = EngineConfig::default();
        config.master_volume = 0.8;
        config.crossfade.auto = false;
        let restored = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_invalid_values() {
        for json in [
            r#"{"block_size": 0}"#,
            r#"{"sample_rate": 1000}"#,
            r#"{"master_volume": 3.0}"#,
            r#"{"crossfade": {"duration_ms": 0}}"#,
            r#"{"crossfade": {"duration_ms": 120000}}"#,
            r#"{"export_bit_depth": 20}"#,
        ] {
            assert!(
                matches!(
                    EngineConfig::from_json(json),
                    Err(AuraError::InvalidConfig { .. })
                ),
                "{} should be rejected",
                json
            );
        }
        assert!(matches!(
            EngineConfig::from_json(r#"{"crossfade": {"law": "cubic"}}"#),
            Err(AuraError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"master_volume": 0.5}}"#).unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.master_volume, 0.5);

        assert!(matches!(
            EngineConfig::from_file(Path::new("/no/such/config.json")),
            Err(AuraError::FileRead { .. })
        ));
    }
}
