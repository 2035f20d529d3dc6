//! Preset descriptors and storage
//!
//! A preset is a named, ordered list of stage descriptors plus chain-level
//! wet/dry mix and intensity. Descriptors are plain serde data; [`EffectChain::build`]
//! turns them into live stages.
//!
//! [`EffectChain::build`]: super::EffectChain::build

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuraError, Result};

fn default_mix() -> f64 {
    1.0
}

fn default_intensity() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// One stage entry in a preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Stage kind identifier, e.g. `"compressor"`
    pub kind: String,
    /// Stable instance id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,
    /// Band count, only meaningful for `parametric_eq`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bands: Option<usize>,
    /// Parameter values by name; missing names keep their defaults
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl StageDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            enabled: true,
            bands: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }
}

/// A complete chain description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDescriptor {
    pub name: String,
    /// Chain wet/dry mix, 0 = dry, 1 = fully processed
    #[serde(default = "default_mix")]
    pub mix: f64,
    /// Scales every stage toward transparency, 1 = as configured
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub stages: Vec<StageDescriptor>,
}

impl PresetDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mix: default_mix(),
            intensity: default_intensity(),
            stages: Vec::new(),
        }
    }

    pub fn with_mix(mut self, mix: f64) -> Self {
        self.mix = mix;
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_stage(mut self, stage: StageDescriptor) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parse a descriptor from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Persistence seam for presets
///
/// The engine never assumes a backend; the CLI and tests use
/// [`MemoryPresetStore`].
pub trait PresetStore {
    /// Fetch a preset by name
    fn load(&self, name: &str) -> Result<PresetDescriptor>;

    /// Insert or replace a preset
    fn save(&mut self, preset: PresetDescriptor) -> Result<()>;

    /// Names of all stored presets, sorted
    fn list(&self) -> Vec<String>;

    /// Delete a preset, returning it
    fn remove(&mut self, name: &str) -> Result<PresetDescriptor>;
}

/// In-memory preset store keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryPresetStore {
    presets: BTreeMap<String, PresetDescriptor>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with the factory presets
    pub fn with_builtins() -> Self {
        Self {
            presets: builtin_presets()
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }
}

impl PresetStore for MemoryPresetStore {
    fn load(&self, name: &str) -> Result<PresetDescriptor> {
        self.presets
            .get(name)
            .cloned()
            .ok_or_else(|| AuraError::PresetNotFound {
                name: name.to_string(),
            })
    }

    fn save(&mut self, preset: PresetDescriptor) -> Result<()> {
        tracing::debug!(name = %preset.name, stages = preset.stages.len(), "saving preset");
        self.presets.insert(preset.name.clone(), preset);
        Ok(())
    }

    fn list(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    fn remove(&mut self, name: &str) -> Result<PresetDescriptor> {
        self.presets
            .remove(name)
            .ok_or_else(|| AuraError::PresetNotFound {
                name: name.to_string(),
            })
    }
}

// ============================================================================
// Factory presets
// ============================================================================

/// The factory preset library
pub fn builtin_presets() -> Vec<PresetDescriptor> {
    vec![
        PresetDescriptor::new("Flat"),
        PresetDescriptor::new("Club Master")
            .with_mix(0.8)
            .with_stage(
                StageDescriptor::new("bass_boost")
                    .with("gain_db", 6.0)
                    .with("cutoff_hz", 100.0),
            )
            .with_stage(
                StageDescriptor::new("compressor")
                    .with("threshold_db", -16.0)
                    .with("ratio", 4.0)
                    .with("attack_ms", 5.0)
                    .with("release_ms", 120.0)
                    .with("makeup_gain_db", 3.0),
            )
            .with_stage(StageDescriptor::new("stereo_widener").with("width", 1.3))
            .with_stage(
                StageDescriptor::new("limiter")
                    .with("ceiling_db", -1.0)
                    .with("release_ms", 80.0),
            ),
        PresetDescriptor::new("Night Drive")
            .with_mix(0.5)
            .with_stage(StageDescriptor::new("stereo_widener").with("width", 1.4))
            .with_stage(
                StageDescriptor::new("bass_boost")
                    .with("gain_db", 4.0)
                    .with("cutoff_hz", 110.0),
            )
            .with_stage(
                StageDescriptor::new("reverb")
                    .with("room_size", 0.6)
                    .with("damping", 0.6)
                    .with("wet_level", 0.25),
            )
            .with_stage(
                // Gentle tilt: warm lows, softened highs
                StageDescriptor::new("parametric_eq")
                    .with("band0_gain_db", 2.0)
                    .with("band4_gain_db", -2.0),
            ),
        PresetDescriptor::new("Podcast Clarity")
            .with_stage(
                StageDescriptor::new("parametric_eq")
                    .with("band0_gain_db", -6.0)
                    .with("band3_gain_db", 2.0)
                    .with("band4_gain_db", 3.0),
            )
            .with_stage(
                StageDescriptor::new("compressor")
                    .with("threshold_db", -24.0)
                    .with("ratio", 3.0)
                    .with("release_ms", 150.0)
                    .with("makeup_gain_db", 6.0)
                    .with("detection", 1.0),
            )
            .with_stage(StageDescriptor::new("limiter").with("ceiling_db", -1.0)),
        PresetDescriptor::new("Cathedral")
            .with_mix(0.9)
            .with_stage(
                StageDescriptor::new("reverb")
                    .with("room_size", 0.95)
                    .with("damping", 0.3)
                    .with("wet_level", 0.6)
                    .with("dry_level", 0.7),
            )
            .with_stage(StageDescriptor::new("stereo_widener").with("width", 1.5)),
        PresetDescriptor::new("Radio Host")
            .with_mix(0.9)
            .with_stage(
                StageDescriptor::new("bass_boost")
                    .with("gain_db", 3.0)
                    .with("cutoff_hz", 150.0),
            )
            .with_stage(
                StageDescriptor::new("compressor")
                    .with("threshold_db", -20.0)
                    .with("ratio", 6.0)
                    .with("attack_ms", 3.0)
                    .with("release_ms", 80.0)
                    .with("makeup_gain_db", 6.0),
            )
            .with_stage(
                StageDescriptor::new("limiter")
                    .with("ceiling_db", -0.5)
                    .with("release_ms", 50.0),
            ),
        PresetDescriptor::new("Bass Nuke")
            .with_stage(
                StageDescriptor::new("bass_boost")
                    .with("gain_db", 12.0)
                    .with("cutoff_hz", 80.0),
            )
            .with_stage(
                StageDescriptor::new("compressor")
                    .with("threshold_db", -12.0)
                    .with("ratio", 8.0)
                    .with("attack_ms", 1.0)
                    .with("release_ms", 60.0),
            )
            .with_stage(
                StageDescriptor::new("limiter")
                    .with("ceiling_db", -0.3)
                    .with("release_ms", 40.0),
            ),
        PresetDescriptor::new("Slow Orbit")
            .with_intensity(0.72)
            .with_stage(
                StageDescriptor::new("treble_boost")
                    .with("gain_db", 2.0)
                    .with("cutoff_hz", 4000.0),
            )
            .with_stage(
                StageDescriptor::new("auto_pan")
                    .with("depth", 0.7)
                    .with("speed_hz", 0.15),
            )
            .with_stage(
                StageDescriptor::new("reverb")
                    .with("room_size", 0.7)
                    .with("wet_level", 0.3),
            )
            .with_stage(StageDescriptor::new("limiter").with("ceiling_db", -0.5)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let preset =
            PresetDescriptor::from_json(r#"{"name": "x", "stages": [{"kind": "gain"}]}"#).unwrap();
        assert_eq!(preset.mix, 1.0);
        assert_eq!(preset.intensity, 1.0);
        assert_eq!(preset.stages.len(), 1);
        assert!(preset.stages[0].enabled);
        assert!(preset.stages[0].parameters.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        for preset in builtin_presets() {
            let json = preset.to_json().unwrap();
            assert_eq!(PresetDescriptor::from_json(&json).unwrap(), preset);
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PresetDescriptor::from_json("{\"stages\": 3"),
            Err(AuraError::Serialization(_))
        ));
    }

    #[test]
    fn test_builtin_names() {
        let names: Vec<String> = builtin_presets().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "Flat",
                "Club Master",
                "Night Drive",
                "Podcast Clarity",
                "Cathedral",
                "Radio Host",
                "Bass Nuke",
                "Slow Orbit"
            ]
        );
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryPresetStore::new();
        assert!(store.list().is_empty());
        store.save(PresetDescriptor::new("b")).unwrap();
        store.save(PresetDescriptor::new("a").with_mix(0.5)).unwrap();
        assert_eq!(store.list(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.load("a").unwrap().mix, 0.5);

        // Saving again replaces
        store.save(PresetDescriptor::new("a")).unwrap();
        assert_eq!(store.load("a").unwrap().mix, 1.0);

        store.remove("a").unwrap();
        assert!(matches!(
            store.load("a"),
            Err(AuraError::PresetNotFound { .. })
        ));
        assert!(store.remove("a").is_err());
    }

    #[test]
    fn test_store_with_builtins() {
        let store = MemoryPresetStore::with_builtins();
        assert_eq!(store.list().len(), builtin_presets().len());
        assert!(store.load("Cathedral").is_ok());
    }
}
