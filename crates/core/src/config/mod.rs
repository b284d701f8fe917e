use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration for a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub solver: SolverConfig,
    pub blendshape: BlendshapeConfig,
    pub malformed: MalformedPolicy,
}

impl ConverterConfig {
    /// Loads a configuration from a JSON file. Missing fields keep their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Configuration specific to the pose-to-rotation solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Landmarks below this visibility make their joint hold the last valid
    /// rotation.
    pub visibility_threshold: f64,
    /// Multiplier from normalized camera space to skeleton units.
    pub unit_scale: f64,
    /// Emits `Xposition Yposition Zposition` channels on the root.
    pub root_translation: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            unit_scale: 100.0,
            root_translation: true,
        }
    }
}

/// Configuration for the facial blendshape extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendshapeConfig {
    /// Uses frame 0 as the neutral face when it carries face landmarks.
    pub calibrate_from_first_frame: bool,
}

impl Default for BlendshapeConfig {
    fn default() -> Self {
        Self {
            calibrate_from_first_frame: true,
        }
    }
}

/// What the converter does with a frame the normalizer rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    #[default]
    Abort,
    Skip,
}
