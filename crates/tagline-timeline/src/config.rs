//! Editor configuration.
//!
//! Stored as JSON; every field has a default so partial files are valid.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

use tagline_core::{FrameRate, Result, TaglineError, TimecodeEngine};

use crate::interval::DEFAULT_LINEAR_THRESHOLD;

/// When a track's interval index is rebuilt after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPolicy {
    /// Inside the mutation, before it returns.
    #[default]
    Eager,
    /// Just before the next read of that track.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    #[serde(serialize_with = "rate_to_string", deserialize_with = "rate_from_any")]
    pub frame_rate: FrameRate,
    pub drop_frame: bool,
    /// Tracks with fewer tags than this are queried by linear scan.
    pub linear_scan_threshold: usize,
    pub rebuild_policy: RebuildPolicy,
    /// Undo depth per editing context. `None` keeps everything.
    pub history_limit: Option<usize>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            frame_rate: FrameRate::default(),
            drop_frame: false,
            linear_scan_threshold: DEFAULT_LINEAR_THRESHOLD,
            rebuild_policy: RebuildPolicy::default(),
            history_limit: None,
        }
    }
}

impl EditorConfig {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| TaglineError::Serialization(format!("Invalid editor config: {}", e)))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| TaglineError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn timecode_engine(&self) -> TimecodeEngine {
        TimecodeEngine::new(self.frame_rate, self.drop_frame)
    }
}

fn rate_to_string<S: Serializer>(rate: &FrameRate, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}/{}", rate.numerator, rate.denominator))
}

fn rate_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<FrameRate, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(f64),
        Pair(FrameRate),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => FrameRate::parse(&s).map_err(serde::de::Error::custom),
        Raw::Number(n) => FrameRate::parse(&n.to_string()).map_err(serde::de::Error::custom),
        Raw::Pair(rate) if rate.is_valid() => Ok(rate),
        Raw::Pair(rate) => Err(serde::de::Error::custom(format!(
            "invalid frame rate {}/{}",
            rate.numerator, rate.denominator
        ))),
    }
}
