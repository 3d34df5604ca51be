//! Tag set persistence with versioning and migration.
//!
//! A tag set maps each track's semantic key to its label, color, kind and
//! tags. Tag times arrive either as milliseconds or as `"num/denom"`
//! strings and are normalised to seconds on load. On save, subtitle,
//! metadata and audio tracks are written in milliseconds and the
//! frame-aligned kinds as rational strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

use tagline_core::{Color, FrameRounding, RationalTime, Result, TaglineError, TimecodeEngine};

use crate::clip::ClipPoints;
use crate::store::TrackStore;
use crate::tag::{RawTimes, Tag, TagId, TagOrigin, TrackId};
use crate::track::{TimeFormat, Track, TrackKind, TrackSpec};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Tracks keyed by semantic key.
pub type TagSet = BTreeMap<String, PersistedTrack>;

/// Track versions at the last save, for skipping unchanged tracks.
pub type VersionBaseline = HashMap<TrackId, u64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        alias = "start_time",
        skip_serializing_if = "Option::is_none",
        serialize_with = "millis_out"
    )]
    pub start_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_rat: Option<String>,
    #[serde(
        default,
        alias = "end_time",
        skip_serializing_if = "Option::is_none",
        serialize_with = "millis_out"
    )]
    pub end_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_rat: Option<String>,
    /// A list of strings is joined into one display text.
    #[serde(default, deserialize_with = "text_in")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedTrack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    /// `#rrggbb`; invalid values fall back to the palette.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<PersistedTag>,
    #[serde(default)]
    pub version: u64,
}

impl PersistedTrack {
    fn kind(&self, key: &str) -> TrackKind {
        let Some(name) = self.track_type.as_deref() else {
            return TrackKind::default();
        };
        serde_json::from_value(serde_json::Value::String(name.to_string())).unwrap_or_else(|_| {
            warn!(track = key, track_type = name, "Unknown track type, treating as metadata");
            TrackKind::default()
        })
    }
}

/// Counts from a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub tracks: usize,
    pub tags: usize,
    /// Tags left out of their track's index because their times could not
    /// be read or were inverted.
    pub skipped: usize,
}

/// Add every track in `set` to `store`. Loaded tags carry a machine origin
/// with their position in the persisted list.
pub fn load_tag_set(store: &mut TrackStore, set: &TagSet) -> LoadSummary {
    let specs: Vec<TrackSpec> = set
        .iter()
        .map(|(key, persisted)| track_spec(key, persisted))
        .collect();
    let tags = specs.iter().map(|s| s.tags.len()).sum();

    let ids = store.add_tracks(specs);
    let skipped = ids
        .iter()
        .filter_map(|id| store.track(id))
        .map(|track| track.index().skipped())
        .sum();

    let summary = LoadSummary {
        tracks: ids.len(),
        tags,
        skipped,
    };
    info!(tracks = summary.tracks, tags = summary.tags, skipped = summary.skipped, "Loaded tag set");
    summary
}

fn track_spec(key: &str, persisted: &PersistedTrack) -> TrackSpec {
    let label = if persisted.label.is_empty() {
        key.to_string()
    } else {
        persisted.label.clone()
    };
    let mut spec = TrackSpec::new(key, label, persisted.kind(key));
    if let Some(id) = persisted.id.as_deref().filter(|id| !id.is_empty()) {
        spec = spec.with_id(id);
    }
    if let Some(hex) = &persisted.color {
        match Color::from_hex(hex) {
            Some(color) => spec = spec.with_color(color),
            None => warn!(track = key, color = %hex, "Invalid track color"),
        }
    }
    let tags = persisted
        .tags
        .iter()
        .enumerate()
        .map(|(i, tag)| load_tag(key, i, tag))
        .collect();
    spec.with_tags(tags)
}

fn load_tag(key: &str, index: usize, persisted: &PersistedTag) -> Tag {
    let start = seconds(persisted.start_time_rat.as_deref(), persisted.start_time_ms);
    let end = seconds(persisted.end_time_rat.as_deref(), persisted.end_time_ms);
    let mut origin = TagOrigin::machine(index);
    if start.is_nan() || end.is_nan() {
        warn!(track = key, index, "Tag has unreadable times");
        origin.raw_times = Some(RawTimes {
            start_time_ms: persisted.start_time_ms,
            start_time_rat: persisted.start_time_rat.clone(),
            end_time_ms: persisted.end_time_ms,
            end_time_rat: persisted.end_time_rat.clone(),
        });
    }
    Tag {
        id: persisted.id.clone().map(TagId).unwrap_or_default(),
        track_id: TrackId::default(),
        start_time: start,
        end_time: end,
        text: persisted.text.clone(),
        content: persisted.content.clone(),
        origin: Some(origin),
    }
}

/// Seconds from a rational string, else from milliseconds. NaN when
/// neither is usable.
fn seconds(rat: Option<&str>, millis: Option<f64>) -> f64 {
    if let Some(time) = rat.and_then(RationalTime::parse_rat) {
        return time.to_seconds_f64();
    }
    millis.map_or(f64::NAN, |ms| ms / 1000.0)
}

/// Every track in `store`, in the persisted form.
pub fn save_tag_set(store: &TrackStore) -> TagSet {
    save_filtered(store, |_| true)
}

/// Only the tracks whose version differs from `baseline`.
pub fn save_changed(store: &TrackStore, baseline: &VersionBaseline) -> TagSet {
    save_filtered(store, |track| baseline.get(track.id()) != Some(&track.version()))
}

/// Current version of every track.
pub fn version_baseline(store: &TrackStore) -> VersionBaseline {
    store
        .tracks()
        .iter()
        .map(|t| (t.id().clone(), t.version()))
        .collect()
}

fn save_filtered(store: &TrackStore, include: impl Fn(&Track) -> bool) -> TagSet {
    let engine = store.engine();
    let mut set = TagSet::new();
    for track in store.tracks().iter().filter(|t| include(t)) {
        let mut key = track.key().to_string();
        if set.contains_key(&key) {
            key = format!("{}:{}", track.key(), track.id());
            warn!(track = %track.id(), key = %key, "Duplicate track key, saving under a qualified key");
        }
        set.insert(key, save_track(engine, track));
    }
    info!(tracks = set.len(), "Saved tag set");
    set
}

fn save_track(engine: &TimecodeEngine, track: &Track) -> PersistedTrack {
    let format = track.kind().time_format();
    PersistedTrack {
        id: Some(track.id().to_string()),
        label: track.label().to_string(),
        color: Some(track.color().to_hex()),
        track_type: serde_json::to_value(track.kind())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string)),
        tags: track.tags().iter().map(|tag| save_tag(engine, format, tag)).collect(),
        version: track.version(),
    }
}

fn save_tag(engine: &TimecodeEngine, format: TimeFormat, tag: &Tag) -> PersistedTag {
    let mut persisted = PersistedTag {
        id: Some(tag.id.to_string()),
        text: tag.text.clone(),
        content: tag.content.clone(),
        ..PersistedTag::default()
    };
    let raw = tag.origin.as_ref().and_then(|o| o.raw_times.as_ref());
    if !(tag.start_time.is_finite() && tag.end_time.is_finite()) {
        // Unreadable times go back out exactly as they came in.
        if let Some(raw) = raw {
            persisted.start_time_ms = raw.start_time_ms;
            persisted.start_time_rat = raw.start_time_rat.clone();
            persisted.end_time_ms = raw.end_time_ms;
            persisted.end_time_rat = raw.end_time_rat.clone();
        }
        return persisted;
    }
    match format {
        TimeFormat::Milliseconds => {
            persisted.start_time_ms = Some((tag.start_time * 1000.0).round());
            persisted.end_time_ms = Some((tag.end_time * 1000.0).round());
        }
        TimeFormat::Rational => {
            let rat = |s: f64| engine.frame_to_rat(engine.time_to_frame(s, FrameRounding::Floor));
            persisted.start_time_rat = Some(rat(tag.start_time));
            persisted.end_time_rat = Some(rat(tag.end_time));
        }
    }
    persisted
}

fn millis_out<S: Serializer>(value: &Option<f64>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(ms) if ms.fract() == 0.0 && ms.abs() < i64::MAX as f64 => serializer.serialize_i64(*ms as i64),
        Some(ms) => serializer.serialize_f64(*ms),
        None => serializer.serialize_none(),
    }
}

fn text_in<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::One(text) => text,
        Raw::Many(parts) => parts.join(", "),
        Raw::Missing(()) => String::new(),
    })
}

/// Versioned tag file wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagFile {
    /// Schema version for migration.
    pub version: u32,
    pub tracks: TagSet,
    #[serde(default)]
    pub clip: ClipPoints,
    /// Application version that wrote this file.
    pub app_version: String,
}

impl TagFile {
    pub fn new(tracks: TagSet, clip: ClipPoints) -> Self {
        Self {
            version: CURRENT_VERSION,
            tracks,
            clip,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| TaglineError::Serialization(format!("Failed to serialize tag file: {}", e)))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| TaglineError::Serialization(format!("Invalid JSON: {}", e)))?;

        // A bare tag set may well have a track keyed "version".
        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        if version > CURRENT_VERSION {
            return Err(TaglineError::Serialization(format!(
                "Tag file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;

        serde_json::from_value(migrated)
            .map_err(|e| TaglineError::Serialization(format!("Failed to parse tag file: {}", e)))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), tracks = self.tracks.len(), "Wrote tag file");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 → v1: the whole document is the tag set
                data = serde_json::json!({
                    "version": 1,
                    "tracks": data,
                    "app_version": "0.1.0",
                });
                version = 1;
            }
            _ => {
                return Err(TaglineError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}
