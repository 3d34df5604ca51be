//! Clip entry/exit points.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use tagline_core::{RationalTime, TimeRange, TimecodeEngine};

/// In and out points of the clip being edited. `None` means the start or
/// end of the media. Persisted as `"num/denom"` strings so boundaries stay
/// frame-exact when the frame rate is reinterpreted later.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipPoints {
    #[serde(
        rename = "entry_point_rat",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "rat_out",
        deserialize_with = "rat_in"
    )]
    pub entry: Option<RationalTime>,
    #[serde(
        rename = "exit_point_rat",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "rat_out",
        deserialize_with = "rat_in"
    )]
    pub exit: Option<RationalTime>,
}

impl ClipPoints {
    pub fn new(entry: Option<RationalTime>, exit: Option<RationalTime>) -> Self {
        Self { entry, exit }
    }

    /// Points at frame boundaries.
    pub fn from_frames(engine: &TimecodeEngine, entry: Option<i64>, exit: Option<i64>) -> Self {
        Self {
            entry: entry.map(|f| engine.frame_to_time(f.max(0))),
            exit: exit.map(|f| engine.frame_to_time(f.max(0))),
        }
    }

    /// First frame of the clip.
    pub fn entry_frame(&self, engine: &TimecodeEngine) -> i64 {
        self.entry.map_or(0, |t| engine.time_to_frame_exact(t))
    }

    /// Last frame boundary of the clip, or `None` if it runs to the end of
    /// media of unknown length.
    pub fn exit_frame(&self, engine: &TimecodeEngine) -> Option<i64> {
        match self.exit {
            Some(t) => Some(engine.time_to_frame_exact(t)),
            None => engine.duration().map(|_| engine.total_frames()),
        }
    }

    /// Entry must not come after exit.
    pub fn is_valid(&self) -> bool {
        match (self.entry, self.exit) {
            (Some(entry), Some(exit)) => entry <= exit,
            _ => true,
        }
    }

    /// The clip as a time range, when both ends are known.
    pub fn range(&self, engine: &TimecodeEngine) -> Option<TimeRange> {
        let start = self.entry.unwrap_or(RationalTime::ZERO);
        let end = self.exit.or(engine.duration())?;
        Some(TimeRange::from_start_end(start, end))
    }
}

fn rat_out<S: Serializer>(value: &Option<RationalTime>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(t) => serializer.serialize_str(&t.to_rat_string()),
        None => serializer.serialize_none(),
    }
}

fn rat_in<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<RationalTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => RationalTime::parse_rat(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid rational time {s:?}"))),
    }
}
