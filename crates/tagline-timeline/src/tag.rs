//! Tag records.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// An empty id means "assign one on insert".
            pub fn is_unassigned(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a tag, unique within the process.
    TagId
);
string_id!(
    /// Identifier of a track.
    TrackId
);

/// Who produced a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginSource {
    /// Loaded from a machine-generated tag set.
    Machine,
    /// Created in the editor.
    User,
}

/// Persisted time fields exactly as read, for tags whose times could not
/// be interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTimes {
    pub start_time_ms: Option<f64>,
    pub start_time_rat: Option<String>,
    pub end_time_ms: Option<f64>,
    pub end_time_rat: Option<String>,
}

/// Provenance of a tag, kept so loaded tags can be re-identified on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagOrigin {
    pub source: OriginSource,
    /// Position in the persisted tag list the tag was loaded from.
    pub original_index: Option<usize>,
    /// Set when the loaded times were unreadable; written back on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_times: Option<RawTimes>,
}

impl TagOrigin {
    pub fn machine(original_index: usize) -> Self {
        Self {
            source: OriginSource::Machine,
            original_index: Some(original_index),
            raw_times: None,
        }
    }

    pub fn user() -> Self {
        Self {
            source: OriginSource::User,
            original_index: None,
            raw_times: None,
        }
    }
}

/// A timed annotation on a track. Times are in seconds, `[start, end]`
/// closed. Tags on the same track may overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub track_id: TrackId,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    /// Structured payload carried alongside the display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<TagOrigin>,
}

impl Tag {
    /// A user-created tag with an id still to be assigned by the store.
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            id: TagId::default(),
            track_id: TrackId::default(),
            start_time,
            end_time,
            text: text.into(),
            content: None,
            origin: Some(TagOrigin::user()),
        }
    }

    pub fn with_id(mut self, id: impl Into<TagId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = Some(content);
        self
    }

    /// Both endpoints are finite and ordered.
    pub fn is_well_formed(&self) -> bool {
        self.start_time.is_finite() && self.end_time.is_finite() && self.start_time <= self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Closed-interval overlap with `[t0, t1]`.
    #[inline]
    pub fn overlaps(&self, t0: f64, t1: f64) -> bool {
        self.start_time <= t1 && self.end_time >= t0
    }

    /// Enforce `end > start` with at least one frame of span, and clamp
    /// negative starts to zero. Non-finite times are left alone so the
    /// interval index can report them.
    pub fn normalized(mut self, frame_duration: f64) -> Self {
        if !(self.start_time.is_finite() && self.end_time.is_finite()) {
            return self;
        }
        if self.start_time < 0.0 {
            self.start_time = 0.0;
        }
        if self.end_time <= self.start_time {
            self.end_time = self.start_time + frame_duration;
        }
        self
    }
}
