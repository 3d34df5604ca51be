//! Track types for the tag timeline.

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::sync::Arc;

use tagline_core::Color;

use crate::interval::IntervalIndex;
use crate::tag::{Tag, TagId, TrackId};
use crate::waveform::Waveform;

/// Kind of track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Free-text metadata tags.
    #[default]
    Metadata,
    /// Subtitles and captions.
    Subtitle,
    /// Clip in/out markers.
    ClipMarker,
    /// Boundaries of the primary content (e.g. programme start/end).
    PrimaryContent,
    /// Editorial segments.
    Segment,
    /// Audio waveform lane.
    Audio,
}

/// How a track's tag times are written back to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    /// Integer milliseconds.
    Milliseconds,
    /// Frame-exact `"num/denom"` strings.
    Rational,
}

impl TrackKind {
    pub fn time_format(self) -> TimeFormat {
        match self {
            Self::Metadata | Self::Subtitle | Self::Audio => TimeFormat::Milliseconds,
            Self::ClipMarker | Self::PrimaryContent | Self::Segment => TimeFormat::Rational,
        }
    }

    /// Whether users may add or edit tags on this kind of track.
    pub fn is_editable(self) -> bool {
        !matches!(self, Self::Audio)
    }
}

/// Input for creating a track.
#[derive(Debug, Clone, Default)]
pub struct TrackSpec {
    /// Assigned by the store when absent.
    pub id: Option<TrackId>,
    pub label: String,
    /// Stable semantic key, independent of the id.
    pub key: String,
    pub kind: TrackKind,
    /// Persisted color; when absent one is picked from the palette by key.
    pub color: Option<Color>,
    /// Initial tags (loaded tag sets). Empty for user-created tracks.
    pub tags: Vec<Tag>,
    pub waveform: Option<Waveform>,
}

impl TrackSpec {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<TrackId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }
}

/// Changes to a track's own attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackUpdate {
    pub label: Option<String>,
    pub color: Option<Color>,
    pub visible: Option<bool>,
}

/// A channel of tags of one kind.
#[derive(Debug, Clone)]
pub struct Track {
    pub(crate) id: TrackId,
    pub(crate) label: String,
    pub(crate) key: String,
    pub(crate) kind: TrackKind,
    pub(crate) color: Color,
    pub(crate) visible: bool,
    /// Bumped on every tag or attribute change so renderers and savers
    /// can skip unchanged tracks.
    pub(crate) version: u64,
    /// Insertion order; index slots refer to positions in this list.
    pub(crate) tags: Vec<Tag>,
    pub(crate) waveform: Option<Arc<Waveform>>,
    pub(crate) linear_threshold: usize,
    index: OnceCell<Arc<IntervalIndex>>,
}

impl Track {
    pub(crate) fn new(
        id: TrackId,
        label: String,
        key: String,
        kind: TrackKind,
        color: Color,
        linear_threshold: usize,
    ) -> Self {
        Self {
            id,
            label,
            key,
            kind,
            color,
            visible: true,
            version: 0,
            tags: Vec::new(),
            waveform: None,
            linear_threshold,
            index: OnceCell::new(),
        }
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn waveform(&self) -> Option<&Waveform> {
        self.waveform.as_deref()
    }

    pub fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| &t.id == id)
    }

    pub fn position_of(&self, id: &TagId) -> Option<usize> {
        self.tags.iter().position(|t| &t.id == id)
    }

    /// The interval index for the current tag set, built now if the last
    /// mutation left it stale.
    pub fn index(&self) -> &IntervalIndex {
        self.index_handle_ref()
    }

    /// A shared handle to the current index that stays valid after the
    /// track is mutated.
    pub fn index_handle(&self) -> Arc<IntervalIndex> {
        Arc::clone(self.index_handle_ref())
    }

    fn index_handle_ref(&self) -> &Arc<IntervalIndex> {
        self.index
            .get_or_init(|| Arc::new(IntervalIndex::build(&self.tags, self.linear_threshold)))
    }

    /// Whether a read would have to rebuild the index first.
    pub fn index_is_stale(&self) -> bool {
        self.index.get().is_none()
    }

    /// Drop the current index; the next read or `rebuild_index` builds a
    /// fresh one from the tag set.
    pub(crate) fn invalidate_index(&mut self) {
        self.index = OnceCell::new();
    }

    pub(crate) fn rebuild_index(&mut self) {
        let index = IntervalIndex::build(&self.tags, self.linear_threshold);
        self.index = OnceCell::from(Arc::new(index));
    }

    /// Record a tag mutation.
    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    /// Tags active at `time`.
    pub fn tags_at(&self, time: f64) -> Vec<&Tag> {
        self.tags_in_range(time, time)
    }

    /// Tags overlapping `[t0, t1]`, ordered by start time then insertion.
    pub fn tags_in_range(&self, t0: f64, t1: f64) -> Vec<&Tag> {
        let mut slots = self.index().query(t0, t1);
        slots.sort_unstable_by(|&a, &b| self.slot_order(a, b));
        slots.into_iter().map(|slot| &self.tags[slot]).collect()
    }

    /// The single tag to treat as active at `time`: earliest start wins,
    /// ties go to the tag inserted first.
    pub fn active_tag_at(&self, time: f64) -> Option<&Tag> {
        self.index()
            .query_point(time)
            .into_iter()
            .min_by(|&a, &b| self.slot_order(a, b))
            .map(|slot| &self.tags[slot])
    }

    fn slot_order(&self, a: usize, b: usize) -> std::cmp::Ordering {
        self.tags[a]
            .start_time
            .total_cmp(&self.tags[b].start_time)
            .then(a.cmp(&b))
    }

    /// Version-free view of the track's content.
    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            key: self.key.clone(),
            kind: self.kind,
            color: self.color,
            visible: self.visible,
            tags: self.tags.clone(),
        }
    }
}

/// Track content without the version counter or index, for deep equality
/// and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub label: String,
    pub key: String,
    pub kind: TrackKind,
    pub color: Color,
    pub visible: bool,
    pub tags: Vec<Tag>,
}
