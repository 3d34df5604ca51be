//! Tagline Timeline - Track/tag data model
//!
//! Implements the editable side of the tag editor:
//! - Tracks of possibly overlapping timed tags
//! - Per-track interval indexes for playhead queries
//! - Undo/redo grouped by editing context
//! - Persistence of tag sets and asynchronous flushing of edits

pub mod action;
pub mod clip;
pub mod config;
pub mod editor;
pub mod flush;
pub mod interval;
pub mod serialization;
pub mod store;
pub mod tag;
pub mod track;
pub mod waveform;

pub use action::{
    Action, ActionRecord, ActionStack, ChangeOp, EditContext, EntityKind, EntityRef, FlushBatch, ModifiedItem,
};
pub use clip::ClipPoints;
pub use config::{EditorConfig, RebuildPolicy};
pub use editor::{Document, Editor};
pub use flush::{FlushCoordinator, FlushOutcome, FlushSink, FlushTicket};
pub use interval::{IntervalIndex, DEFAULT_LINEAR_THRESHOLD};
pub use serialization::{
    load_tag_set, save_changed, save_tag_set, version_baseline, LoadSummary, PersistedTag, PersistedTrack,
    TagFile, TagSet,
};
pub use store::{Invalidation, Selection, TrackStore};
pub use tag::{OriginSource, RawTimes, Tag, TagId, TagOrigin, TrackId};
pub use track::{TimeFormat, Track, TrackKind, TrackSnapshot, TrackSpec, TrackUpdate};
pub use waveform::{Waveform, WaveformSample};
