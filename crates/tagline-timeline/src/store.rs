//! Track/tag store.
//!
//! Owns every track and its tags, keeps each track's interval index in step
//! with its tag set, and cleans up the selection when tags or tracks go
//! away. Mutations never trigger recomputation of derived views; they record
//! what went stale in an [`Invalidation`] that consumers drain with
//! [`TrackStore::take_invalidation`].

use rayon::prelude::*;
use std::fmt;
use tracing::{debug, warn};

use tagline_core::{palette_color, FrameRate, SharedIds, TimecodeEngine};

use crate::config::{EditorConfig, RebuildPolicy};
use crate::tag::{Tag, TagId, TrackId};
use crate::track::{Track, TrackSnapshot, TrackSpec, TrackUpdate};

/// Derived views made stale by mutations since the last drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Tracks were added, removed or reordered.
    pub track_list: bool,
    /// Tracks whose tags or attributes changed.
    pub tracks: Vec<TrackId>,
    /// The selection changed.
    pub selection: bool,
    /// The frame rate or drop-frame mode changed; frame counts and labels
    /// must be recomputed.
    pub timing: bool,
}

impl Invalidation {
    pub fn is_empty(&self) -> bool {
        !self.track_list && self.tracks.is_empty() && !self.selection && !self.timing
    }

    pub fn touches(&self, track_id: &TrackId) -> bool {
        self.tracks.contains(track_id)
    }

    fn mark_track(&mut self, id: &TrackId) {
        if !self.tracks.contains(id) {
            self.tracks.push(id.clone());
        }
    }
}

/// Currently selected track and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub track: Option<TrackId>,
    pub tags: Vec<(TrackId, TagId)>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.track.is_none() && self.tags.is_empty()
    }

    pub fn contains_tag(&self, tag_id: &TagId) -> bool {
        self.tags.iter().any(|(_, id)| id == tag_id)
    }
}

pub struct TrackStore {
    tracks: Vec<Track>,
    ids: SharedIds,
    engine: TimecodeEngine,
    rebuild_policy: RebuildPolicy,
    linear_threshold: usize,
    selection: Selection,
    invalidation: Invalidation,
}

impl fmt::Debug for TrackStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackStore")
            .field("tracks", &self.tracks.len())
            .field("engine", &self.engine)
            .field("rebuild_policy", &self.rebuild_policy)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl TrackStore {
    pub fn new(config: &EditorConfig, ids: SharedIds) -> Self {
        Self {
            tracks: Vec::new(),
            ids,
            engine: config.timecode_engine(),
            rebuild_policy: config.rebuild_policy,
            linear_threshold: config.linear_scan_threshold,
            selection: Selection::default(),
            invalidation: Invalidation::default(),
        }
    }

    // ── Timing ──────────────────────────────────────────────────

    pub fn engine(&self) -> &TimecodeEngine {
        &self.engine
    }

    /// Change the frame rate used to interpret tag times. Existing tags keep
    /// their times in seconds.
    pub fn set_frame_rate(&mut self, rate: FrameRate) {
        self.engine.set_frame_rate(rate);
        self.invalidation.timing = true;
    }

    pub fn set_drop_frame(&mut self, drop_frame: bool) {
        self.engine.set_drop_frame(drop_frame);
        self.invalidation.timing = true;
    }

    pub fn set_duration(&mut self, duration: Option<tagline_core::RationalTime>) {
        self.engine.set_duration(duration);
        self.invalidation.timing = true;
    }

    fn frame_seconds(&self) -> f64 {
        self.engine.frame_rate().frame_duration().to_seconds_f64()
    }

    // ── Tracks ──────────────────────────────────────────────────

    /// Create a track and return its id.
    pub fn add_track(&mut self, spec: TrackSpec) -> TrackId {
        let id = self.insert_track(spec);
        if self.rebuild_policy == RebuildPolicy::Eager {
            if let Some(track) = self.track_mut(&id) {
                track.rebuild_index();
            }
        }
        id
    }

    /// Create several tracks, building their indexes in parallel.
    pub fn add_tracks(&mut self, specs: Vec<TrackSpec>) -> Vec<TrackId> {
        let ids: Vec<_> = specs.into_iter().map(|spec| self.insert_track(spec)).collect();
        if self.rebuild_policy == RebuildPolicy::Eager {
            self.rebuild_stale_indexes();
        }
        ids
    }

    fn insert_track(&mut self, spec: TrackSpec) -> TrackId {
        let id = match spec.id {
            Some(id) if !id.is_unassigned() && self.track(&id).is_none() => id,
            Some(id) if !id.is_unassigned() => {
                let fresh = TrackId(self.ids.next_id());
                warn!(requested = %id, assigned = %fresh, "Track id already in use");
                fresh
            }
            _ => TrackId(self.ids.next_id()),
        };
        let color = spec.color.unwrap_or_else(|| palette_color(&spec.key));

        let mut track = Track::new(
            id.clone(),
            spec.label,
            spec.key,
            spec.kind,
            color,
            self.linear_threshold,
        );
        track.tags = spec
            .tags
            .into_iter()
            .map(|tag| self.prepare_tag(&id, tag))
            .collect();
        track.waveform = spec.waveform.map(std::sync::Arc::new);

        debug!(track = %id, key = track.key(), tags = track.tag_count(), "Added track");
        self.tracks.push(track);
        self.invalidation.track_list = true;
        self.invalidation.mark_track(&id);
        id
    }

    /// Remove a track with its tags and index. Returns its former position
    /// and the track itself so the removal can be reversed.
    pub fn delete_track(&mut self, track_id: &TrackId) -> Option<(usize, Track)> {
        let position = self.track_position(track_id)?;
        let track = self.tracks.remove(position);

        let before = self.selection.clone();
        if self.selection.track.as_ref() == Some(track_id) {
            self.selection.track = None;
        }
        self.selection.tags.retain(|(t, _)| t != track_id);
        if self.selection != before {
            self.invalidation.selection = true;
        }

        debug!(track = %track_id, tags = track.tag_count(), "Deleted track");
        self.invalidation.track_list = true;
        self.invalidation.mark_track(track_id);
        Some((position, track))
    }

    /// Put a previously removed track back at `position`. Returns `false`
    /// if a track with the same id already exists.
    pub fn restore_track(&mut self, position: usize, mut track: Track) -> bool {
        if self.track(track.id()).is_some() {
            return false;
        }
        let id = track.id().clone();
        let position = position.min(self.tracks.len());
        track.touch();
        self.tracks.insert(position, track);
        self.invalidation.track_list = true;
        self.invalidation.mark_track(&id);
        true
    }

    /// Apply attribute changes to a track and bump its version. Returns
    /// `false` if it is missing.
    pub fn modify_track(&mut self, track_id: &TrackId, update: &TrackUpdate) -> bool {
        let Some(track) = self.track_mut(track_id) else {
            return false;
        };
        if let Some(label) = &update.label {
            track.label = label.clone();
        }
        if let Some(color) = update.color {
            track.color = color;
        }
        if let Some(visible) = update.visible {
            track.visible = visible;
        }
        track.touch();
        self.invalidation.mark_track(track_id);
        true
    }

    // ── Tags ────────────────────────────────────────────────────

    /// Append a tag. Assigns an id when the tag has none and normalises its
    /// interval. Returns `None` if the track does not exist.
    pub fn add_tag(&mut self, track_id: &TrackId, tag: Tag) -> Option<TagId> {
        let position = self.track_len(track_id)?;
        self.insert_tag_at(track_id, position, tag)
    }

    /// Insert a tag at `slot` in the track's insertion order.
    pub fn insert_tag_at(&mut self, track_id: &TrackId, slot: usize, tag: Tag) -> Option<TagId> {
        if self.track(track_id).is_none() {
            warn!(track = %track_id, "Tag insert on missing track");
            return None;
        }
        let tag = self.prepare_tag(track_id, tag);
        let tag_id = tag.id.clone();
        let policy = self.rebuild_policy;
        let track = self.track_mut(track_id)?;
        let slot = slot.min(track.tags.len());
        track.tags.insert(slot, tag);
        after_tag_mutation(track, policy);

        debug!(track = %track_id, tag = %tag_id, slot, "Added tag");
        self.invalidation.mark_track(track_id);
        Some(tag_id)
    }

    /// Replace the tag with the same id. Returns whether a tag was replaced.
    /// The track version is bumped either way.
    pub fn modify_tag(&mut self, track_id: &TrackId, tag: Tag) -> bool {
        if self.track(track_id).is_none() {
            return false;
        }
        let tag = if tag.id.is_unassigned() {
            None
        } else {
            Some(self.prepare_tag(track_id, tag))
        };
        let policy = self.rebuild_policy;
        let Some(track) = self.track_mut(track_id) else {
            return false;
        };

        let replaced = match tag {
            Some(tag) => match track.position_of(&tag.id) {
                Some(slot) => {
                    debug!(track = %track_id, tag = %tag.id, "Modified tag");
                    track.tags[slot] = tag;
                    true
                }
                None => false,
            },
            None => false,
        };
        if replaced {
            after_tag_mutation(track, policy);
        } else {
            track.touch();
        }
        self.invalidation.mark_track(track_id);
        replaced
    }

    /// Remove a tag, dropping it from the selection too. Returns its former
    /// slot and the tag.
    pub fn delete_tag(&mut self, track_id: &TrackId, tag_id: &TagId) -> Option<(usize, Tag)> {
        let policy = self.rebuild_policy;
        let track = self.track_mut(track_id)?;
        let slot = track.position_of(tag_id)?;
        let tag = track.tags.remove(slot);
        after_tag_mutation(track, policy);

        let selected = self.selection.tags.len();
        self.selection
            .tags
            .retain(|(t, id)| !(t == track_id && id == tag_id));
        if self.selection.tags.len() != selected {
            self.invalidation.selection = true;
        }

        debug!(track = %track_id, tag = %tag_id, slot, "Deleted tag");
        self.invalidation.mark_track(track_id);
        Some((slot, tag))
    }

    /// The tag as an insert into `track_id` would store it: id assigned,
    /// owner set, interval normalised at the current frame rate.
    pub fn prepare_tag(&self, track_id: &TrackId, mut tag: Tag) -> Tag {
        if tag.id.is_unassigned() {
            tag.id = TagId(self.ids.next_id());
        }
        tag.track_id = track_id.clone();
        tag.normalized(self.frame_seconds())
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn visible_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_visible())
    }

    pub fn track(&self, track_id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == track_id)
    }

    pub fn track_by_key(&self, key: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.key() == key)
    }

    pub fn tag(&self, track_id: &TrackId, tag_id: &TagId) -> Option<&Tag> {
        self.track(track_id)?.tag(tag_id)
    }

    /// Locate a tag by id across all tracks.
    pub fn find_tag(&self, tag_id: &TagId) -> Option<(&Track, &Tag)> {
        self.tracks
            .iter()
            .find_map(|track| track.tag(tag_id).map(|tag| (track, tag)))
    }

    /// Tags active at `time` on one track. Empty for unknown tracks.
    pub fn tags_at(&self, track_id: &TrackId, time: f64) -> Vec<&Tag> {
        self.track(track_id)
            .map(|t| t.tags_at(time))
            .unwrap_or_default()
    }

    pub fn tags_in_range(&self, track_id: &TrackId, t0: f64, t1: f64) -> Vec<&Tag> {
        self.track(track_id)
            .map(|t| t.tags_in_range(t0, t1))
            .unwrap_or_default()
    }

    pub fn active_tag_at(&self, track_id: &TrackId, time: f64) -> Option<&Tag> {
        self.track(track_id)?.active_tag_at(time)
    }

    /// Active tags on every visible track that has any at `time`.
    pub fn active_tags_at(&self, time: f64) -> Vec<(&Track, Vec<&Tag>)> {
        self.visible_tracks()
            .map(|track| (track, track.tags_at(time)))
            .filter(|(_, tags)| !tags.is_empty())
            .collect()
    }

    /// Build any index left stale by deferred rebuilds, in parallel.
    pub fn rebuild_stale_indexes(&mut self) {
        let stale = self.tracks.iter().filter(|t| t.index_is_stale()).count();
        if stale == 0 {
            return;
        }
        self.tracks
            .par_iter_mut()
            .filter(|t| t.index_is_stale())
            .for_each(|t| t.rebuild_index());
        debug!(stale, "Rebuilt stale interval indexes");
    }

    /// Version-free content of every track, in order.
    pub fn snapshot(&self) -> Vec<TrackSnapshot> {
        self.tracks.iter().map(Track::snapshot).collect()
    }

    // ── Selection ───────────────────────────────────────────────

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Select a track. Unknown ids clear the track selection.
    pub fn select_track(&mut self, track_id: Option<&TrackId>) {
        self.selection.track = track_id.filter(|id| self.track(id).is_some()).cloned();
        self.invalidation.selection = true;
    }

    /// Replace the selected tags on a track. Ids not on the track are
    /// ignored.
    pub fn select_tags(&mut self, track_id: &TrackId, tag_ids: &[TagId]) {
        self.selection.tags.retain(|(t, _)| t != track_id);
        if let Some(track) = self.track(track_id) {
            let valid: Vec<_> = tag_ids
                .iter()
                .filter(|id| track.tag(id).is_some())
                .map(|id| (track_id.clone(), id.clone()))
                .collect();
            self.selection.tags.extend(valid);
        }
        self.invalidation.selection = true;
    }

    /// Add a track, and tags on it, back to the selection without touching
    /// the rest of it. Ids that no longer exist are ignored.
    pub fn extend_selection(&mut self, track_id: &TrackId, select_track: bool, tag_ids: &[TagId]) {
        let Some(track) = self.track(track_id) else {
            return;
        };
        let added: Vec<_> = tag_ids
            .iter()
            .filter(|id| track.tag(id).is_some())
            .filter(|id| !self.selection.tags.iter().any(|(t, i)| t == track_id && i == *id))
            .map(|id| (track_id.clone(), id.clone()))
            .collect();
        if select_track {
            self.selection.track = Some(track_id.clone());
        }
        if select_track || !added.is_empty() {
            self.selection.tags.extend(added);
            self.invalidation.selection = true;
        }
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection = Selection::default();
            self.invalidation.selection = true;
        }
    }

    // ── Invalidation ────────────────────────────────────────────

    /// Drain the record of stale derived views.
    pub fn take_invalidation(&mut self) -> Invalidation {
        std::mem::take(&mut self.invalidation)
    }

    pub fn pending_invalidation(&self) -> &Invalidation {
        &self.invalidation
    }

    // ── Helpers ─────────────────────────────────────────────────

    fn track_position(&self, track_id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id() == track_id)
    }

    fn track_len(&self, track_id: &TrackId) -> Option<usize> {
        self.track(track_id).map(Track::tag_count)
    }

    fn track_mut(&mut self, track_id: &TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id() == track_id)
    }
}

fn after_tag_mutation(track: &mut Track, policy: RebuildPolicy) {
    track.touch();
    match policy {
        RebuildPolicy::Eager => track.rebuild_index(),
        RebuildPolicy::Deferred => track.invalidate_index(),
    }
}
