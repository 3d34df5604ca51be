//! Recorded editing.
//!
//! [`Editor`] is the write path for user edits: every mutation goes through
//! the action stack with an inverse captured from the state it replaces, so
//! undo and redo restore the document exactly. Mutations that reference a
//! missing track or tag change nothing and leave no history entry.

use serde::Serialize;
use serde_json::{json, Value};

use tagline_core::{palette_color, FrameRate, Result, SharedIds, TaglineError};

use crate::action::{Action, ActionRecord, ActionStack, ChangeOp, EditContext, EntityRef, FlushBatch, ModifiedItem};
use crate::clip::ClipPoints;
use crate::config::EditorConfig;
use crate::store::{Invalidation, TrackStore};
use crate::tag::{Tag, TagId, TrackId};
use crate::track::{Track, TrackSpec, TrackUpdate};

/// Everything an action can change.
#[derive(Debug)]
pub struct Document {
    pub store: TrackStore,
    pub clip: ClipPoints,
}

impl Document {
    pub fn new(store: TrackStore) -> Self {
        Self {
            store,
            clip: ClipPoints::default(),
        }
    }
}

#[derive(Debug)]
pub struct Editor {
    document: Document,
    history: ActionStack<Document>,
    ids: SharedIds,
}

impl Editor {
    pub fn new(config: &EditorConfig, ids: SharedIds) -> Self {
        let store = TrackStore::new(config, ids.clone());
        Self::with_document(Document::new(store), config.history_limit, ids)
    }

    /// Wrap an already loaded document with an empty history.
    pub fn with_document(document: Document, history_limit: Option<usize>, ids: SharedIds) -> Self {
        Self {
            document,
            history: ActionStack::new(ids.clone(), history_limit),
            ids,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn store(&self) -> &TrackStore {
        &self.document.store
    }

    pub fn clip(&self) -> ClipPoints {
        self.document.clip
    }

    pub fn history(&self) -> &ActionStack<Document> {
        &self.history
    }

    // ── Context and history ─────────────────────────────────────

    pub fn set_context(&mut self, context: EditContext) {
        self.history.set_context(context);
    }

    pub fn undo(&mut self) -> Option<ActionRecord> {
        self.history.undo(&mut self.document)
    }

    pub fn redo(&mut self) -> Option<ActionRecord> {
        self.history.redo(&mut self.document)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.history.has_unsaved_changes(self.history.context())
    }

    pub fn has_pending_flush(&self) -> bool {
        self.history.has_pending_flush(self.history.context())
    }

    /// Collapsed writes for the current context.
    pub fn pending_batch(&self) -> FlushBatch {
        self.history.pending_batch(self.history.context())
    }

    pub fn mark_flushed(&mut self, batch: &FlushBatch) {
        self.history.mark_flushed(batch);
    }

    // ── Unrecorded state ────────────────────────────────────────

    pub fn take_invalidation(&mut self) -> Invalidation {
        self.document.store.take_invalidation()
    }

    pub fn set_frame_rate(&mut self, rate: FrameRate, drop_frame: bool) {
        self.document.store.set_frame_rate(rate);
        self.document.store.set_drop_frame(drop_frame);
    }

    pub fn select_track(&mut self, track_id: Option<&TrackId>) {
        self.document.store.select_track(track_id);
    }

    pub fn select_tags(&mut self, track_id: &TrackId, tag_ids: &[TagId]) {
        self.document.store.select_tags(track_id, tag_ids);
    }

    // ── Tracks ──────────────────────────────────────────────────

    pub fn add_track(&mut self, mut spec: TrackSpec) -> TrackId {
        let id = match spec.id.take() {
            Some(id) if !id.is_unassigned() && self.store().track(&id).is_none() => id,
            _ => TrackId(self.ids.next_id()),
        };
        for tag in &mut spec.tags {
            if tag.id.is_unassigned() {
                tag.id = TagId(self.ids.next_id());
            }
        }
        let spec = spec.with_id(id.clone());
        let label = format!("Add track {}", spec.label);
        let entity = EntityRef::track(id.as_str());
        let created = json!({
            "id": id,
            "label": spec.label,
            "key": spec.key,
            "kind": spec.kind,
            "color": spec.color.unwrap_or_else(|| palette_color(&spec.key)),
            "visible": true,
        });

        let inverse_id = id.clone();
        let action = Action::new(
            label,
            self.history.context().clone(),
            move |doc: &mut Document| {
                doc.store.add_track(spec.clone());
            },
            move |doc: &mut Document| {
                doc.store.delete_track(&inverse_id);
            },
        )
        .with_modified(vec![ModifiedItem::new(entity.clone(), ChangeOp::Create, created)])
        .with_reverted(vec![ModifiedItem::deleted(entity)]);
        self.history.perform(&mut self.document, action);
        id
    }

    pub fn delete_track(&mut self, track_id: &TrackId) -> bool {
        let store = self.store();
        let Some(position) = store.tracks().iter().position(|t| t.id() == track_id) else {
            return false;
        };
        let track = store.tracks()[position].clone();
        let was_selected = store.selection().track.as_ref() == Some(track_id);
        let selected_tags = selected_tags_on(store, track_id);
        let entity = EntityRef::track(track_id.as_str());
        let restored = ModifiedItem::new(entity.clone(), ChangeOp::Create, track_json(&track));
        let label = format!("Delete track {}", track.label());

        let forward_id = track_id.clone();
        let inverse_id = track_id.clone();
        let action = Action::new(
            label,
            self.history.context().clone(),
            move |doc: &mut Document| {
                doc.store.delete_track(&forward_id);
            },
            move |doc: &mut Document| {
                doc.store.restore_track(position, track.clone());
                doc.store.extend_selection(&inverse_id, was_selected, &selected_tags);
            },
        )
        .with_modified(vec![ModifiedItem::deleted(entity)])
        .with_reverted(vec![restored]);
        self.history.perform(&mut self.document, action);
        true
    }

    pub fn modify_track(&mut self, track_id: &TrackId, update: TrackUpdate) -> bool {
        let Some(track) = self.store().track(track_id) else {
            return false;
        };
        let previous = TrackUpdate {
            label: update.label.as_ref().map(|_| track.label().to_string()),
            color: update.color.map(|_| track.color()),
            visible: update.visible.map(|_| track.is_visible()),
        };
        let before = track_json(track);
        let mut after = before.clone();
        if let Some(label) = &update.label {
            after["label"] = json!(label);
        }
        if let Some(color) = update.color {
            after["color"] = json!(color);
        }
        if let Some(visible) = update.visible {
            after["visible"] = json!(visible);
        }
        let entity = EntityRef::track(track_id.as_str());

        let forward_id = track_id.clone();
        let inverse_id = track_id.clone();
        let action = Action::new(
            "Modify track",
            self.history.context().clone(),
            move |doc: &mut Document| {
                doc.store.modify_track(&forward_id, &update);
            },
            move |doc: &mut Document| {
                doc.store.modify_track(&inverse_id, &previous);
            },
        )
        .with_modified(vec![ModifiedItem::new(entity.clone(), ChangeOp::Modify, after)])
        .with_reverted(vec![ModifiedItem::new(entity, ChangeOp::Modify, before)]);
        self.history.perform(&mut self.document, action);
        true
    }

    // ── Tags ────────────────────────────────────────────────────

    /// Add a tag to an editable track. Returns the id it was stored under.
    pub fn add_tag(&mut self, track_id: &TrackId, tag: Tag) -> Option<TagId> {
        let track = self.store().track(track_id)?;
        if !track.kind().is_editable() {
            return None;
        }
        let tag = self.document.store.prepare_tag(track_id, tag);
        let tag_id = tag.id.clone();
        let entity = EntityRef::tag(tag_id.as_str());
        let created = ModifiedItem::new(entity.clone(), ChangeOp::Create, to_json(&tag));
        let label = format!("Add tag {}", tag.text);

        let forward_track = track_id.clone();
        let inverse_track = track_id.clone();
        let inverse_tag = tag_id.clone();
        let action = Action::new(
            label,
            self.history.context().clone(),
            move |doc: &mut Document| {
                doc.store.add_tag(&forward_track, tag.clone());
            },
            move |doc: &mut Document| {
                doc.store.delete_tag(&inverse_track, &inverse_tag);
            },
        )
        .with_modified(vec![created])
        .with_reverted(vec![ModifiedItem::deleted(entity)]);
        self.history.perform(&mut self.document, action);
        Some(tag_id)
    }

    /// Replace a tag by id. Returns `false`, recording nothing, if the tag
    /// does not exist.
    pub fn modify_tag(&mut self, track_id: &TrackId, tag: Tag) -> bool {
        let Some(previous) = self.store().tag(track_id, &tag.id).cloned() else {
            return false;
        };
        let tag = self.document.store.prepare_tag(track_id, tag);
        let entity = EntityRef::tag(tag.id.as_str());
        let modified = ModifiedItem::new(entity.clone(), ChangeOp::Modify, to_json(&tag));
        let reverted = ModifiedItem::new(entity, ChangeOp::Modify, to_json(&previous));

        let forward_track = track_id.clone();
        let inverse_track = track_id.clone();
        let action = Action::new(
            "Modify tag",
            self.history.context().clone(),
            move |doc: &mut Document| {
                doc.store.modify_tag(&forward_track, tag.clone());
            },
            move |doc: &mut Document| {
                doc.store.modify_tag(&inverse_track, previous.clone());
            },
        )
        .with_modified(vec![modified])
        .with_reverted(vec![reverted]);
        self.history.perform(&mut self.document, action);
        true
    }

    pub fn delete_tag(&mut self, track_id: &TrackId, tag_id: &TagId) -> bool {
        let Some(track) = self.store().track(track_id) else {
            return false;
        };
        let Some(slot) = track.position_of(tag_id) else {
            return false;
        };
        let tag = track.tags()[slot].clone();
        let was_selected = selected_tags_on(self.store(), track_id).contains(tag_id);
        let entity = EntityRef::tag(tag_id.as_str());
        let restored = ModifiedItem::new(entity.clone(), ChangeOp::Create, to_json(&tag));
        let label = format!("Delete tag {}", tag.text);

        let forward_track = track_id.clone();
        let forward_tag = tag_id.clone();
        let inverse_track = track_id.clone();
        let action = Action::new(
            label,
            self.history.context().clone(),
            move |doc: &mut Document| {
                doc.store.delete_tag(&forward_track, &forward_tag);
            },
            move |doc: &mut Document| {
                doc.store.insert_tag_at(&inverse_track, slot, tag.clone());
                if was_selected {
                    doc.store.extend_selection(&inverse_track, false, std::slice::from_ref(&tag.id));
                }
            },
        )
        .with_modified(vec![ModifiedItem::deleted(entity)])
        .with_reverted(vec![restored]);
        self.history.perform(&mut self.document, action);
        true
    }

    // ── Clip ────────────────────────────────────────────────────

    pub fn set_clip_points(&mut self, points: ClipPoints) -> Result<()> {
        if !points.is_valid() {
            return Err(TaglineError::InvalidParameter(
                "clip entry point is after its exit point".into(),
            ));
        }
        let previous = self.document.clip;
        if previous == points {
            return Ok(());
        }
        let entity = EntityRef::clip();
        let action = Action::new(
            "Set clip points",
            self.history.context().clone(),
            move |doc: &mut Document| doc.clip = points,
            move |doc: &mut Document| doc.clip = previous,
        )
        .with_modified(vec![ModifiedItem::new(entity.clone(), ChangeOp::Modify, to_json(&points))])
        .with_reverted(vec![ModifiedItem::new(entity, ChangeOp::Modify, to_json(&previous))]);
        self.history.perform(&mut self.document, action);
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn selected_tags_on(store: &TrackStore, track_id: &TrackId) -> Vec<TagId> {
    store
        .selection()
        .tags
        .iter()
        .filter(|(t, _)| t == track_id)
        .map(|(_, id)| id.clone())
        .collect()
}

/// Track attributes without its tags.
fn track_json(track: &Track) -> Value {
    json!({
        "id": track.id(),
        "label": track.label(),
        "key": track.key(),
        "kind": track.kind(),
        "color": track.color(),
        "visible": track.is_visible(),
    })
}
