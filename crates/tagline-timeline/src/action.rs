//! Undo/redo with per-context histories.
//!
//! Every mutation is performed through [`ActionStack::perform`] as a pair of
//! closures: `forward` applies the change, `inverse` takes it back. Each
//! editing context (page × subpage) has its own undo and redo stacks, so an
//! edit in one context never discards another context's redo history.
//!
//! Alongside the stacks each context keeps a log of records that have not
//! been flushed to storage yet. [`ActionStack::pending_batch`] collapses that
//! log into one write per entity.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::SystemTime;
use tracing::debug;

use tagline_core::SharedIds;

/// A state transition applied to the target.
pub type Mutator<T> = Box<dyn Fn(&mut T)>;

/// Editing context an action belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditContext {
    pub page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpage: Option<String>,
}

impl EditContext {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            subpage: None,
        }
    }

    pub fn with_subpage(mut self, subpage: impl Into<String>) -> Self {
        self.subpage = Some(subpage.into());
        self
    }
}

impl fmt::Display for EditContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subpage {
            Some(sub) => write!(f, "{}/{}", self.page, sub),
            None => f.write_str(&self.page),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tag,
    Track,
    Clip,
}

/// The persisted entity an action touched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn tag(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Tag,
            id: id.into(),
        }
    }

    pub fn track(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Track,
            id: id.into(),
        }
    }

    /// Clip boundaries are a single entity per document.
    pub fn clip() -> Self {
        Self {
            kind: EntityKind::Clip,
            id: "clip".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Create,
    Modify,
    Delete,
}

/// One entity change, with the entity's state after the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedItem {
    pub entity: EntityRef,
    pub op: ChangeOp,
    /// State after the change; `Null` for deletes.
    pub snapshot: serde_json::Value,
}

impl ModifiedItem {
    pub fn new(entity: EntityRef, op: ChangeOp, snapshot: serde_json::Value) -> Self {
        Self {
            entity,
            op,
            snapshot,
        }
    }

    pub fn deleted(entity: EntityRef) -> Self {
        Self::new(entity, ChangeOp::Delete, serde_json::Value::Null)
    }
}

/// A reversible mutation submitted to [`ActionStack::perform`].
pub struct Action<T> {
    pub label: String,
    pub context: EditContext,
    pub forward: Mutator<T>,
    pub inverse: Mutator<T>,
    /// Entity changes made by `forward`.
    pub modified: Vec<ModifiedItem>,
    /// Entity changes made by `inverse`.
    pub reverted: Vec<ModifiedItem>,
}

impl<T> Action<T> {
    pub fn new(
        label: impl Into<String>,
        context: EditContext,
        forward: impl Fn(&mut T) + 'static,
        inverse: impl Fn(&mut T) + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            context,
            forward: Box::new(forward),
            inverse: Box::new(inverse),
            modified: Vec::new(),
            reverted: Vec::new(),
        }
    }

    pub fn with_modified(mut self, modified: Vec<ModifiedItem>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_reverted(mut self, reverted: Vec<ModifiedItem>) -> Self {
        self.reverted = reverted;
        self
    }
}

/// What was done, when, and to which entities.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub id: String,
    pub label: String,
    pub context: EditContext,
    pub created_at: SystemTime,
    pub modified: Vec<ModifiedItem>,
}

/// Collapsed entity writes for one context, ready to hand to storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlushBatch {
    pub context: EditContext,
    pub items: Vec<ModifiedItem>,
    /// Ids of the records this batch covers.
    pub record_ids: Vec<String>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

struct Entry<T> {
    record: ActionRecord,
    forward: Mutator<T>,
    inverse: Mutator<T>,
    reverted: Vec<ModifiedItem>,
}

struct ContextHistory<T> {
    /// Oldest first; the history limit trims from the front.
    undo: VecDeque<Entry<T>>,
    redo: Vec<Entry<T>>,
    /// Undo depth.
    position: usize,
    /// Records not yet flushed, oldest first. Outlives the undo stack when
    /// the history limit drops old entries.
    pending: Vec<ActionRecord>,
}

impl<T> Default for ContextHistory<T> {
    fn default() -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            position: 0,
            pending: Vec::new(),
        }
    }
}

pub struct ActionStack<T> {
    contexts: HashMap<EditContext, ContextHistory<T>>,
    current: EditContext,
    ids: SharedIds,
    /// Maximum undo depth per context.
    limit: Option<usize>,
}

impl<T> fmt::Debug for ActionStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStack")
            .field("current", &self.current)
            .field("contexts", &self.contexts.len())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<T> ActionStack<T> {
    pub fn new(ids: SharedIds, limit: Option<usize>) -> Self {
        Self {
            contexts: HashMap::new(),
            current: EditContext::default(),
            ids,
            limit,
        }
    }

    /// Switch the context `undo` and `redo` act on.
    pub fn set_context(&mut self, context: EditContext) {
        self.current = context;
    }

    pub fn context(&self) -> &EditContext {
        &self.current
    }

    /// Apply `action.forward` to `target` and record it. Clears the redo
    /// stack of the action's context only. Returns the record id.
    pub fn perform(&mut self, target: &mut T, action: Action<T>) -> String {
        let record = ActionRecord {
            id: self.ids.next_id(),
            label: action.label,
            context: action.context,
            created_at: SystemTime::now(),
            modified: action.modified,
        };
        let id = record.id.clone();
        let entry = Entry {
            record,
            forward: action.forward,
            inverse: action.inverse,
            reverted: action.reverted,
        };
        self.apply(target, entry, false);
        id
    }

    fn apply(&mut self, target: &mut T, entry: Entry<T>, from_redo: bool) {
        (entry.forward)(target);

        let limit = self.limit;
        let history = self.contexts.entry(entry.record.context.clone()).or_default();
        if !from_redo {
            history.redo.clear();
        }
        debug!(
            action = %entry.record.label,
            context = %entry.record.context,
            from_redo,
            "Performed action"
        );
        let mut pending = entry.record.clone();
        if from_redo {
            pending.id = self.ids.next_id();
            pending.created_at = SystemTime::now();
        }
        history.pending.push(pending);
        history.undo.push_back(entry);
        history.position += 1;

        if let Some(limit) = limit {
            while history.undo.len() > limit {
                history.undo.pop_front();
                history.position -= 1;
            }
        }
    }

    /// Reverse the most recent action of the current context. Returns the
    /// undone record, or `None` when there is nothing to undo.
    pub fn undo(&mut self, target: &mut T) -> Option<ActionRecord> {
        let history = self.contexts.get_mut(&self.current)?;
        let entry = history.undo.pop_back()?;
        history.position -= 1;

        (entry.inverse)(target);
        debug!(action = %entry.record.label, context = %self.current, "Undid action");

        history.pending.push(ActionRecord {
            id: self.ids.next_id(),
            label: format!("Undo {}", entry.record.label),
            context: entry.record.context.clone(),
            created_at: SystemTime::now(),
            modified: entry.reverted.clone(),
        });
        let record = entry.record.clone();
        history.redo.push(entry);
        Some(record)
    }

    /// Re-apply the most recently undone action of the current context.
    pub fn redo(&mut self, target: &mut T) -> Option<ActionRecord> {
        let entry = self.contexts.get_mut(&self.current)?.redo.pop()?;
        let record = entry.record.clone();
        self.apply(target, entry, true);
        Some(record)
    }

    pub fn can_undo(&self) -> bool {
        self.contexts
            .get(&self.current)
            .is_some_and(|h| !h.undo.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        self.contexts
            .get(&self.current)
            .is_some_and(|h| !h.redo.is_empty())
    }

    /// Undo depth of `context`.
    pub fn position(&self, context: &EditContext) -> usize {
        self.contexts.get(context).map_or(0, |h| h.position)
    }

    pub fn redo_depth(&self, context: &EditContext) -> usize {
        self.contexts.get(context).map_or(0, |h| h.redo.len())
    }

    /// Whether `context` has actions that can be undone; gates the save
    /// affordance.
    pub fn has_unsaved_changes(&self, context: &EditContext) -> bool {
        self.position(context) > 0
    }

    /// Whether `context` has records not yet covered by a successful flush.
    pub fn has_pending_flush(&self, context: &EditContext) -> bool {
        self.contexts
            .get(context)
            .is_some_and(|h| !h.pending.is_empty())
    }

    /// Labels on the undo stack of `context`, oldest first.
    pub fn undo_labels(&self, context: &EditContext) -> Vec<&str> {
        self.contexts
            .get(context)
            .map(|h| h.undo.iter().map(|e| e.record.label.as_str()).collect())
            .unwrap_or_default()
    }

    /// Collapse the unflushed records of `context` into one write per
    /// entity.
    ///
    /// The latest change to an entity wins. An entity created and deleted
    /// within the window is dropped; one created and then modified is still
    /// a create, carrying the latest snapshot.
    pub fn pending_batch(&self, context: &EditContext) -> FlushBatch {
        let Some(history) = self.contexts.get(context) else {
            return FlushBatch {
                context: context.clone(),
                ..FlushBatch::default()
            };
        };

        let mut slots: Vec<Option<ModifiedItem>> = Vec::new();
        let mut by_entity: HashMap<EntityRef, usize> = HashMap::new();
        for item in history.pending.iter().flat_map(|r| &r.modified) {
            let Some(&slot) = by_entity.get(&item.entity) else {
                by_entity.insert(item.entity.clone(), slots.len());
                slots.push(Some(item.clone()));
                continue;
            };
            let merged = match (slots[slot].take(), item.op) {
                (Some(prev), ChangeOp::Delete) if prev.op == ChangeOp::Create => None,
                (Some(prev), _) if prev.op == ChangeOp::Create => {
                    Some(ModifiedItem::new(item.entity.clone(), ChangeOp::Create, item.snapshot.clone()))
                }
                // Deleted then recreated before anything was written: the
                // stored entity just changes.
                (Some(prev), ChangeOp::Create) if prev.op == ChangeOp::Delete => {
                    Some(ModifiedItem::new(item.entity.clone(), ChangeOp::Modify, item.snapshot.clone()))
                }
                _ => Some(item.clone()),
            };
            // An elided entity starts over if it shows up again.
            if merged.is_none() {
                by_entity.remove(&item.entity);
            }
            slots[slot] = merged;
        }

        FlushBatch {
            context: context.clone(),
            items: slots.into_iter().flatten().collect(),
            record_ids: history.pending.iter().map(|r| r.id.clone()).collect(),
        }
    }

    /// Drop the records covered by a successful flush. Records added after
    /// the batch was taken, and all undo/redo history, are kept.
    pub fn mark_flushed(&mut self, batch: &FlushBatch) {
        if let Some(history) = self.contexts.get_mut(&batch.context) {
            let before = history.pending.len();
            history.pending.retain(|r| !batch.record_ids.contains(&r.id));
            debug!(
                context = %batch.context,
                flushed = before - history.pending.len(),
                remaining = history.pending.len(),
                "Marked records flushed"
            );
        }
    }
}
