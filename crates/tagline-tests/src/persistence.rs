//! Integration tests for loading, saving and flushing edits.

use serde_json::json;
use tagline_core::{FrameRate, Result, SequentialIds, TaglineError};
use tagline_timeline::{
    load_tag_set, save_changed, save_tag_set, version_baseline, ChangeOp, Document, EditContext, Editor,
    EditorConfig, FlushBatch, FlushCoordinator, FlushOutcome, FlushSink, Tag, TagFile, TagSet, TrackStore,
};

// ── Helpers ────────────────────────────────────────────────────

fn config() -> EditorConfig {
    EditorConfig {
        frame_rate: FrameRate::FPS_29_97,
        drop_frame: true,
        ..EditorConfig::default()
    }
}

fn sample_set() -> TagSet {
    serde_json::from_value(json!({
        "celebrity": {
            "label": "Celebrities",
            "color": "#e6194b",
            "tags": [
                { "id": "c1", "start_time_ms": 0, "end_time_ms": 2500, "text": "Ada" },
                { "id": "c2", "start_time_ms": 1000, "end_time_ms": 4000, "text": ["Grace", "Alan"] }
            ]
        },
        "chapters": {
            "label": "Chapters",
            "track_type": "segment",
            "tags": [
                { "id": "s1", "start_time_rat": "0/1", "end_time_rat": "1001/100", "text": "Opening" }
            ]
        }
    }))
    .unwrap()
}

fn loaded_editor() -> Editor {
    let ids = SequentialIds::shared("u");
    let config = config();
    let mut store = TrackStore::new(&config, ids.clone());
    load_tag_set(&mut store, &sample_set());
    let mut editor = Editor::with_document(Document::new(store), config.history_limit, ids);
    editor.set_context(EditContext::new("tags"));
    editor
}

struct FailingSink;

impl FlushSink for FailingSink {
    async fn flush(&self, _batch: FlushBatch) -> Result<()> {
        Err(TaglineError::Flush {
            message: "503 from content platform".into(),
            retryable: true,
        })
    }
}

struct AcceptingSink;

impl FlushSink for AcceptingSink {
    async fn flush(&self, _batch: FlushBatch) -> Result<()> {
        Ok(())
    }
}

// ── Load/save ──────────────────────────────────────────────────

#[test]
fn save_preserves_ids_and_formats() {
    let editor = loaded_editor();
    let saved = save_tag_set(editor.store());

    let ids: Vec<_> = saved["celebrity"].tags.iter().map(|t| t.id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
    assert_eq!(saved["celebrity"].tags[1].text, "Grace, Alan");
    assert_eq!(saved["celebrity"].tags[0].end_time_ms, Some(2500.0));
    assert_eq!(saved["celebrity"].color.as_deref(), Some("#e6194b"));
    assert_eq!(saved["chapters"].tags[0].end_time_rat.as_deref(), Some("1001/100"));
}

#[test]
fn edited_tag_file_reloads_identically() {
    let mut editor = loaded_editor();
    let track = editor.store().track_by_key("celebrity").unwrap().id().clone();
    editor.add_tag(&track, Tag::new(10.0, 12.5, "Linus"));

    let file = TagFile::new(save_tag_set(editor.store()), editor.clip());
    let reread = TagFile::from_json(&file.to_json().unwrap()).unwrap();

    let mut store = TrackStore::new(&config(), SequentialIds::shared("r"));
    load_tag_set(&mut store, &reread.tracks);
    let reloaded = store.track_by_key("celebrity").unwrap();
    let texts: Vec<_> = reloaded.tags().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["Ada", "Grace, Alan", "Linus"]);
    assert_eq!(
        reloaded.tags()[2].id,
        editor.store().track(&track).unwrap().tags()[2].id
    );
}

#[test]
fn only_changed_tracks_are_saved() {
    let mut editor = loaded_editor();
    let baseline = version_baseline(editor.store());
    let chapters = editor.store().track_by_key("chapters").unwrap().id().clone();
    let tag = editor.store().tracks()[1].tags()[0].clone();
    assert!(editor.modify_tag(&chapters, Tag { text: "Cold open".into(), ..tag }));

    let changed = save_changed(editor.store(), &baseline);
    assert_eq!(changed.len(), 1);
    assert_eq!(changed["chapters"].tags[0].text, "Cold open");
}

// ── Flush ──────────────────────────────────────────────────────

#[tokio::test]
async fn failed_flush_keeps_local_state() {
    let mut editor = loaded_editor();
    let track = editor.store().track_by_key("celebrity").unwrap().id().clone();
    let id = editor.add_tag(&track, Tag::new(20.0, 21.0, "Hedy")).unwrap();
    let before = editor.store().snapshot();

    let coordinator = FlushCoordinator::new(FailingSink);
    let batch = editor.pending_batch();
    assert_eq!(batch.items.len(), 1);
    assert_eq!(batch.items[0].op, ChangeOp::Create);

    match coordinator.submit(batch).wait().await {
        FlushOutcome::Failed(e) => assert!(e.is_retryable()),
        FlushOutcome::Completed(_) => panic!("flush should fail"),
    }

    assert_eq!(editor.store().snapshot(), before);
    assert!(editor.store().tag(&track, &id).is_some());
    assert_eq!(editor.pending_batch().items.len(), 1);

    // Undo still works against the unflushed edit.
    editor.undo();
    assert!(editor.store().tag(&track, &id).is_none());
}

#[tokio::test]
async fn successful_flush_clears_pending_but_not_history() {
    let mut editor = loaded_editor();
    let track = editor.store().track_by_key("celebrity").unwrap().id().clone();
    editor.add_tag(&track, Tag::new(20.0, 21.0, "Hedy"));

    let coordinator = FlushCoordinator::new(AcceptingSink);
    let ticket = coordinator.submit(editor.pending_batch());
    // An edit made while the flush is running stays pending.
    let late = editor.add_tag(&track, Tag::new(30.0, 31.0, "Katherine")).unwrap();

    let FlushOutcome::Completed(batch) = ticket.wait().await else {
        panic!("flush should complete");
    };
    editor.mark_flushed(&batch);

    let rest = editor.pending_batch();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].entity.id, late.to_string());
    assert!(editor.history().can_undo());
    assert!(editor.has_pending_flush());
}
