//! Integration tests for recorded editing through the editor.

use proptest::prelude::*;
use tagline_core::{FrameRate, SequentialIds};
use tagline_timeline::{
    EditContext, Editor, EditorConfig, RebuildPolicy, Tag, TagId, TrackId, TrackKind, TrackSpec, TrackUpdate,
};

// ── Helpers ────────────────────────────────────────────────────

fn editor_with(policy: RebuildPolicy) -> Editor {
    let config = EditorConfig {
        frame_rate: FrameRate::FPS_25,
        rebuild_policy: policy,
        linear_scan_threshold: 4,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(&config, SequentialIds::shared("id"));
    editor.set_context(EditContext::new("tags").with_subpage("celebrity"));
    editor
}

fn editor() -> Editor {
    editor_with(RebuildPolicy::Eager)
}

fn tag_ids(editor: &Editor, track: &TrackId, t: f64) -> Vec<TagId> {
    let mut ids: Vec<_> = editor
        .store()
        .tags_at(track, t)
        .into_iter()
        .map(|tag| tag.id.clone())
        .collect();
    ids.sort();
    ids
}

// ── Normalisation ──────────────────────────────────────────────

#[test]
fn inverted_tag_becomes_one_frame_long() {
    let mut editor = editor();
    let track = editor.add_track(TrackSpec::new("celebrity", "Celebrity", TrackKind::Metadata));
    let id = editor.add_tag(&track, Tag::new(5.0, 3.0, "backwards")).unwrap();

    let tag = editor.store().tag(&track, &id).unwrap();
    assert_eq!(tag.start_time, 5.0);
    assert!((tag.end_time - 5.04).abs() < 1e-9);
    assert!(tag.end_time >= tag.start_time);
    assert_eq!(tag_ids(&editor, &track, 5.02), vec![id]);
}

// ── Undo/redo ──────────────────────────────────────────────────

#[test]
fn redo_invalidation_is_scoped_to_context() {
    let x = EditContext::new("tags").with_subpage("x");
    let y = EditContext::new("tags").with_subpage("y");
    let mut editor = editor();
    let track = editor.add_track(TrackSpec::new("k", "K", TrackKind::Metadata));

    editor.set_context(x.clone());
    editor.add_tag(&track, Tag::new(0.0, 1.0, "x1"));
    editor.set_context(y.clone());
    editor.add_tag(&track, Tag::new(2.0, 3.0, "y1"));

    editor.undo();
    editor.set_context(x.clone());
    editor.undo();
    assert_eq!(editor.history().redo_depth(&x), 1);
    assert_eq!(editor.history().redo_depth(&y), 1);

    editor.add_tag(&track, Tag::new(4.0, 5.0, "x2"));
    assert_eq!(editor.history().redo_depth(&x), 0);
    assert_eq!(editor.history().redo_depth(&y), 1);

    editor.set_context(y);
    assert!(editor.redo().is_some());
    assert_eq!(editor.store().tags_at(&track, 2.5)[0].text, "y1");
}

#[test]
fn unsaved_changes_follow_position() {
    let ctx = EditContext::new("tags").with_subpage("celebrity");
    let mut editor = editor();
    assert!(!editor.has_unsaved_changes());
    let track = editor.add_track(TrackSpec::new("k", "K", TrackKind::Metadata));
    assert!(editor.has_unsaved_changes());
    assert_eq!(editor.history().position(&ctx), 1);
    editor.undo();
    assert!(!editor.has_unsaved_changes());
    assert!(editor.store().track(&track).is_none());
}

#[test]
fn deleting_selected_tag_clears_selection() {
    let mut editor = editor();
    let track = editor.add_track(TrackSpec::new("k", "K", TrackKind::Metadata));
    let id = editor.add_tag(&track, Tag::new(0.0, 1.0, "a")).unwrap();
    editor.select_tags(&track, &[id.clone()]);
    assert!(editor.store().selection().contains_tag(&id));

    editor.delete_tag(&track, &id);
    assert!(!editor.store().selection().contains_tag(&id));
    let stale = editor.take_invalidation();
    assert!(stale.selection);
    assert!(stale.touches(&track));
}

#[derive(Debug, Clone)]
enum Edit {
    AddTag(f64, f64),
    ModifyTag(usize, f64, f64),
    DeleteTag(usize),
    ToggleVisible,
    AddTrack,
    DeleteTrack(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (0.0f64..60.0, -5.0f64..10.0).prop_map(|(s, len)| Edit::AddTag(s, s + len)),
        2 => (any::<usize>(), 0.0f64..60.0, 0.0f64..10.0).prop_map(|(i, s, len)| Edit::ModifyTag(i, s, s + len)),
        2 => any::<usize>().prop_map(Edit::DeleteTag),
        1 => Just(Edit::ToggleVisible),
        1 => Just(Edit::AddTrack),
        1 => any::<usize>().prop_map(Edit::DeleteTrack),
    ]
}

/// Apply one edit. Returns whether it was recorded.
fn apply(editor: &mut Editor, edit: &Edit) -> bool {
    let tracks: Vec<TrackId> = editor.store().tracks().iter().map(|t| t.id().clone()).collect();
    let Some(track) = tracks.first().cloned() else {
        return match edit {
            Edit::AddTrack => {
                editor.add_track(TrackSpec::new("k", "K", TrackKind::Metadata));
                true
            }
            _ => false,
        };
    };
    let tags: Vec<TagId> = editor.store().track(&track).unwrap().tags().iter().map(|t| t.id.clone()).collect();
    match *edit {
        Edit::AddTag(s, e) => editor.add_tag(&track, Tag::new(s, e, "p")).is_some(),
        Edit::ModifyTag(i, s, e) if !tags.is_empty() => {
            let mut tag = editor.store().tag(&track, &tags[i % tags.len()]).unwrap().clone();
            tag.start_time = s;
            tag.end_time = e;
            editor.modify_tag(&track, tag)
        }
        Edit::DeleteTag(i) if !tags.is_empty() => editor.delete_tag(&track, &tags[i % tags.len()]),
        Edit::ToggleVisible => {
            let visible = editor.store().track(&track).unwrap().is_visible();
            editor.modify_track(
                &track,
                TrackUpdate {
                    visible: Some(!visible),
                    ..TrackUpdate::default()
                },
            )
        }
        Edit::AddTrack => {
            editor.add_track(TrackSpec::new(format!("k{}", tracks.len()), "More", TrackKind::Segment));
            true
        }
        Edit::DeleteTrack(i) => editor.delete_track(&tracks[i % tracks.len()]),
        _ => false,
    }
}

proptest! {
    #[test]
    fn undo_and_redo_are_exact_inverses(
        edits in prop::collection::vec(edit(), 1..40),
        deferred in any::<bool>(),
    ) {
        let mut editor = editor_with(if deferred { RebuildPolicy::Deferred } else { RebuildPolicy::Eager });
        editor.add_track(TrackSpec::new("base", "Base", TrackKind::Metadata));

        for edit in &edits {
            let before = editor.store().snapshot();
            if !apply(&mut editor, edit) {
                prop_assert_eq!(editor.store().snapshot(), before);
                continue;
            }
            let after = editor.store().snapshot();

            prop_assert!(editor.undo().is_some());
            prop_assert_eq!(editor.store().snapshot(), before);
            prop_assert!(editor.redo().is_some());
            prop_assert_eq!(editor.store().snapshot(), after);
        }
    }

    #[test]
    fn full_undo_returns_to_start(edits in prop::collection::vec(edit(), 1..30)) {
        let mut editor = editor();
        editor.add_track(TrackSpec::new("base", "Base", TrackKind::Metadata));
        let start = editor.store().snapshot();
        let base_depth = editor.history().position(editor.history().context());

        for edit in &edits {
            apply(&mut editor, edit);
        }
        while editor.history().position(editor.history().context()) > base_depth {
            editor.undo();
        }
        prop_assert_eq!(editor.store().snapshot(), start);
    }

    #[test]
    fn queries_match_tag_set_after_edits(
        edits in prop::collection::vec(edit(), 1..40),
        points in prop::collection::vec(0.0f64..75.0, 1..10),
    ) {
        let mut editor = editor_with(RebuildPolicy::Deferred);
        editor.add_track(TrackSpec::new("base", "Base", TrackKind::Metadata));
        for edit in &edits {
            apply(&mut editor, edit);
        }
        for track in editor.store().tracks() {
            for &t in &points {
                let mut expected: Vec<TagId> = track
                    .tags()
                    .iter()
                    .filter(|tag| tag.is_well_formed() && tag.overlaps(t, t))
                    .map(|tag| tag.id.clone())
                    .collect();
                expected.sort();
                prop_assert_eq!(tag_ids(&editor, track.id(), t), expected);
            }
        }
    }
}
