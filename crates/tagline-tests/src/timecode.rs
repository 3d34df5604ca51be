//! Integration tests for playhead positioning against loaded tags.

use serde_json::json;
use tagline_core::{FrameRate, FrameRounding, Seekable, SequentialIds, TimecodeEngine};
use tagline_timeline::{load_tag_set, EditorConfig, TagId, TagSet, TrackStore};

// ── Helpers ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Player {
    position: f64,
}

impl Seekable for Player {
    fn seek_to_seconds(&mut self, seconds: f64) {
        self.position = seconds;
    }
}

fn ntsc_store() -> TrackStore {
    let config = EditorConfig {
        frame_rate: FrameRate::FPS_29_97,
        drop_frame: true,
        ..EditorConfig::default()
    };
    let mut store = TrackStore::new(&config, SequentialIds::shared("tag"));
    let engine = *store.engine();
    let rat = |frame: i64| engine.frame_to_rat(frame);
    let set: TagSet = serde_json::from_value(json!({
        "markers": {
            "label": "Markers",
            "track_type": "clip_marker",
            "tags": [
                { "id": "m1", "start_time_rat": rat(1800), "end_time_rat": rat(1830), "text": "minute one" },
                { "id": "m2", "start_time_rat": rat(17982), "end_time_rat": rat(18000), "text": "minute ten" }
            ]
        }
    }))
    .unwrap();
    load_tag_set(&mut store, &set);
    store
}

fn active_ids(store: &TrackStore, seconds: f64) -> Vec<String> {
    store
        .active_tags_at(seconds)
        .into_iter()
        .flat_map(|(_, tags)| tags.into_iter().map(|t| t.id.to_string()))
        .collect()
}

// ── Seeking by label ───────────────────────────────────────────

#[test]
fn seek_to_drop_frame_label_finds_tag() {
    let store = ntsc_store();
    let engine = *store.engine();
    let mut player = Player::default();

    let frame = engine.smpte_to_frame("00:01:00;02");
    assert_eq!(frame, 1800);
    engine.seek(&mut player, frame);
    assert_eq!(active_ids(&store, player.position), vec!["m1"]);

    engine.seek(&mut player, engine.smpte_to_frame("00:00:59;29"));
    assert!(active_ids(&store, player.position).is_empty());
}

#[test]
fn tenth_minute_label_is_not_dropped() {
    let store = ntsc_store();
    let engine = *store.engine();
    let mut player = Player::default();

    engine.seek(&mut player, engine.smpte_to_frame("00:10:00;00"));
    assert_eq!(active_ids(&store, player.position), vec!["m2"]);
    assert_eq!(
        engine.time_to_smpte(store.find_tag(&TagId::new("m2")).unwrap().1.start_time),
        "00:10:00;00"
    );
}

#[test]
fn dropped_label_snaps_to_first_valid_frame() {
    let store = ntsc_store();
    let engine = *store.engine();
    let frame = engine.smpte_to_frame("00:01:00;00");
    assert_eq!(engine.frame_to_smpte(frame), "00:01:00;02");
}

#[test]
fn midpoint_seek_survives_player_jitter() {
    let engine = TimecodeEngine::new(FrameRate::FPS_29_97, true);
    let mut player = Player::default();
    for frame in [0, 29, 30, 1800, 17982, 18000] {
        engine.seek(&mut player, frame);
        let half_frame = engine.frame_rate().frame_duration().to_seconds_f64() / 2.0;
        for jitter in [-0.4 * half_frame, 0.0, 0.4 * half_frame] {
            assert_eq!(
                engine.time_to_frame(player.position + jitter, FrameRounding::Floor),
                frame,
                "frame {frame} jitter {jitter}"
            );
        }
    }
}

#[test]
fn rate_change_marks_timing_stale() {
    let mut store = ntsc_store();
    store.take_invalidation();
    store.set_frame_rate(FrameRate::FPS_25);
    let stale = store.take_invalidation();
    assert!(stale.timing);
    assert!(!stale.track_list);
    // Tags keep their times in seconds.
    assert_eq!(active_ids(&store, 60.07), vec!["m1"]);
}
