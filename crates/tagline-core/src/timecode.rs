//! Frame-accurate timecode engine.
//!
//! Converts between wall-clock seconds, integer frame numbers, SMPTE labels
//! and the persisted `"num/denom"` rational form for one playable media
//! instance. Every conversion is a pure function of the frame rate, the
//! drop-frame flag and the input value.
//!
//! Drop-frame labels skip the first 2 frame numbers (4 at 59.94) of every
//! minute that is not a multiple of ten.

use serde::{Deserialize, Serialize};

use crate::time::{FrameRate, RationalTime};

/// Snap within this distance of a frame boundary before flooring, so that
/// seconds produced by `frame_to_seconds` map back to the same frame.
const FRAME_EPSILON: f64 = 1e-6;

/// How `time_to_frame` resolves a time that falls inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameRounding {
    /// The frame whose display interval contains the time.
    #[default]
    Floor,
    /// The frame boundary closest to the time (scrub snapping).
    Nearest,
}

/// A playback target that can be positioned in seconds.
pub trait Seekable {
    fn seek_to_seconds(&mut self, seconds: f64);
}

#[derive(Debug, Clone, Copy)]
struct DropRule {
    fps: i64,
    drop: i64,
    per_minute: i64,
    per_ten_minutes: i64,
}

impl DropRule {
    fn frames_per_day(self) -> i64 {
        self.per_ten_minutes * 6 * 24
    }
}

/// Timecode conversions for one frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimecodeEngine {
    rate: FrameRate,
    drop_frame: bool,
    duration: Option<RationalTime>,
}

impl TimecodeEngine {
    /// Create an engine. The drop-frame flag is stored as given but only
    /// takes effect for the NTSC rate family.
    pub fn new(rate: FrameRate, drop_frame: bool) -> Self {
        Self {
            rate: sanitize(rate),
            drop_frame,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: RationalTime) -> Self {
        self.set_duration(Some(duration));
        self
    }

    #[inline]
    pub fn frame_rate(&self) -> FrameRate {
        self.rate
    }

    /// Change the frame rate. Frame counts derived from the previous rate
    /// (including `total_frames`) must be recomputed by the caller.
    pub fn set_frame_rate(&mut self, rate: FrameRate) {
        self.rate = sanitize(rate);
    }

    pub fn set_drop_frame(&mut self, drop_frame: bool) {
        self.drop_frame = drop_frame;
    }

    /// Whether labels are currently rendered in drop-frame form.
    pub fn is_drop_frame(&self) -> bool {
        self.drop_rule().is_some()
    }

    pub fn duration(&self) -> Option<RationalTime> {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Option<RationalTime>) {
        self.duration = duration.filter(|d| !d.is_negative());
    }

    /// Number of whole frames in the media, or 0 when the duration is unknown.
    pub fn total_frames(&self) -> i64 {
        self.duration
            .map(|d| self.time_to_frame_exact(d))
            .unwrap_or(0)
    }

    fn drop_rule(&self) -> Option<DropRule> {
        if !self.drop_frame {
            return None;
        }
        let drop = self.rate.drop_frames_per_minute()? as i64;
        let fps = self.rate.nominal_fps() as i64;
        let per_minute = fps * 60 - drop;
        Some(DropRule {
            fps,
            drop,
            per_minute,
            per_ten_minutes: per_minute * 10 + drop,
        })
    }

    // ── Frames and seconds ──────────────────────────────────────

    /// Exact start time of a frame.
    #[inline]
    pub fn frame_to_time(&self, frame: i64) -> RationalTime {
        RationalTime::from_frames(frame, self.rate)
    }

    #[inline]
    pub fn frame_to_seconds(&self, frame: i64) -> f64 {
        self.frame_to_time(frame).to_seconds_f64()
    }

    /// Frame containing `seconds`. Negative, NaN and infinite input map to 0.
    pub fn time_to_frame(&self, seconds: f64, rounding: FrameRounding) -> i64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        let exact = seconds * self.rate.numerator as f64 / self.rate.denominator as f64;
        let nearest = exact.round();
        let frame = match rounding {
            FrameRounding::Nearest => nearest,
            FrameRounding::Floor if (exact - nearest).abs() < FRAME_EPSILON => nearest,
            FrameRounding::Floor => exact.floor(),
        };
        frame as i64
    }

    /// Frame containing an exact time (floored). Negative times map to 0.
    pub fn time_to_frame_exact(&self, time: RationalTime) -> i64 {
        if time.is_negative() {
            return 0;
        }
        time.to_frames(self.rate)
    }

    // ── SMPTE labels ────────────────────────────────────────────

    /// Render a frame as `HH:MM:SS:FF`, or `HH:MM:SS;FF` in drop-frame.
    /// Hours wrap at 24; negative frames render as frame 0.
    pub fn frame_to_smpte(&self, frame: i64) -> String {
        let frame = frame.max(0);
        let (label_frame, fps, separator) = match self.drop_rule() {
            Some(rule) => {
                let frame = frame % rule.frames_per_day();
                let blocks = frame / rule.per_ten_minutes;
                let remainder = frame % rule.per_ten_minutes;
                let mut skipped = 9 * rule.drop * blocks;
                if remainder > rule.drop {
                    skipped += rule.drop * ((remainder - rule.drop) / rule.per_minute);
                }
                (frame + skipped, rule.fps, ';')
            }
            None => {
                let fps = self.rate.nominal_fps() as i64;
                (frame % (fps * 86_400), fps, ':')
            }
        };

        let frames = label_frame % fps;
        let seconds = (label_frame / fps) % 60;
        let minutes = (label_frame / (fps * 60)) % 60;
        let hours = (label_frame / (fps * 3600)) % 24;
        format!("{hours:02}:{minutes:02}:{seconds:02}{separator}{frames:02}")
    }

    /// Parse an SMPTE label. `:`, `;` and `.` are all accepted before the
    /// frames field. Malformed or out-of-range labels yield 0. Drop-frame
    /// labels that do not exist snap forward to the first label of their
    /// minute.
    pub fn smpte_to_frame(&self, label: &str) -> i64 {
        let Some([hours, minutes, seconds, mut frames]) = parse_smpte_fields(label) else {
            return 0;
        };
        let fps = self.rate.nominal_fps() as i64;
        if minutes >= 60 || seconds >= 60 || frames >= fps {
            return 0;
        }
        let hours = hours % 24;
        let total_minutes = hours * 60 + minutes;

        match self.drop_rule() {
            Some(rule) => {
                if seconds == 0 && minutes % 10 != 0 && frames < rule.drop {
                    frames = rule.drop;
                }
                let nominal = (total_minutes * 60 + seconds) * rule.fps + frames;
                nominal - rule.drop * (total_minutes - total_minutes / 10)
            }
            None => (total_minutes * 60 + seconds) * fps + frames,
        }
    }

    pub fn time_to_smpte(&self, seconds: f64) -> String {
        self.frame_to_smpte(self.time_to_frame(seconds, FrameRounding::Floor))
    }

    /// Wall-clock display, `HH:MM:SS.mmm`.
    pub fn time_to_string(&self, seconds: f64) -> String {
        let millis = if seconds.is_finite() && seconds > 0.0 {
            (seconds * 1000.0).round() as i64
        } else {
            0
        };
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            millis / 3_600_000,
            (millis / 60_000) % 60,
            (millis / 1000) % 60,
            millis % 1000
        )
    }

    // ── Rational strings ────────────────────────────────────────

    /// Persisted form of a frame's start time.
    pub fn frame_to_rat(&self, frame: i64) -> String {
        self.frame_to_time(frame.max(0)).to_rat_string()
    }

    /// Frame for a persisted `"num/denom"` time. Malformed input yields 0.
    pub fn rat_to_frame(&self, rat: &str) -> i64 {
        self.rat_to_time(rat)
            .map(|t| self.time_to_frame_exact(t))
            .unwrap_or(0)
    }

    pub fn rat_to_time(&self, rat: &str) -> Option<RationalTime> {
        RationalTime::parse_rat(rat)
    }

    // ── Seeking ─────────────────────────────────────────────────

    /// Time at the middle of a frame's display interval.
    pub fn frame_midpoint(&self, frame: i64) -> RationalTime {
        RationalTime::from_frames(frame.max(0).saturating_mul(2).saturating_add(1), self.rate) / 2
    }

    /// Position `target` on `frame`. Lands mid-frame so that sub-frame
    /// jitter in the player's reported time cannot round into a neighbour.
    pub fn seek<S: Seekable + ?Sized>(&self, target: &mut S, frame: i64) {
        target.seek_to_seconds(self.frame_midpoint(frame).to_seconds_f64());
    }

    /// Seek to a fraction of the media. `p` is clamped to `[0, 1]`.
    pub fn seek_percentage<S: Seekable + ?Sized>(&self, target: &mut S, p: f64) {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        let total = self.total_frames();
        let mut frame = (total as f64 * p).floor() as i64;
        if total > 0 {
            frame = frame.min(total - 1);
        }
        self.seek(target, frame);
    }
}

impl Default for TimecodeEngine {
    fn default() -> Self {
        Self::new(FrameRate::default(), false)
    }
}

fn sanitize(rate: FrameRate) -> FrameRate {
    if rate.is_valid() {
        rate
    } else {
        FrameRate::default()
    }
}

fn parse_smpte_fields(label: &str) -> Option<[i64; 4]> {
    let mut fields = [0i64; 4];
    let mut count = 0;
    for part in label.trim().split([':', ';', '.']) {
        if count == 4 || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        fields[count] = part.parse().ok()?;
        count += 1;
    }
    (count == 4).then_some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Player {
        position: f64,
    }

    impl Seekable for Player {
        fn seek_to_seconds(&mut self, seconds: f64) {
            self.position = seconds;
        }
    }

    fn ntsc_df() -> TimecodeEngine {
        TimecodeEngine::new(FrameRate::FPS_29_97, true)
    }

    #[test]
    fn test_drop_frame_reference_table() {
        let engine = ntsc_df();
        let table = [
            (0, "00:00:00;00"),
            (29, "00:00:00;29"),
            (30, "00:00:01;00"),
            (1800, "00:01:00;02"),
            (17982, "00:10:00;00"),
            (18000, "00:10:00;18"),
        ];
        for (frame, label) in table {
            assert_eq!(engine.frame_to_smpte(frame), label, "frame {frame}");
            assert_eq!(engine.smpte_to_frame(label), frame, "label {label}");
        }
    }

    #[test]
    fn test_drop_frame_skips_at_minute() {
        let engine = ntsc_df();
        assert_eq!(engine.frame_to_smpte(1799), "00:00:59;29");
        assert_eq!(engine.frame_to_smpte(1800), "00:01:00;02");
    }

    #[test]
    fn test_tenth_minute_does_not_skip() {
        let engine = ntsc_df();
        assert_eq!(engine.frame_to_smpte(17981), "00:09:59;29");
        assert_eq!(engine.frame_to_smpte(17982), "00:10:00;00");
    }

    #[test]
    fn test_drop_frame_59_94_skips_four() {
        let engine = TimecodeEngine::new(FrameRate::FPS_59_94, true);
        assert_eq!(engine.frame_to_smpte(3599), "00:00:59;59");
        assert_eq!(engine.frame_to_smpte(3600), "00:01:00;04");
        assert_eq!(engine.smpte_to_frame("00:01:00;04"), 3600);
    }

    #[test]
    fn test_dropped_labels_are_tolerated() {
        let engine = ntsc_df();
        assert_eq!(engine.smpte_to_frame("00:01:00;00"), 1800);
        assert_eq!(engine.smpte_to_frame("00:01:00;01"), 1800);
        // Exempt minute keeps its zero label.
        assert_eq!(engine.smpte_to_frame("00:10:00;00"), 17982);
    }

    #[test]
    fn test_one_hour_drop_frame() {
        let engine = ntsc_df();
        // 29.97 DF tracks wall clock: one hour is 107892 frames.
        assert_eq!(engine.frame_to_smpte(107_892), "01:00:00;00");
    }

    #[test]
    fn test_drop_frame_ignored_for_integer_rates() {
        let engine = TimecodeEngine::new(FrameRate::FPS_30, true);
        assert!(!engine.is_drop_frame());
        assert_eq!(engine.frame_to_smpte(1800), "00:01:00:00");
    }

    #[test]
    fn test_non_drop_labels() {
        let engine = TimecodeEngine::new(FrameRate::FPS_24, false);
        assert_eq!(engine.frame_to_smpte(0), "00:00:00:00");
        assert_eq!(engine.frame_to_smpte(24 * 3723 + 4), "01:02:03:04");
        assert_eq!(engine.smpte_to_frame("01:02:03:04"), 24 * 3723 + 4);
    }

    #[test]
    fn test_hours_wrap_at_24() {
        let engine = TimecodeEngine::new(FrameRate::FPS_25, false);
        assert_eq!(engine.frame_to_smpte(25 * 86_400 + 1), "00:00:00:01");
    }

    #[test]
    fn test_malformed_smpte_is_zero() {
        let engine = TimecodeEngine::new(FrameRate::FPS_25, false);
        for label in ["", "garbage", "00:00:00", "00:00:00:00:00", "00:61:00:00", "00:00:00:25", "-1:00:00:00"] {
            assert_eq!(engine.smpte_to_frame(label), 0, "label {label:?}");
        }
        assert_eq!(engine.frame_to_smpte(-5), "00:00:00:00");
    }

    #[test]
    fn test_time_to_frame_handles_bad_input() {
        let engine = TimecodeEngine::new(FrameRate::FPS_24, false);
        assert_eq!(engine.time_to_frame(f64::NAN, FrameRounding::Floor), 0);
        assert_eq!(engine.time_to_frame(-3.0, FrameRounding::Floor), 0);
        assert_eq!(engine.time_to_frame(f64::INFINITY, FrameRounding::Nearest), 0);
    }

    #[test]
    fn test_time_to_frame_rounding() {
        let engine = TimecodeEngine::new(FrameRate::FPS_24, false);
        assert_eq!(engine.time_to_frame(1.0 / 24.0 * 2.9, FrameRounding::Floor), 2);
        assert_eq!(engine.time_to_frame(1.0 / 24.0 * 2.9, FrameRounding::Nearest), 3);
    }

    #[test]
    fn test_rat_roundtrip() {
        let engine = ntsc_df();
        let rat = engine.frame_to_rat(1800);
        assert_eq!(rat, "3003/50");
        assert_eq!(engine.rat_to_frame(&rat), 1800);
        assert_eq!(engine.rat_to_frame("not/a-rat"), 0);
    }

    #[test]
    fn test_extreme_rats_never_panic() {
        let engine = ntsc_df();
        assert_eq!(engine.rat_to_frame("1/-9223372036854775808"), 0);
        assert_eq!(engine.rat_to_frame("9223372036854775807/1"), i64::MAX);
        assert_eq!(engine.frame_to_smpte(engine.rat_to_frame("9223372036854775807/1")).len(), 11);

        let mut player = Player { position: 0.0 };
        engine.seek(&mut player, i64::MAX);
        assert!(player.position.is_finite() && player.position > 0.0);
    }

    #[test]
    fn test_seek_lands_mid_frame() {
        let engine = TimecodeEngine::new(FrameRate::FPS_25, false);
        let mut player = Player { position: 0.0 };
        engine.seek(&mut player, 10);
        assert!((player.position - 0.42).abs() < 1e-9);
        assert_eq!(engine.time_to_frame(player.position, FrameRounding::Floor), 10);
    }

    #[test]
    fn test_seek_percentage() {
        let engine = TimecodeEngine::new(FrameRate::FPS_25, false)
            .with_duration(RationalTime::new(10, 1));
        assert_eq!(engine.total_frames(), 250);

        let mut player = Player { position: 0.0 };
        engine.seek_percentage(&mut player, 0.5);
        assert_eq!(engine.time_to_frame(player.position, FrameRounding::Floor), 125);

        engine.seek_percentage(&mut player, 1.0);
        assert_eq!(engine.time_to_frame(player.position, FrameRounding::Floor), 249);
    }

    #[test]
    fn test_rate_change_recomputes_total_frames() {
        let mut engine = TimecodeEngine::new(FrameRate::FPS_25, false)
            .with_duration(RationalTime::new(10, 1));
        engine.set_frame_rate(FrameRate::FPS_50);
        assert_eq!(engine.total_frames(), 500);
    }

    #[test]
    fn test_time_to_string() {
        let engine = TimecodeEngine::default();
        assert_eq!(engine.time_to_string(3723.5), "01:02:03.500");
        assert_eq!(engine.time_to_string(f64::NAN), "00:00:00.000");
    }

    proptest! {
        #[test]
        fn prop_smpte_roundtrip_29_97_df(frame in 0i64..2_589_408) {
            let engine = ntsc_df();
            prop_assert_eq!(engine.smpte_to_frame(&engine.frame_to_smpte(frame)), frame);
        }

        #[test]
        fn prop_smpte_roundtrip_59_94_df(frame in 0i64..5_178_816) {
            let engine = TimecodeEngine::new(FrameRate::FPS_59_94, true);
            prop_assert_eq!(engine.smpte_to_frame(&engine.frame_to_smpte(frame)), frame);
        }

        #[test]
        fn prop_smpte_roundtrip_non_drop(frame in 0i64..2_160_000) {
            let engine = TimecodeEngine::new(FrameRate::FPS_25, false);
            prop_assert_eq!(engine.smpte_to_frame(&engine.frame_to_smpte(frame)), frame);
        }

        #[test]
        fn prop_frame_to_time_is_monotonic(a in 0i64..10_000_000, b in 0i64..10_000_000) {
            prop_assume!(a != b);
            let engine = ntsc_df();
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(engine.frame_to_time(lo) < engine.frame_to_time(hi));
        }

        #[test]
        fn prop_seconds_map_back_to_frame(frame in 0i64..10_000_000) {
            let engine = TimecodeEngine::new(FrameRate::FPS_23_976, false);
            let seconds = engine.frame_to_seconds(frame);
            prop_assert_eq!(engine.time_to_frame(seconds, FrameRounding::Floor), frame);
        }
    }
}
