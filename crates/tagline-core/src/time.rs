//! Time representation for frame-accurate editing
//!
//! Uses rational numbers to avoid floating-point accumulation errors.
//! All time values are represented as numerator/denominator pairs, and the
//! persisted `"num/denom"` string form round-trips through them exactly.

use num_rational::{Ratio, Rational64};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::{Result, TaglineError};

/// A rational time value representing a point in time.
/// Uses rational arithmetic to maintain frame-accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    /// Time value as a rational number (seconds)
    value: Rational64,
}

impl RationalTime {
    /// Create a new RationalTime from numerator and denominator.
    /// The time is `numerator / denominator` seconds.
    ///
    /// # Panics
    /// Panics if `denominator` is zero.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// `numerator / denominator`, or `None` for a zero denominator or an
    /// `i64::MIN` term, which cannot be sign-normalised.
    pub fn checked_new(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 || numerator == i64::MIN || denominator == i64::MIN {
            return None;
        }
        Some(Self::new(numerator, denominator))
    }

    /// Create a RationalTime from a frame number and frame rate. Frame
    /// counts too large for exact arithmetic go through `f64`.
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        if rate.numerator == 0 {
            return Self::ZERO;
        }
        match frames.checked_mul(rate.denominator as i64) {
            Some(scaled) => Self::new(scaled, rate.numerator as i64),
            None => Self::from_seconds_f64(frames as f64 * rate.denominator as f64 / rate.numerator as f64),
        }
    }

    /// Create a RationalTime from seconds as a float.
    /// Note: May introduce small precision errors.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        // Use a high denominator for reasonable precision
        const PRECISION: i64 = 1_000_000;
        if !seconds.is_finite() {
            return Self::ZERO;
        }
        Self {
            value: Rational64::new((seconds * PRECISION as f64).round() as i64, PRECISION),
        }
    }

    /// Parse the persisted `"num/denom"` form. A bare integer or decimal is
    /// accepted as whole seconds. Returns `None` for anything else,
    /// including a zero denominator.
    pub fn parse_rat(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        match s.split_once('/') {
            Some((n, d)) => {
                let n: i64 = n.trim().parse().ok()?;
                let d: i64 = d.trim().parse().ok()?;
                Self::checked_new(n, d)
            }
            None => {
                if let Ok(whole) = s.parse::<i64>() {
                    return Self::checked_new(whole, 1);
                }
                let secs: f64 = s.parse().ok()?;
                secs.is_finite().then(|| Self::from_seconds_f64(secs))
            }
        }
    }

    /// Render as the persisted `"num/denom"` form (reduced).
    pub fn to_rat_string(self) -> String {
        format!("{}/{}", self.value.numer(), self.value.denom())
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Convert to frame number at the given frame rate (floored). Saturates
    /// at the `i64` range.
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        let denom = *self.value.denom() as i128 * rate.denominator as i128;
        if denom == 0 {
            return 0;
        }
        let numer = *self.value.numer() as i128 * rate.numerator as i128;
        numer
            .div_euclid(denom)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };

    /// Check if this time is zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        *self.value.numer() == 0
    }

    /// Check if this time lies before zero.
    #[inline]
    pub fn is_negative(self) -> bool {
        *self.value.numer() < 0
    }

    /// Get the absolute value of this time.
    #[inline]
    pub fn abs(self) -> Self {
        if self.is_negative() {
            -self
        } else {
            self
        }
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl Neg for RationalTime {
    type Output = Self;
    fn neg(self) -> Self {
        Self { value: -self.value }
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self {
            value: self.value * rhs,
        }
    }
}

impl Div<i64> for RationalTime {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self {
            value: self.value / rhs,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Well-known frame rate families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateKey {
    /// 24 fps
    Film,
    /// 25 fps
    Pal,
    /// 30 fps
    Web,
    /// 50 fps
    PalHd,
    /// 60 fps
    High,
    /// 24000/1001
    NtscFilm,
    /// 30000/1001
    Ntsc,
    /// 60000/1001
    NtscHd,
    /// Anything else.
    Other,
}

impl RateKey {
    const KNOWN: [(f64, RateKey); 8] = [
        (24000.0 / 1001.0, RateKey::NtscFilm),
        (24.0, RateKey::Film),
        (25.0, RateKey::Pal),
        (30000.0 / 1001.0, RateKey::Ntsc),
        (30.0, RateKey::Web),
        (50.0, RateKey::PalHd),
        (60000.0 / 1001.0, RateKey::NtscHd),
        (60.0, RateKey::High),
    ];

    /// Exact rational rate for this key, if it has one.
    pub fn frame_rate(self) -> Option<FrameRate> {
        match self {
            Self::Film => Some(FrameRate::FPS_24),
            Self::Pal => Some(FrameRate::FPS_25),
            Self::Web => Some(FrameRate::FPS_30),
            Self::PalHd => Some(FrameRate::FPS_50),
            Self::High => Some(FrameRate::FPS_60),
            Self::NtscFilm => Some(FrameRate::FPS_23_976),
            Self::Ntsc => Some(FrameRate::FPS_29_97),
            Self::NtscHd => Some(FrameRate::FPS_59_94),
            Self::Other => None,
        }
    }

    /// Whether drop-frame timecode may be used with this family.
    pub fn supports_drop_frame(self) -> bool {
        matches!(self, Self::NtscFilm | Self::Ntsc | Self::NtscHd)
    }

    fn detect(fps: f64, tolerance: f64) -> Self {
        Self::KNOWN
            .iter()
            .find(|(value, _)| (fps - value).abs() < tolerance)
            .map(|(_, key)| *key)
            .unwrap_or(Self::Other)
    }
}

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Parse `"30000/1001"`, `"29.97"` or `"24"`.
    ///
    /// Decimal forms that name an NTSC rate resolve to the exact 1001-based
    /// rational.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || TaglineError::InvalidParameter(format!("invalid frame rate: {s:?}"));

        let rate = if let Some((n, d)) = s.split_once('/') {
            let n: u32 = n.trim().parse().map_err(|_| invalid())?;
            let d: u32 = d.trim().parse().map_err(|_| invalid())?;
            if n == 0 || d == 0 {
                return Err(invalid());
            }
            let reduced = Ratio::new(n, d);
            Self::new(*reduced.numer(), *reduced.denom())
        } else {
            let fps: f64 = s.parse().map_err(|_| invalid())?;
            if !fps.is_finite() || fps <= 0.0 {
                return Err(invalid());
            }
            match RateKey::detect(fps, 0.01).frame_rate() {
                Some(rate) => rate,
                None => {
                    let millis = (fps * 1000.0).round() as u32;
                    if millis == 0 {
                        return Err(invalid());
                    }
                    let reduced = Ratio::new(millis, 1000);
                    Self::new(*reduced.numer(), *reduced.denom())
                }
            }
        };
        Ok(rate)
    }

    /// Whether both terms are non-zero.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.numerator != 0 && self.denominator != 0
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Integer frame count used for timecode labels (30 for 29.97).
    #[inline]
    pub fn nominal_fps(self) -> u32 {
        (self.to_fps_f64().round() as u32).max(1)
    }

    /// The rate family this value falls into.
    pub fn rate_key(self) -> RateKey {
        if !self.is_valid() {
            return RateKey::Other;
        }
        RateKey::detect(self.to_fps_f64(), 0.001)
    }

    /// Frame numbers skipped at each non-exempt minute in drop-frame
    /// timecode, or `None` when the rate has no drop-frame form.
    pub fn drop_frames_per_minute(self) -> Option<u32> {
        match self.rate_key() {
            RateKey::NtscHd => Some(4),
            RateKey::Ntsc | RateKey::NtscFilm => Some(2),
            _ => None,
        }
    }

    /// Duration of a single frame.
    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(self.denominator as i64, self.numerator as i64)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A time range with inclusive start and exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub start: RationalTime,
    /// Duration of the range
    pub duration: RationalTime,
}

impl TimeRange {
    /// Create a new time range from start and duration.
    #[inline]
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// Create a time range from start and end times.
    #[inline]
    pub fn from_start_end(start: RationalTime, end: RationalTime) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    /// End time (exclusive).
    #[inline]
    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    /// Check if a time is within this range.
    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end()
    }

    /// Check if two ranges overlap.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        Some(Self::from_start_end(start, end))
    }

    /// Empty range starting at zero.
    pub const EMPTY: Self = Self {
        start: RationalTime::ZERO,
        duration: RationalTime::ZERO,
    };
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}
