//! Tagline Core - Foundation types for frame-accurate tag editing
//!
//! This crate provides the fundamental types used throughout Tagline:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - The timecode engine (frames, seconds, SMPTE labels, drop-frame)
//! - Injected id generation
//! - Track colors

pub mod color;
pub mod error;
pub mod ids;
pub mod time;
pub mod timecode;

pub use color::{palette_color, Color, TRACK_PALETTE};
pub use error::{Result, TaglineError};
pub use ids::{IdGenerator, SequentialIds, SharedIds, UuidIds};
pub use time::{FrameRate, RateKey, RationalTime, TimeRange};
pub use timecode::{FrameRounding, Seekable, TimecodeEngine};
