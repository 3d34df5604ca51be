//! Integration test crate for Tagline.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives tagline-core and tagline-timeline together the way the
//! editor does.

#[cfg(test)]
mod editing;

#[cfg(test)]
mod persistence;

#[cfg(test)]
mod timecode;
