//! Track colors.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color with 8-bit components, laid out for direct upload by a
/// renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a new color from RGBA components.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from RGB with full opacity.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// `#rrggbb`, with an alpha byte appended only when not opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Normalised float components, for shaders.
    #[inline]
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color {s:?}")))
    }
}

/// Fixed palette for tracks without a persisted color.
pub const TRACK_PALETTE: [Color; 12] = [
    Color::rgb(0x19, 0xad, 0xe6),
    Color::rgb(0xe6, 0x5c, 0x19),
    Color::rgb(0x52, 0xc4, 0x1a),
    Color::rgb(0xd9, 0x2b, 0x8b),
    Color::rgb(0xf2, 0xc0, 0x1d),
    Color::rgb(0x7a, 0x4d, 0xe8),
    Color::rgb(0x1a, 0xc4, 0x9b),
    Color::rgb(0xe8, 0x3b, 0x3b),
    Color::rgb(0x3b, 0x6f, 0xe8),
    Color::rgb(0xa8, 0xc4, 0x1a),
    Color::rgb(0xc4, 0x7a, 0x1a),
    Color::rgb(0x8c, 0x8c, 0x8c),
];

/// Deterministic palette color for a track key. The same key maps to the
/// same color on every run and every platform (FNV-1a, not `std` hashing).
pub fn palette_color(key: &str) -> Color {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    TRACK_PALETTE[hash as usize % TRACK_PALETTE.len()]
}
