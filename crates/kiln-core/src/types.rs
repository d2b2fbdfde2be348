//! Pixel, color and geometry types

use serde::{Deserialize, Serialize};
use std::fmt;

/// An 8-bit RGBA color
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn from_array(px: [u8; 4]) -> Self {
        Self::new(px[0], px[1], px[2], px[3])
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse `#rgb`, `#rrggbb` or `rrggbb` into an opaque color
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        let parse = |h: &str| u8::from_str_radix(h, 16).ok();
        match hex.len() {
            6 => Some(Self::opaque(
                parse(hex.get(0..2)?)?,
                parse(hex.get(2..4)?)?,
                parse(hex.get(4..6)?)?,
            )),
            3 => {
                let r = parse(hex.get(0..1)?)?;
                let g = parse(hex.get(1..2)?)?;
                let b = parse(hex.get(2..3)?)?;
                Some(Self::opaque(r * 17, g * 17, b * 17))
            }
            _ => None,
        }
    }

    /// Lower-case `#rrggbb` (alpha dropped)
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Squared euclidean distance in RGB space
    pub fn distance_sq(self, other: Self) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Convert to hue (degrees), saturation and value in [0, 1]
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let sat = if max == 0.0 { 0.0 } else { delta / max };
        (hue, sat, max)
    }

    /// Build a color from hue (degrees), saturation, value and alpha
    pub fn from_hsv(hue: f32, sat: f32, val: f32, a: u8) -> Self {
        let hue = hue.rem_euclid(360.0);
        let sat = sat.clamp(0.0, 1.0);
        let val = val.clamp(0.0, 1.0);
        let c = val * sat;
        let x = c * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = val - c;
        let (r, g, b) = match (hue / 60.0) as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b), a)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Target pixel resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An integer pixel rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// True if the rectangle lies fully inside a `width` x `height` area
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.checked_add(self.w).is_some_and(|r| r <= width)
            && self.y.checked_add(self.h).is_some_and(|b| b <= height)
    }
}

/// A rectangle normalized to a cell, all components in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parse() {
        assert_eq!(Rgba::from_hex("#ff8000"), Some(Rgba::opaque(255, 128, 0)));
        assert_eq!(Rgba::from_hex("fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::from_hex("#12345"), None);
        assert_eq!(Rgba::from_hex("#gg0000"), None);
    }

    #[test]
    fn test_hex_format() {
        assert_eq!(Rgba::opaque(255, 128, 0).to_hex(), "#ff8000");
    }

    #[test]
    fn test_hsv_primary_colors() {
        let (h, s, v) = Rgba::opaque(255, 0, 0).to_hsv();
        assert_eq!((h, s, v), (0.0, 1.0, 1.0));
        let (h, _, _) = Rgba::opaque(0, 0, 255).to_hsv();
        assert!((h - 240.0).abs() < 0.01);
    }

    #[test]
    fn test_hsv_roundtrip_close() {
        let c = Rgba::new(200, 100, 50, 77);
        let (h, s, v) = c.to_hsv();
        let back = Rgba::from_hsv(h, s, v, c.a);
        assert!(c.distance_sq(back) <= 3);
        assert_eq!(back.a, 77);
    }

    #[test]
    fn test_rect_fits() {
        assert!(Rect::new(0, 0, 64, 64).fits_within(64, 64));
        assert!(!Rect::new(1, 0, 64, 64).fits_within(64, 64));
        assert!(!Rect::new(u32::MAX, 0, 2, 2).fits_within(64, 64));
    }

    #[test]
    fn test_resolution_valid() {
        assert!(Resolution::new(1, 1).is_valid());
        assert!(!Resolution::new(0, 32).is_valid());
    }
}
