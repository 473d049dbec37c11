//! # Fractional Geometry
//!
//! Template positions are written as fractions of the canvas size so one
//! template renders at every allowed width. These types resolve them to
//! absolute pixels once the canvas exists.
//!
//! ```text
//! (0,0) ───────────── (1,0)
//!   │   FRect{0.1, 0.2,   │
//!   │         0.9, 0.8}   │      × (width, height)  →  PixelRect
//! (0,1) ───────────── (1,1)
//! ```
//!
//! No clamping is performed: out-of-canvas or inverted values pass through
//! and are rejected (if at all) by the plugin that draws with them.

use serde::{Deserialize, Serialize};

/// A point in fractional canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FPoint {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl FPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Resolve to absolute pixel coordinates on a `w × h` canvas.
    pub fn transform(&self, w: u32, h: u32) -> (i64, i64) {
        (scale(self.x, w), scale(self.y, h))
    }
}

/// A rectangle in fractional canvas coordinates.
///
/// `right`/`bottom` of zero mean "full extent"; [`FRect::normalized`] applies
/// that rule and must run at load time, before any transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FRect {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
}

impl FRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Replace unset (zero) right/bottom edges with the full extent.
    pub fn normalized(mut self) -> Self {
        if self.right == 0.0 {
            self.right = 1.0;
        }
        if self.bottom == 0.0 {
            self.bottom = 1.0;
        }
        self
    }

    /// Resolve each edge independently to pixels on a `w × h` canvas.
    pub fn transform(&self, w: u32, h: u32) -> PixelRect {
        PixelRect {
            left: scale(self.left, w),
            top: scale(self.top, h),
            right: scale(self.right, w),
            bottom: scale(self.bottom, h),
        }
    }
}

/// An absolute rectangle in canvas pixels; `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelRect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i64,
            bottom: height as i64,
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// True when the rectangle covers no pixels (empty or inverted).
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn center(&self) -> (i64, i64) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Overlap of two rectangles (possibly degenerate).
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        PixelRect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

fn scale(fraction: f64, extent: u32) -> i64 {
    (fraction * extent as f64).round() as i64
}
