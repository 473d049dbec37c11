//! # Raster Layer
//!
//! Pixel-level building blocks shared by every plugin:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`color`] | hex color parsing |
//! | [`decode`] / [`encode`] | bytes ↔ pixels |
//! | [`resize`] | clip / crop / stretch strategies |
//! | [`cache`] | concurrent memo of resized rasters |
//! | [`font`] | bitmap and outline font faces |
//!
//! [`Canvas`] is the mutable RGBA surface a render composes onto. All drawing
//! is source-over alpha compositing; coordinates are signed so geometry may
//! place things partly (or fully) off-canvas.

pub mod cache;
pub mod color;
pub mod decode;
pub mod encode;
pub mod font;
pub mod resize;

use image::{Rgba, RgbaImage};

use crate::geometry::PixelRect;

/// The raster being composed. Origin top-left.
#[derive(Debug, Clone)]
pub struct Canvas {
    img: RgbaImage,
}

impl Canvas {
    /// A transparent canvas, filled with `background` when one is given.
    pub fn new(width: u32, height: u32, background: Option<Rgba<u8>>) -> Self {
        let img = match background {
            Some(bg) if bg[3] > 0 => RgbaImage::from_pixel(width, height, bg),
            _ => RgbaImage::new(width, height),
        };
        Self { img }
    }

    pub fn from_image(img: RgbaImage) -> Self {
        Self { img }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::from_size(self.width(), self.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.img
    }

    pub fn into_image(self) -> RgbaImage {
        self.img
    }

    /// Composite `color` at `(x, y)` with its alpha scaled by `coverage`.
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let alpha = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
        if alpha == 0 {
            return;
        }
        let dst = self.img.get_pixel_mut(x as u32, y as u32);
        *dst = source_over(*dst, color, alpha);
    }

    /// Fill a rectangle (clipped to the canvas).
    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba<u8>) {
        let r = rect.intersect(&self.bounds());
        for y in r.top..r.bottom {
            for x in r.left..r.right {
                self.blend_pixel(x, y, color, 1.0);
            }
        }
    }

    /// Horizontal rule from `x0` to `x1` centred on `y`, `thickness` px tall.
    pub fn hline(&mut self, x0: f64, x1: f64, y: f64, thickness: f64, color: Rgba<u8>) {
        let thickness = thickness.max(1.0);
        let top = (y - thickness / 2.0).round() as i64;
        let rect = PixelRect {
            left: x0.min(x1).round() as i64,
            top,
            right: x0.max(x1).round() as i64,
            bottom: top + thickness.round() as i64,
        };
        self.fill_rect(rect, color);
    }

    /// Composite `img` with its top-left corner at `(x, y)`, restricted to `clip`.
    pub fn draw_image(&mut self, img: &RgbaImage, x: i64, y: i64, clip: Option<PixelRect>) {
        let target = PixelRect {
            left: x,
            top: y,
            right: x + img.width() as i64,
            bottom: y + img.height() as i64,
        };
        let mut visible = target.intersect(&self.bounds());
        if let Some(clip) = clip {
            visible = visible.intersect(&clip);
        }
        if visible.is_degenerate() {
            return;
        }

        for py in visible.top..visible.bottom {
            for px in visible.left..visible.right {
                let src = *img.get_pixel((px - x) as u32, (py - y) as u32);
                if src[3] == 0 {
                    continue;
                }
                let dst = self.img.get_pixel_mut(px as u32, py as u32);
                *dst = source_over(*dst, src, src[3]);
            }
        }
    }

    /// Composite `img` so that the point `(ax·w, ay·h)` of the image lands on
    /// `(x, y)`. `(0.5, 0.5)` centres it, `(1, 1)` hangs it from its
    /// bottom-right corner.
    pub fn draw_image_anchored(
        &mut self,
        img: &RgbaImage,
        x: i64,
        y: i64,
        ax: f64,
        ay: f64,
        clip: Option<PixelRect>,
    ) {
        let left = x - (ax * img.width() as f64) as i64;
        let top = y - (ay * img.height() as f64) as i64;
        self.draw_image(img, left, top, clip);
    }
}

/// Straight-alpha "source over" of `src` (with alpha `alpha`) onto `dst`.
/// An opaque destination stays opaque.
fn source_over(dst: Rgba<u8>, src: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    if alpha == 255 {
        return Rgba([src[0], src[1], src[2], 255]);
    }
    let sa = alpha as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let c = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    let a = if dst[3] == 255 {
        255
    } else {
        (out_a * 255.0).round() as u8
    };
    Rgba([channel(0), channel(1), channel(2), a])
}
