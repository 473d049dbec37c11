//! Font faces for text and price overlays.
//!
//! Two kinds of face share one interface:
//!
//! - **Outline** fonts (TTF/OTF) loaded from any asset URI and rasterized
//!   with `ab_glyph`, anti-aliased.
//! - The **built-in** Spleen 12×24 bitmap face (`builtin:spleen`), scaled to
//!   the requested pixel size with nearest-neighbour sampling. It needs no
//!   font file and its metrics are exact (12 × 24 per glyph at size 24), which
//!   makes it the face of choice for bundled templates and tests.
//!
//! Text is positioned by baseline: `draw(canvas, text, x, baseline, color)`
//! puts the left edge of the first glyph at `x`.

use std::fmt;
use std::sync::{LazyLock, Mutex};

use ab_glyph::{Font, FontArc, ScaleFont, point};
use image::Rgba;
use spleen_font::{FONT_12X24, PSF2Font};

use super::Canvas;
use crate::assets::AssetSource;
use crate::error::ConfigError;

/// URI selecting the embedded bitmap face.
pub const BUILTIN_SPLEEN: &str = "builtin:spleen";

const SPLEEN_WIDTH: usize = 12;
const SPLEEN_HEIGHT: usize = 24;
/// Rows above the baseline in the 12×24 cell.
const SPLEEN_ASCENT: f64 = 19.0;

#[derive(Clone)]
enum Source {
    Bitmap,
    Outline(FontArc),
}

/// A font at a fixed pixel size.
#[derive(Clone)]
pub struct FontFace {
    source: Source,
    px: f32,
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Bitmap => "bitmap",
            Source::Outline(_) => "outline",
        };
        f.debug_struct("FontFace")
            .field("kind", &kind)
            .field("px", &self.px)
            .finish()
    }
}

impl FontFace {
    /// The embedded Spleen face at `px` pixels.
    pub fn builtin(px: f32) -> Self {
        Self {
            source: Source::Bitmap,
            px,
        }
    }

    /// Parse a TTF/OTF font.
    pub fn from_bytes(bytes: Vec<u8>, px: f32) -> Result<Self, ab_glyph::InvalidFont> {
        Ok(Self {
            source: Source::Outline(FontArc::try_from_vec(bytes)?),
            px,
        })
    }

    /// Resolve `uri` through the asset source (or the built-in name).
    pub async fn load(uri: &str, px: f32, assets: &AssetSource) -> Result<Self, ConfigError> {
        if px <= 0.0 || !px.is_finite() {
            return Err(ConfigError::Font {
                uri: uri.to_string(),
                reason: format!("invalid size {}", px),
            });
        }
        if uri == BUILTIN_SPLEEN {
            return Ok(Self::builtin(px));
        }

        let bytes = assets.get(uri).await.map_err(|source| ConfigError::Asset {
            uri: uri.to_string(),
            source,
        })?;
        Self::from_bytes(bytes, px).map_err(|e| ConfigError::Font {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
    }

    /// Same face at a different size. Outline data is shared, not copied.
    pub fn with_size(&self, px: f32) -> Self {
        Self {
            source: self.source.clone(),
            px,
        }
    }

    pub fn size(&self) -> f32 {
        self.px
    }

    fn bitmap_scale(&self) -> f64 {
        self.px as f64 / SPLEEN_HEIGHT as f64
    }

    /// Line height in pixels.
    pub fn line_height(&self) -> f64 {
        match &self.source {
            Source::Bitmap => SPLEEN_HEIGHT as f64 * self.bitmap_scale(),
            Source::Outline(font) => font.as_scaled(self.px).height() as f64,
        }
    }

    /// Distance from the top of a line to its baseline.
    pub fn ascent(&self) -> f64 {
        match &self.source {
            Source::Bitmap => SPLEEN_ASCENT * self.bitmap_scale(),
            Source::Outline(font) => font.as_scaled(self.px).ascent() as f64,
        }
    }

    /// `(advance width, line height)` of a single line of text.
    pub fn measure(&self, text: &str) -> (f64, f64) {
        let width = match &self.source {
            Source::Bitmap => {
                text.chars().count() as f64 * SPLEEN_WIDTH as f64 * self.bitmap_scale()
            }
            Source::Outline(font) => {
                let scaled = font.as_scaled(self.px);
                let mut caret = 0.0f32;
                let mut prev = None;
                for ch in text.chars() {
                    let id = font.glyph_id(ch);
                    if let Some(prev) = prev {
                        caret += scaled.kern(prev, id);
                    }
                    caret += scaled.h_advance(id);
                    prev = Some(id);
                }
                caret as f64
            }
        };
        (width, self.line_height())
    }

    /// Paint one line of text with its baseline at `baseline`.
    pub fn draw(&self, canvas: &mut Canvas, text: &str, x: f64, baseline: f64, color: Rgba<u8>) {
        match &self.source {
            Source::Bitmap => self.draw_bitmap(canvas, text, x, baseline, color),
            Source::Outline(font) => draw_outline(font, self.px, canvas, text, x, baseline, color),
        }
    }

    fn draw_bitmap(&self, canvas: &mut Canvas, text: &str, x: f64, baseline: f64, color: Rgba<u8>) {
        let scale = self.bitmap_scale();
        let cell_w = (SPLEEN_WIDTH as f64 * scale).ceil() as i64;
        let cell_h = (SPLEEN_HEIGHT as f64 * scale).ceil() as i64;
        let top = (baseline - SPLEEN_ASCENT * scale).round() as i64;

        for (i, ch) in text.chars().enumerate() {
            let bits = glyph_bits(ch);
            let left = (x + i as f64 * SPLEEN_WIDTH as f64 * scale).round() as i64;

            for dy in 0..cell_h {
                let sy = ((dy as f64 / scale) as usize).min(SPLEEN_HEIGHT - 1);
                for dx in 0..cell_w {
                    let sx = ((dx as f64 / scale) as usize).min(SPLEEN_WIDTH - 1);
                    if bits[sy * SPLEEN_WIDTH + sx] {
                        canvas.blend_pixel(left + dx, top + dy, color, 1.0);
                    }
                }
            }
        }
    }

    /// Greedy word wrap: break before any word that would push the line past
    /// `width`. Explicit newlines always break. A single word wider than
    /// `width` gets a line of its own.
    pub fn wrap(&self, text: &str, width: f64) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut line = String::new();
            for word in paragraph.split_whitespace() {
                if line.is_empty() {
                    line.push_str(word);
                    continue;
                }
                let candidate = format!("{} {}", line, word);
                if self.measure(&candidate).0 > width {
                    lines.push(std::mem::replace(&mut line, word.to_string()));
                } else {
                    line = candidate;
                }
            }
            lines.push(line);
        }
        lines
    }
}

/// The embedded face, parsed once. Glyph lookup mutates its index cache.
static SPLEEN: LazyLock<Mutex<PSF2Font<'static>>> =
    LazyLock::new(|| Mutex::new(PSF2Font::new(FONT_12X24).expect("embedded Spleen 12x24 font")));

fn glyph_bits(ch: char) -> Vec<bool> {
    let mut spleen = SPLEEN.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut bits = vec![false; SPLEEN_WIDTH * SPLEEN_HEIGHT];
    let utf8 = ch.to_string();

    if let Some(glyph) = spleen.glyph_for_utf8(utf8.as_bytes()) {
        for (row_y, row) in glyph.enumerate() {
            for (col_x, on) in row.enumerate() {
                if row_y < SPLEEN_HEIGHT && col_x < SPLEEN_WIDTH {
                    bits[row_y * SPLEEN_WIDTH + col_x] = on;
                }
            }
        }
    } else if !ch.is_whitespace() {
        // Missing glyph: hollow box inside the cell.
        for y in 4..SPLEEN_ASCENT as usize {
            for x in 1..SPLEEN_WIDTH - 1 {
                let edge = y == 4 || y == SPLEEN_ASCENT as usize - 1 || x == 1 || x == SPLEEN_WIDTH - 2;
                bits[y * SPLEEN_WIDTH + x] = edge;
            }
        }
    }

    bits
}

fn draw_outline(
    font: &FontArc,
    px: f32,
    canvas: &mut Canvas,
    text: &str,
    x: f64,
    baseline: f64,
    color: Rgba<u8>,
) {
    let scaled = font.as_scaled(px);
    let mut caret = x as f32;
    let mut prev = None;

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = prev {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(px, point(caret, baseline as f32));
        caret += scaled.h_advance(id);
        prev = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let cx = gx as i64 + bounds.min.x as i64;
                let cy = gy as i64 + bounds.min.y as i64;
                canvas.blend_pixel(cx, cy, color, coverage);
            });
        }
    }
}

/// Truncate to `max_chars` characters and append `...`; zero means unlimited.
pub fn ellipsis(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::color::{BLACK, WHITE};

    #[test]
    fn test_builtin_metrics_scale_with_size() {
        let face = FontFace::builtin(24.0);
        assert_eq!(face.measure("12345"), (60.0, 24.0));

        let face = face.with_size(48.0);
        assert_eq!(face.measure("12345"), (120.0, 48.0));
        assert_eq!(face.ascent(), 38.0);
    }

    #[test]
    fn test_builtin_draws_ink() {
        let face = FontFace::builtin(24.0);
        let mut canvas = Canvas::new(80, 40, Some(WHITE));
        face.draw(&mut canvas, "88", 2.0, 30.0, BLACK);

        let ink: Vec<(u32, u32)> = canvas
            .image()
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == BLACK)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!ink.is_empty());
        // All ink sits inside the two glyph cells.
        assert!(ink.iter().all(|&(x, y)| (2..26).contains(&x) && (11..35).contains(&y)));
    }

    #[test]
    fn test_glyphs_from_many_threads() {
        let reference = glyph_bits('8');
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..50).map(|_| glyph_bits('8')).last().unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), reference);
        }
        assert!(reference.iter().any(|&on| on));
        assert_ne!(glyph_bits('1'), reference);
    }

    #[test]
    fn test_missing_glyph_still_advances() {
        let face = FontFace::builtin(24.0);
        assert_eq!(face.measure("\u{4e2d}a").0, 24.0);
    }

    #[test]
    fn test_wrap_greedy() {
        let face = FontFace::builtin(24.0);
        // 12px per char: "aaa bbb" = 84px
        assert_eq!(face.wrap("aaa bbb ccc", 84.0), vec!["aaa bbb", "ccc"]);
        assert_eq!(face.wrap("aaa bbb ccc", 40.0), vec!["aaa", "bbb", "ccc"]);
        assert_eq!(face.wrap("a\nb", 1000.0), vec!["a", "b"]);
        assert_eq!(face.wrap("enormousword", 10.0), vec!["enormousword"]);
    }

    #[test]
    fn test_ellipsis() {
        assert_eq!(ellipsis("hello world", 5), "hello...");
        assert_eq!(ellipsis("hello", 5), "hello");
        assert_eq!(ellipsis("hello", 0), "hello");
        assert_eq!(ellipsis("Việt Nam", 4), "Việt...");
    }

    #[test]
    fn test_invalid_font_bytes() {
        assert!(FontFace::from_bytes(b"not a font".to_vec(), 12.0).is_err());
    }
}
