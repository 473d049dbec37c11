//! `image` plugin: fits a raster into a fractional rectangle.
//!
//! ```yaml
//! - type: image
//!   image: frames/sale.png        # any asset URI; may be bound instead
//!   rect: {left: 0, top: 0.8}     # right/bottom default to 1
//!   mode: clip                    # clip | crop | stretch
//!   halign: center                # left | left_margin | center | right | right_margin
//!   valign: middle                # top | middle | bottom
//!   x: 12                         # margin (px) for the *_margin alignments
//!   y: 0                          # extra offset (px) for valign: middle
//!   imgType: product              # resize to width × height instead of the rect
//!   width: 400
//!   height: 400
//!   binding: {image: source}
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use serde::Deserialize;

use super::{BindField, BindValues, Binding, Capability, PluginKind};
use crate::assets::AssetSource;
use crate::error::{BindError, ConfigError, DrawError};
use crate::geometry::{FRect, PixelRect};
use crate::raster::Canvas;
use crate::raster::cache::ResizeCache;
use crate::raster::resize::{ResizeMode, resize};

/// Image type that enables the explicit `width × height` override.
pub const PRODUCT_TYPE: &str = "product";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HAlign {
    Left,
    LeftMargin,
    #[default]
    Center,
    Right,
    RightMargin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField {
    Image,
}

impl BindField for ImageField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "image" => Some(ImageField::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImagePlugin {
    pub binding: BTreeMap<String, String>,
    pub image: String,
    #[serde(rename = "imgtype")]
    pub img_type: String,
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
    pub rect: FRect,
    pub mode: ResizeMode,
    pub halign: HAlign,
    pub valign: VAlign,

    #[serde(skip)]
    bindings: Binding<ImageField>,
    #[serde(skip)]
    raster: Option<Arc<RgbaImage>>,
    #[serde(skip)]
    cache: Arc<ResizeCache>,
}

impl ImagePlugin {
    pub fn is_product(&self) -> bool {
        self.img_type.eq_ignore_ascii_case(PRODUCT_TYPE)
    }

    /// Decoded source raster, once configured or bound.
    pub fn raster(&self) -> Option<&Arc<RgbaImage>> {
        self.raster.as_ref()
    }

    async fn load(&mut self, assets: &AssetSource) -> Result<(), ConfigError> {
        if self.image.is_empty() {
            return Err(ConfigError::MissingField("image"));
        }
        let decoded = assets
            .image(&self.image)
            .await
            .map_err(|source| ConfigError::Asset {
                uri: self.image.clone(),
                source,
            })?;
        self.raster = Some(Arc::new(decoded.to_rgba8()));
        self.cache = Arc::new(ResizeCache::new(self.mode));
        Ok(())
    }

    /// Box the raster is resized into: the explicit override for product
    /// images whose size differs from the rect, otherwise the rect itself.
    pub fn target_size(&self, raster: &RgbaImage, rect: &PixelRect) -> (u32, u32) {
        let rect_size = (rect.width() as u32, rect.height() as u32);
        let fits_rect = raster.dimensions() == rect_size;
        if !fits_rect && self.is_product() {
            (self.width, self.height)
        } else {
            rect_size
        }
    }

    fn horizontal_anchor(&self, r: &PixelRect) -> (i64, f64) {
        let margin = self.x;
        match self.halign {
            HAlign::Left => (r.left, 0.0),
            HAlign::Center => ((r.left + r.right) / 2, 0.5),
            HAlign::Right => (r.right, 1.0),
            HAlign::LeftMargin => (r.left + margin, margin as f64 / r.width() as f64),
            HAlign::RightMargin => (r.right - margin, 1.0 - margin as f64 / r.width() as f64),
        }
    }

    fn vertical_anchor(&self, r: &PixelRect) -> (i64, f64) {
        match self.valign {
            VAlign::Top => (r.top, 0.0),
            VAlign::Middle => ((r.top + r.bottom) / 2 + self.y, 0.5),
            VAlign::Bottom => (r.bottom, 1.0),
        }
    }
}

#[async_trait]
impl Capability for ImagePlugin {
    const KIND: PluginKind = PluginKind::Image;

    async fn configure(&mut self, assets: &AssetSource) -> Result<(), ConfigError> {
        self.bindings = Binding::parse(&self.binding, Self::KIND)?;
        self.rect = self.rect.normalized();
        if self.is_product() && (self.width == 0 || self.height == 0) {
            return Err(ConfigError::InvalidField {
                field: "width/height",
                reason: "product images need both".to_string(),
            });
        }

        // A bound image is fetched per request instead.
        if !self.bindings.is_empty() {
            return Ok(());
        }
        self.load(assets).await
    }

    async fn bind(
        &self,
        values: &BindValues,
        assets: &AssetSource,
    ) -> Result<Option<Self>, BindError> {
        if self.bindings.is_empty() {
            return Ok(None);
        }

        let mut copy = self.clone();
        let mut changed = false;
        for (field, key) in self.bindings.iter() {
            match field {
                ImageField::Image => {
                    let uri = values.get_string(key);
                    if uri != copy.image || copy.raster.is_none() {
                        copy.image = uri;
                        changed = true;
                    }
                }
            }
        }

        if !changed {
            return Ok(None);
        }
        copy.load(assets).await?;
        Ok(Some(copy))
    }

    fn apply(&self, canvas: &mut Canvas) -> Result<(), DrawError> {
        let rect = self.rect.transform(canvas.width(), canvas.height());
        if rect.is_degenerate() {
            return Err(DrawError::DegenerateRect {
                width: rect.width(),
                height: rect.height(),
            });
        }
        let raster = self.raster.as_ref().ok_or(DrawError::NotConfigured)?;

        let (w, h) = self.target_size(raster, &rect);
        let fitted = if self.bindings.is_empty() {
            self.cache.get_resized(raster, w, h, false)
        } else {
            Arc::new(resize(raster, w, h, self.mode))
        };

        let (x, ax) = self.horizontal_anchor(&rect);
        let (y, ay) = self.vertical_anchor(&rect);
        canvas.draw_image_anchored(&fitted, x, y, ax, ay, Some(rect));
        Ok(())
    }

    fn is_bound(&self) -> bool {
        !self.binding.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::tests::test_assets;
    use crate::plugin::{Plugin, parse_plugin_config};
    use crate::raster::color::{BLACK, TRANSPARENT, WHITE};
    use crate::raster::encode::{OutputFormat, encode};
    use image::Rgba;
    use std::path::Path;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn close(px: &Rgba<u8>, expected: Rgba<u8>) -> bool {
        px.0.iter()
            .zip(expected.0.iter())
            .all(|(a, b)| (*a as i16 - *b as i16).abs() <= 2)
    }

    fn write_png(dir: &Path, name: &str, img: &RgbaImage) {
        std::fs::write(dir.join(name), encode(img, OutputFormat::Png).unwrap()).unwrap();
    }

    fn plugin(yaml: &str) -> ImagePlugin {
        match parse_plugin_config("image", serde_yaml::from_str(yaml).unwrap()).unwrap() {
            Plugin::Image(p) => p,
            other => panic!("unexpected plugin {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_requires_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = plugin("mode: clip");
        let err = p.configure(&test_assets(dir.path())).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("image")));
    }

    #[test]
    fn test_invalid_alignment_is_rejected() {
        let err = parse_plugin_config(
            "image",
            serde_yaml::from_str("image: a.png\nhalign: sideways").unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_default_rect_stretch_fills_canvas() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "src.png", &RgbaImage::from_pixel(30, 10, RED));

        let mut p = plugin("image: local:/src.png\nmode: stretch\nrect: {left: 0, top: 0, right: 0, bottom: 0}");
        p.configure(&test_assets(dir.path())).await.unwrap();

        let mut canvas = Canvas::new(64, 48, None);
        p.apply(&mut canvas).unwrap();
        assert_eq!(canvas.image().dimensions(), (64, 48));
        assert!(canvas.image().pixels().all(|px| close(px, RED)));
    }

    #[tokio::test]
    async fn test_clip_letterboxes_inside_rect() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "wide.png", &RgbaImage::from_pixel(40, 20, BLACK));

        let mut p = plugin("image: local:/wide.png\nmode: clip");
        p.configure(&test_assets(dir.path())).await.unwrap();

        let mut canvas = Canvas::new(20, 20, Some(WHITE));
        p.apply(&mut canvas).unwrap();
        // 20×10 centred vertically: rows 5..15 black.
        assert_eq!(*canvas.image().get_pixel(10, 4), WHITE);
        assert!(close(canvas.image().get_pixel(10, 5), BLACK));
        assert!(close(canvas.image().get_pixel(10, 14), BLACK));
        assert_eq!(*canvas.image().get_pixel(10, 15), WHITE);
    }

    #[tokio::test]
    async fn test_crop_is_clipped_to_rect() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "wide.png", &RgbaImage::from_pixel(40, 20, BLACK));

        let mut p = plugin("image: local:/wide.png\nmode: crop\nrect: {left: 0.25, top: 0.25, right: 0.75, bottom: 0.75}");
        p.configure(&test_assets(dir.path())).await.unwrap();

        let mut canvas = Canvas::new(40, 40, None);
        p.apply(&mut canvas).unwrap();
        let inked = canvas.image().pixels().filter(|px| **px != TRANSPARENT).count();
        assert_eq!(inked, 20 * 20);
        assert_eq!(*canvas.image().get_pixel(9, 20), TRANSPARENT);
        assert_eq!(*canvas.image().get_pixel(10, 20), BLACK);
    }

    #[tokio::test]
    async fn test_inverted_rect_is_draw_error() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "src.png", &RgbaImage::from_pixel(4, 4, RED));

        let mut p = plugin("image: local:/src.png\nrect: {left: 0.8, right: 0.2}");
        p.configure(&test_assets(dir.path())).await.unwrap();

        let mut canvas = Canvas::new(10, 10, None);
        let err = p.apply(&mut canvas).unwrap_err();
        assert!(matches!(err, DrawError::DegenerateRect { width: -6, .. }));
    }

    #[test]
    fn test_product_override_only_when_size_differs() {
        let p = plugin("image: x.png\nimgType: product\nwidth: 30\nheight: 20");
        let rect = PixelRect::from_size(100, 50);

        // Wrong size + product → the explicit override.
        let raster = RgbaImage::new(10, 10);
        assert_eq!(p.target_size(&raster, &rect), (30, 20));

        // Already rect-sized → the rect wins even for products.
        let raster = RgbaImage::new(100, 50);
        assert_eq!(p.target_size(&raster, &rect), (100, 50));

        // Not a product → always the rect.
        let p = plugin("image: x.png\nwidth: 30\nheight: 20");
        let raster = RgbaImage::new(10, 10);
        assert_eq!(p.target_size(&raster, &rect), (100, 50));
    }

    #[test]
    fn test_margin_anchors() {
        let rect = PixelRect::from_size(200, 100);

        let p = plugin("image: x.png\nhalign: left_margin\nx: 10");
        let (x, ax) = p.horizontal_anchor(&rect);
        assert_eq!(x, 10);
        assert!((ax - 0.05).abs() < 1e-9);

        let p = plugin("image: x.png\nhalign: right_margin\nx: 10");
        let (x, ax) = p.horizontal_anchor(&rect);
        assert_eq!(x, 190);
        assert!((ax - 0.95).abs() < 1e-9);

        let p = plugin("image: x.png\nvalign: middle\ny: 7");
        assert_eq!(p.vertical_anchor(&rect), (57, 0.5));
    }

    #[tokio::test]
    async fn test_unbound_bind_reuses_instance() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "src.png", &RgbaImage::from_pixel(4, 4, RED));
        let assets = test_assets(dir.path());

        let mut p = Plugin::Image(plugin("image: local:/src.png"));
        p.configure(&assets).await.unwrap();
        let shared = Arc::new(p);

        let values = BindValues::new().with("source", "local:/other.png");
        let bound = Plugin::bind(&shared, &values, &assets).await.unwrap();
        assert!(Arc::ptr_eq(&shared, &bound));
    }

    #[tokio::test]
    async fn test_bound_image_loads_per_request() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", &RgbaImage::from_pixel(4, 4, RED));
        write_png(dir.path(), "b.png", &RgbaImage::from_pixel(4, 4, BLACK));
        let assets = test_assets(dir.path());

        let mut p = plugin("mode: stretch\nbinding: {Image: Source}");
        p.configure(&assets).await.unwrap();
        assert!(p.raster().is_none());

        let values = BindValues::new().with("source", "local:/a.png");
        let a = p.bind(&values, &assets).await.unwrap().unwrap();
        assert_eq!(*a.raster().unwrap().get_pixel(0, 0), RED);

        let values = BindValues::new().with("source", "local:/b.png");
        let b = p.bind(&values, &assets).await.unwrap().unwrap();
        assert_eq!(*b.raster().unwrap().get_pixel(0, 0), BLACK);

        // The shared original is untouched.
        assert!(p.raster().is_none());
    }

    #[tokio::test]
    async fn test_bound_missing_source_is_reconfigure_error() {
        let dir = tempfile::tempdir().unwrap();
        let assets = test_assets(dir.path());

        let mut p = plugin("binding: {image: source}");
        p.configure(&assets).await.unwrap();

        let values = BindValues::new().with("source", "local:/gone.png");
        let err = p.bind(&values, &assets).await.unwrap_err();
        match err {
            BindError::Reconfigure(ConfigError::Asset { source, .. }) => {
                assert!(source.is_not_found())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
