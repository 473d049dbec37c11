//! # Frame Templates
//!
//! The second template family: instead of composing a canvas from plugins,
//! a frame template decorates the source photograph itself. The output
//! always has the photo's own size.
//!
//! ```text
//!   photo ──copy──► canvas ──overlay frame (resized to photo)──► draw price block(s)
//! ```
//!
//! The frame image is resized once per distinct photo size and memoized in a
//! [`ResizeCache`]; a separate promo frame, when configured, is used whenever
//! the photo carries a real promotion.
//!
//! ## Price blocks
//!
//! | Block | Drawn when |
//! |-------|------------|
//! | `priceOnly` | no promotion |
//! | `priceOrig` | promotion: the original price, usually struck through |
//! | `pricePromo` | promotion: the discounted price |
//!
//! Each block is positioned in fractions of the photo: its text hangs from
//! `top · H` and ends at `W − right · W` (or is centred on that x with
//! `verticalCenter`). Font size is `height · H` pixels.

use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::assets::AssetSource;
use crate::error::{ConfigError, RenderError};
use crate::geometry::PixelRect;
use crate::plugin::normalize_keys;
use crate::plugin::text::{Locale, group_thousands};
use crate::raster::Canvas;
use crate::raster::cache::ResizeCache;
use crate::raster::color::{self, WHITE};
use crate::raster::decode::decode_image;
use crate::raster::encode::{self, OutputFormat};
use crate::raster::font::FontFace;
use crate::raster::resize::ResizeMode;
use crate::registry::{Loadable, Registry};

/// Appended to every frame price; a non-full strike stops before it.
const CURRENCY_SUFFIX: &str = " đ";

/// One price label.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PriceBlock {
    pub top: f64,
    pub right: f64,
    #[serde(rename = "verticalcenter")]
    pub vertical_center: bool,
    /// Font size as a fraction of the photo height.
    pub height: f64,
    #[serde(rename = "fonturi")]
    pub font_uri: String,
    pub color: String,
    /// Rule thickness as a fraction of the text height, clamped to [0, 1].
    #[serde(rename = "strikethrough")]
    pub strike_through: f64,
    #[serde(rename = "strikefull")]
    pub strike_full: bool,
    /// Rule centre as a fraction of the text height below its top.
    #[serde(rename = "strikepos")]
    pub strike_pos: f64,

    #[serde(skip)]
    face: Option<FontFace>,
    #[serde(skip)]
    rgba: Option<Rgba<u8>>,
}

/// Where a price block lands on a given photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLayout {
    pub text: String,
    pub left: f64,
    pub baseline: f64,
    pub px: f32,
    pub strike: Option<PixelRect>,
}

impl PriceBlock {
    /// Load the font (or inherit `fallback`'s) and resolve the color.
    async fn configure(
        &mut self,
        field: &'static str,
        fallback: Option<&PriceBlock>,
        assets: &AssetSource,
    ) -> Result<(), ConfigError> {
        self.rgba = Some(color::parse_or(&self.color, WHITE)?);
        self.strike_through = self.strike_through.clamp(0.0, 1.0);

        if self.height <= 0.0 {
            self.height = match fallback {
                Some(reference) => reference.height,
                None => {
                    return Err(ConfigError::InvalidField {
                        field,
                        reason: "height must be positive".to_string(),
                    });
                }
            };
        }

        self.face = match (self.font_uri.is_empty(), fallback) {
            (false, _) => Some(FontFace::load(&self.font_uri, 1.0, assets).await?),
            (true, Some(reference)) => reference.face.clone(),
            (true, None) => return Err(ConfigError::MissingField("priceOnly.fontUri")),
        };
        Ok(())
    }

    /// Resolve text position and strike rule for `amount` on a
    /// `width × height` photo.
    pub fn layout(&self, amount: i64, width: u32, height: u32) -> Option<PriceLayout> {
        let face = self.face.as_ref()?;
        let (w, h) = (width as f64, height as f64);
        let px = (self.height * h) as f32;
        if px <= 0.0 {
            return None;
        }
        let face = face.with_size(px);

        let text = price_label(amount);
        let (text_w, _) = face.measure(&text);
        let text_h = face.ascent();

        let anchor_x = w - (self.right * w).trunc();
        let top = (self.top * h).trunc();
        let left = if self.vertical_center {
            anchor_x - text_w / 2.0
        } else {
            anchor_x - text_w
        };

        let strike = (self.strike_through > 0.0).then(|| {
            let thickness = (self.strike_through * text_h).ceil().max(1.0) as i64;
            let centre = (top + text_h * self.strike_pos) as i64;
            let trim = if self.strike_full {
                0.0
            } else {
                face.measure(CURRENCY_SUFFIX).0
            };
            let y0 = centre - thickness / 2;
            PixelRect {
                left: left.floor() as i64,
                top: y0,
                right: (left + text_w - trim).ceil() as i64,
                bottom: y0 + thickness,
            }
        });

        Some(PriceLayout {
            text,
            left,
            baseline: top + text_h,
            px,
            strike,
        })
    }

    fn draw(&self, canvas: &mut Canvas, amount: i64) {
        let (Some(face), Some(rgba)) = (self.face.as_ref(), self.rgba) else {
            return;
        };
        let Some(layout) = self.layout(amount, canvas.width(), canvas.height()) else {
            return;
        };

        face.with_size(layout.px)
            .draw(canvas, &layout.text, layout.left, layout.baseline, rgba);
        if let Some(rule) = layout.strike {
            canvas.fill_rect(rule, rgba);
        }
    }
}

/// `123456` → `123.456 đ`
pub fn price_label(amount: i64) -> String {
    format!("{}{}", group_thousands(amount, Locale::Vi), CURRENCY_SUFFIX)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrameConfig {
    frameuri: String,
    promoframeuri: String,
    priceonly: PriceBlock,
    priceorig: PriceBlock,
    pricepromo: PriceBlock,
}

/// Which price blocks a photo gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    /// No usable price: frame only.
    FrameOnly,
    Single(i64),
    Promotion { original: i64, promo: i64 },
}

impl Pricing {
    /// A promotion needs `0 < promo < price`; anything else shows `price`
    /// alone.
    pub fn from_prices(price: i64, promotion_price: i64) -> Self {
        if price <= 0 {
            Pricing::FrameOnly
        } else if promotion_price > 0 && promotion_price < price {
            Pricing::Promotion {
                original: price,
                promo: promotion_price,
            }
        } else {
            Pricing::Single(price)
        }
    }
}

#[derive(Debug)]
pub struct FrameTemplate {
    pub name: String,
    frame: Arc<RgbaImage>,
    promo_frame: Option<Arc<RgbaImage>>,
    price_only: PriceBlock,
    price_orig: PriceBlock,
    price_promo: PriceBlock,
    cache: ResizeCache,
}

impl FrameTemplate {
    pub async fn parse(name: &str, bytes: &[u8], assets: &AssetSource) -> Result<Self, ConfigError> {
        let raw: Mapping = serde_yaml::from_slice(bytes)?;
        let mut config: FrameConfig = serde_yaml::from_value(normalize_nested(raw))?;

        if config.frameuri.is_empty() {
            return Err(ConfigError::MissingField("frameURI"));
        }
        let frame = load_frame(&config.frameuri, assets).await?;
        let promo_frame = match config.promoframeuri.as_str() {
            "" => None,
            uri => Some(load_frame(uri, assets).await?),
        };

        config.priceonly.configure("priceOnly", None, assets).await?;
        config
            .priceorig
            .configure("priceOrig", Some(&config.priceonly), assets)
            .await?;
        config
            .pricepromo
            .configure("pricePromo", Some(&config.priceonly), assets)
            .await?;

        info!(
            frame = name,
            uri = %config.frameuri,
            promo = promo_frame.is_some(),
            "load frame template"
        );

        Ok(Self {
            name: name.to_string(),
            frame,
            promo_frame,
            price_only: config.priceonly,
            price_orig: config.priceorig,
            price_promo: config.pricepromo,
            cache: ResizeCache::new(ResizeMode::Stretch),
        })
    }

    /// Number of memoized frame sizes.
    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }

    /// The frame resized to `width × height`, promo variant if asked for and
    /// configured.
    pub fn frame_for(&self, width: u32, height: u32, promo: bool) -> Arc<RgbaImage> {
        match (&self.promo_frame, promo) {
            (Some(promo_frame), true) => self.cache.get_resized(promo_frame, width, height, true),
            _ => self.cache.get_resized(&self.frame, width, height, false),
        }
    }

    /// Decorate `src` with the frame and its price block(s).
    pub fn generate(&self, src: &RgbaImage, price: i64, promotion_price: i64) -> RgbaImage {
        let pricing = Pricing::from_prices(price, promotion_price);
        let mut canvas = Canvas::from_image(src.clone());

        let frame = self.frame_for(
            src.width(),
            src.height(),
            matches!(pricing, Pricing::Promotion { .. }),
        );
        canvas.draw_image(&frame, 0, 0, None);

        match pricing {
            Pricing::FrameOnly => {}
            Pricing::Single(amount) => self.price_only.draw(&mut canvas, amount),
            Pricing::Promotion { original, promo } => {
                self.price_orig.draw(&mut canvas, original);
                self.price_promo.draw(&mut canvas, promo);
            }
        }
        canvas.into_image()
    }

    /// Decode photo bytes, decorate, encode as JPEG.
    pub fn render_bytes(
        &self,
        bytes: &[u8],
        price: i64,
        promotion_price: i64,
    ) -> Result<Vec<u8>, RenderError> {
        let src = decode_image(bytes)?.to_rgba8();
        let out = self.generate(&src, price, promotion_price);
        Ok(encode::encode(&out, OutputFormat::Jpeg)?)
    }
}

async fn load_frame(uri: &str, assets: &AssetSource) -> Result<Arc<RgbaImage>, ConfigError> {
    let img = assets.image(uri).await.map_err(|source| ConfigError::Asset {
        uri: uri.to_string(),
        source,
    })?;
    Ok(Arc::new(img.to_rgba8()))
}

/// Normalise top-level keys and the keys of nested mappings (price blocks).
fn normalize_nested(raw: Mapping) -> Value {
    let top = normalize_keys(raw)
        .into_iter()
        .map(|(k, v)| match v {
            Value::Mapping(inner) => (k, Value::Mapping(normalize_keys(inner))),
            other => (k, other),
        })
        .collect();
    Value::Mapping(top)
}

/// Frame templates by name.
pub type FrameRegistry = Registry<FrameTemplate>;

#[async_trait]
impl Loadable for FrameTemplate {
    const FAMILY: &'static str = "frame";

    fn name(&self) -> &str {
        &self.name
    }

    async fn load(name: &str, bytes: &[u8], assets: &AssetSource) -> Result<Self, ConfigError> {
        FrameTemplate::parse(name, bytes, assets).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::tests::test_assets;
    use crate::raster::color::{BLACK, TRANSPARENT};
    use std::path::Path;

    const GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    /// 30×30 frame: a 6px opaque border around a transparent window.
    fn border_frame(color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_fn(30, 30, |x, y| {
            if x < 6 || y < 6 || x >= 24 || y >= 24 {
                color
            } else {
                TRANSPARENT
            }
        })
    }

    fn close(px: &Rgba<u8>, expected: Rgba<u8>) -> bool {
        px.0.iter()
            .zip(expected.0.iter())
            .all(|(a, b)| (*a as i16 - *b as i16).abs() <= 2)
    }

    fn write_png(dir: &Path, name: &str, img: &RgbaImage) {
        std::fs::write(dir.join(name), encode::encode(img, OutputFormat::Png).unwrap()).unwrap();
    }

    const FRAME_YAML: &str = "
frameURI: local:/frame.png
promoFrameURI: local:/promo.png
priceOnly:
  top: 0.8
  right: 0.05
  height: 0.1
  fontUri: builtin:spleen
  color: '#000'
priceOrig:
  top: 0.7
  right: 0.05
  strikeThrough: 0.1
  strikePos: 0.5
pricePromo:
  top: 0.85
  right: 0.05
  height: 0.12
";

    async fn frame_template(dir: &Path) -> FrameTemplate {
        write_png(dir, "frame.png", &border_frame(RED));
        write_png(dir, "promo.png", &border_frame(BLUE));
        let assets = test_assets(dir);
        FrameTemplate::parse("sale", FRAME_YAML.as_bytes(), &assets)
            .await
            .unwrap()
    }

    #[test]
    fn test_pricing_rules() {
        assert_eq!(Pricing::from_prices(0, 0), Pricing::FrameOnly);
        assert_eq!(Pricing::from_prices(-5, 100), Pricing::FrameOnly);
        assert_eq!(Pricing::from_prices(1000, 1000), Pricing::Single(1000));
        assert_eq!(Pricing::from_prices(1000, 0), Pricing::Single(1000));
        assert_eq!(Pricing::from_prices(1000, 1500), Pricing::Single(1000));
        assert_eq!(
            Pricing::from_prices(1000, 800),
            Pricing::Promotion {
                original: 1000,
                promo: 800
            }
        );
        assert_eq!(price_label(123456), "123.456 đ");
    }

    #[tokio::test]
    async fn test_price_only_font_is_required() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "frame.png", &border_frame(RED));
        let assets = test_assets(dir.path());

        let yaml = "frameURI: local:/frame.png\npriceOnly: {height: 0.1}";
        let err = FrameTemplate::parse("f", yaml.as_bytes(), &assets).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("priceOnly.fontUri")));

        let err = FrameTemplate::parse("f", b"priceOnly: {height: 0.1}", &assets)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("frameURI")));
    }

    #[tokio::test]
    async fn test_blocks_inherit_price_only() {
        let dir = tempfile::tempdir().unwrap();
        let t = frame_template(dir.path()).await;

        assert!(t.price_orig.face.is_some());
        assert_eq!(t.price_orig.height, 0.1);
        assert_eq!(t.price_promo.height, 0.12);
        // Colors are not inherited: unset means white.
        assert_eq!(t.price_orig.rgba, Some(WHITE));
        assert_eq!(t.price_only.rgba, Some(BLACK));
    }

    #[tokio::test]
    async fn test_strike_through_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "frame.png", &border_frame(RED));
        let assets = test_assets(dir.path());

        let yaml = "
frameURI: local:/frame.png
priceOnly: {height: 0.1, fontUri: builtin:spleen, strikeThrough: 3}
priceOrig: {strikeThrough: -1}
";
        let t = FrameTemplate::parse("f", yaml.as_bytes(), &assets).await.unwrap();
        assert_eq!(t.price_only.strike_through, 1.0);
        assert_eq!(t.price_orig.strike_through, 0.0);
    }

    #[tokio::test]
    async fn test_layout_right_anchor_and_strike() {
        let dir = tempfile::tempdir().unwrap();
        let t = frame_template(dir.path()).await;

        // 240px tall photo → 24px font: glyphs are exactly 12px wide.
        let layout = t.price_orig.layout(250000, 400, 240).unwrap();
        assert_eq!(layout.text, "250.000 đ");
        assert_eq!(layout.px, 24.0);
        let text_w = 9.0 * 12.0;
        assert_eq!(layout.left, 400.0 - 20.0 - text_w);
        assert_eq!(layout.baseline, 168.0 + 19.0);

        let rule = layout.strike.unwrap();
        // ceil(0.1 × 19) = 2px, centred 9.5px below the top.
        assert_eq!(rule.height(), 2);
        assert_eq!(rule.top, 177 - 1);
        assert_eq!(rule.left, 272);
        // Not full: stops before " đ" (24px).
        assert_eq!(rule.right, 380 - 24);
    }

    #[tokio::test]
    async fn test_vertical_center_centres_on_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = frame_template(dir.path()).await;
        t.price_only.vertical_center = true;
        t.price_only.right = 0.5;

        let layout = t.price_only.layout(1000, 480, 240).unwrap();
        let text_w = "1.000 đ".chars().count() as f64 * 12.0;
        assert_eq!(layout.left, 240.0 - text_w / 2.0);
        assert!(layout.strike.is_none());
    }

    #[tokio::test]
    async fn test_generate_picks_frame_variant() {
        let dir = tempfile::tempdir().unwrap();
        let t = frame_template(dir.path()).await;
        let photo = RgbaImage::from_pixel(100, 60, GREY);

        let plain = t.generate(&photo, 0, 0);
        assert_eq!(plain.dimensions(), (100, 60));
        assert!(close(plain.get_pixel(0, 0), RED));
        assert_eq!(*plain.get_pixel(50, 30), GREY);

        let promo = t.generate(&photo, 2000, 1500);
        assert!(close(promo.get_pixel(0, 0), BLUE));

        // Promo higher than price is no promotion.
        let not_promo = t.generate(&photo, 2000, 2500);
        assert!(close(not_promo.get_pixel(0, 0), RED));

        assert_eq!(t.cached_frames(), 2);
    }

    #[tokio::test]
    async fn test_frame_cache_is_per_size() {
        let dir = tempfile::tempdir().unwrap();
        let t = frame_template(dir.path()).await;

        let a = t.frame_for(100, 60, false);
        let b = t.frame_for(100, 60, false);
        let c = t.frame_for(50, 30, false);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.dimensions(), (100, 60));
        assert_eq!(c.dimensions(), (50, 30));
        assert_eq!(t.cached_frames(), 2);
    }

    #[tokio::test]
    async fn test_generate_draws_single_price() {
        let dir = tempfile::tempdir().unwrap();
        let t = frame_template(dir.path()).await;
        let photo = RgbaImage::from_pixel(400, 240, GREY);

        let out = t.generate(&photo, 99000, 99000);
        let layout = t.price_only.layout(99000, 400, 240).unwrap();
        let inked = (layout.left as u32..380)
            .flat_map(|x| (190..215).map(move |y| (x, y)))
            .any(|(x, y)| *out.get_pixel(x, y) == BLACK);
        assert!(inked);
    }

    #[tokio::test]
    async fn test_render_bytes_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let t = frame_template(dir.path()).await;
        let photo = RgbaImage::from_pixel(64, 48, GREY);
        let png = encode::encode(&photo, OutputFormat::Png).unwrap();

        let jpeg = t.render_bytes(&png, 5000, 4000).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));

        assert!(matches!(
            t.render_bytes(b"not an image", 1, 1),
            Err(RenderError::Source(_))
        ));
    }
}
