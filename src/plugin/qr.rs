//! `qr` plugin: a QR code centred on a fractional anchor.
//!
//! The code is rendered without a quiet zone, transparent background, at
//! `size × canvas_width` pixels square (never smaller than one pixel per
//! module). The module grid is centred inside that square when the size is
//! not an exact multiple of the module count.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Deserializer};

use super::{BindField, BindValues, Binding, Capability, PluginKind};
use crate::assets::AssetSource;
use crate::error::{BindError, ConfigError, DrawError};
use crate::geometry::FPoint;
use crate::raster::Canvas;
use crate::raster::color::{self, TRANSPARENT, WHITE};

/// Payload used when a template declares none (the bound value replaces it).
const PLACEHOLDER_TEXT: &str = "dummy";

/// Error-correction level. Accepts `low`/`medium`/`quartile`/`highest` or
/// the numeric levels 0-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recovery {
    Low,
    #[default]
    Medium,
    Quartile,
    Highest,
}

impl Recovery {
    fn ec_level(self) -> EcLevel {
        match self {
            Recovery::Low => EcLevel::L,
            Recovery::Medium => EcLevel::M,
            Recovery::Quartile => EcLevel::Q,
            Recovery::Highest => EcLevel::H,
        }
    }
}

impl<'de> Deserialize<'de> for Recovery {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Level(i64),
            Name(String),
        }

        let level = match Raw::deserialize(deserializer)? {
            Raw::Level(0) => Recovery::Low,
            Raw::Level(1) => Recovery::Medium,
            Raw::Level(2) => Recovery::Quartile,
            Raw::Level(3) => Recovery::Highest,
            Raw::Name(name) => match name.to_lowercase().as_str() {
                "low" | "l" => Recovery::Low,
                "medium" | "m" => Recovery::Medium,
                "quartile" | "q" => Recovery::Quartile,
                "highest" | "high" | "h" => Recovery::Highest,
                _ => {
                    return Err(serde::de::Error::custom(format!(
                        "invalid recovery level {:?}",
                        name
                    )));
                }
            },
            Raw::Level(n) => {
                return Err(serde::de::Error::custom(format!(
                    "recovery level must be 0..=3, got {}",
                    n
                )));
            }
        };
        Ok(level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrField {
    Text,
}

impl BindField for QrField {
    fn parse(name: &str) -> Option<Self> {
        (name == "text").then_some(QrField::Text)
    }
}

/// The module grid of an encoded payload.
#[derive(Debug, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(text: &str, recovery: Recovery) -> Result<Self, ConfigError> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), recovery.ec_level())
            .map_err(|e| ConfigError::Qr(e.to_string()))?;
        Ok(Self {
            width: code.width(),
            dark: code.to_colors().into_iter().map(|c| c == Color::Dark).collect(),
        })
    }

    /// Modules per side.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.dark[y * self.width + x]
    }

    /// Rasterize to a `size × size` image (grown to one pixel per module if
    /// `size` is too small).
    pub fn render(&self, size: u32, fg: Rgba<u8>) -> RgbaImage {
        let modules = self.width.max(1) as u32;
        let size = size.max(modules);
        let per_module = size / modules;
        let offset = (size - per_module * modules) / 2;

        RgbaImage::from_fn(size, size, |x, y| {
            if x < offset || y < offset {
                return TRANSPARENT;
            }
            let (mx, my) = ((x - offset) / per_module, (y - offset) / per_module);
            if mx < modules && my < modules && self.is_dark(mx as usize, my as usize) {
                fg
            } else {
                TRANSPARENT
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QrPlugin {
    pub binding: BTreeMap<String, String>,
    pub text: String,
    pub color: String,
    pub recovery: Recovery,
    pub anchor: FPoint,
    /// Side length as a fraction of the canvas width, in (0, 1].
    pub size: f64,

    #[serde(skip)]
    bindings: Binding<QrField>,
    #[serde(skip)]
    matrix: Option<Arc<QrMatrix>>,
    #[serde(skip)]
    fg: Rgba<u8>,
}

impl Default for QrPlugin {
    fn default() -> Self {
        Self {
            binding: BTreeMap::new(),
            text: String::new(),
            color: String::new(),
            recovery: Recovery::default(),
            anchor: FPoint::default(),
            size: 0.0,
            bindings: Binding::default(),
            matrix: None,
            fg: WHITE,
        }
    }
}

impl QrPlugin {
    pub fn matrix(&self) -> Option<&Arc<QrMatrix>> {
        self.matrix.as_ref()
    }

    fn build(&mut self) -> Result<(), ConfigError> {
        self.matrix = Some(Arc::new(QrMatrix::encode(&self.text, self.recovery)?));
        Ok(())
    }
}

#[async_trait]
impl Capability for QrPlugin {
    const KIND: PluginKind = PluginKind::Qr;

    async fn configure(&mut self, _assets: &AssetSource) -> Result<(), ConfigError> {
        if !(self.size > 0.0 && self.size <= 1.0) {
            return Err(ConfigError::InvalidField {
                field: "size",
                reason: format!("must be in (0, 1], got {}", self.size),
            });
        }
        self.bindings = Binding::parse(&self.binding, Self::KIND)?;
        self.fg = color::parse_or(&self.color, WHITE)?;
        if self.text.is_empty() {
            self.text = PLACEHOLDER_TEXT.to_string();
        }
        self.build()
    }

    async fn bind(
        &self,
        values: &BindValues,
        _assets: &AssetSource,
    ) -> Result<Option<Self>, BindError> {
        let mut copy = None::<Self>;
        for (field, key) in self.bindings.iter() {
            match field {
                QrField::Text => {
                    let text = values.get_string(key);
                    if text != self.text {
                        copy.get_or_insert_with(|| self.clone()).text = text;
                    }
                }
            }
        }

        match copy {
            Some(mut copy) => {
                copy.build()?;
                Ok(Some(copy))
            }
            None => Ok(None),
        }
    }

    fn apply(&self, canvas: &mut Canvas) -> Result<(), DrawError> {
        let matrix = self.matrix.as_ref().ok_or(DrawError::NotConfigured)?;
        let (x, y) = self.anchor.transform(canvas.width(), canvas.height());
        let side = (self.size * canvas.width() as f64).round() as u32;

        let img = matrix.render(side, self.fg);
        canvas.draw_image_anchored(&img, x, y, 0.5, 0.5, None);
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
    use crate::raster::color::BLACK;

    async fn configured(yaml: &str) -> Result<QrPlugin, ConfigError> {
        let dir = tempfile::tempdir().unwrap();
        let mut p = match parse_plugin_config("qr", serde_yaml::from_str(yaml).unwrap())? {
            Plugin::Qr(p) => p,
            other => panic!("unexpected plugin {other:?}"),
        };
        p.configure(&test_assets(dir.path())).await?;
        Ok(p)
    }

    #[tokio::test]
    async fn test_size_must_be_fraction() {
        for size in ["0", "1.5", "-0.2"] {
            let err = configured(&format!("text: hi\nsize: {size}")).await.unwrap_err();
            assert!(matches!(err, ConfigError::InvalidField { field: "size", .. }));
        }
        assert!(configured("text: hi\nsize: 1").await.is_ok());
    }

    #[tokio::test]
    async fn test_recovery_names_and_levels() {
        let p = configured("text: hi\nsize: 0.5\nrecovery: quartile").await.unwrap();
        assert_eq!(p.recovery, Recovery::Quartile);
        let p = configured("text: hi\nsize: 0.5\nrecovery: 3").await.unwrap();
        assert_eq!(p.recovery, Recovery::Highest);

        let err = configured("text: hi\nsize: 0.5\nrecovery: extreme").await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = configured("text: hi\nsize: 0.5\nrecovery: 7").await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_raster_is_exact_fraction_of_width() {
        let p = configured("text: https://example.com/p/1\nsize: 0.5\nanchor: {x: 0.5, y: 0.5}\ncolor: '#000'")
            .await
            .unwrap();
        let matrix = p.matrix().unwrap();
        let img = matrix.render(200, BLACK);
        assert_eq!(img.dimensions(), (200, 200));

        let mut canvas = Canvas::new(400, 400, None);
        p.apply(&mut canvas).unwrap();

        let inked: Vec<(u32, u32)> = canvas
            .image()
            .enumerate_pixels()
            .filter(|(_, _, px)| px[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!inked.is_empty());
        // Everything lies inside the centred 200×200 square.
        assert!(inked.iter().all(|&(x, y)| (100..300).contains(&x) && (100..300).contains(&y)));
        assert!(inked.iter().all(|&(x, y)| *canvas.image().get_pixel(x, y) == BLACK));
    }

    #[tokio::test]
    async fn test_default_foreground_is_white() {
        let p = configured("text: hi\nsize: 1").await.unwrap();
        let mut canvas = Canvas::new(50, 50, None);
        p.apply(&mut canvas).unwrap();
        assert!(canvas.image().pixels().any(|px| *px == WHITE));
        assert!(canvas.image().pixels().all(|px| *px == WHITE || *px == TRANSPARENT));
    }

    #[test]
    fn test_unconfigured_plugin_defaults() {
        let p = QrPlugin::default();
        assert_eq!(p.fg, WHITE);
        assert_eq!(p.recovery, Recovery::Medium);
        assert!(p.matrix().is_none());

        let mut canvas = Canvas::new(10, 10, None);
        assert!(matches!(p.apply(&mut canvas), Err(DrawError::NotConfigured)));
    }

    #[test]
    fn test_tiny_size_grows_to_module_count() {
        let matrix = QrMatrix::encode("hi", Recovery::Low).unwrap();
        let img = matrix.render(3, BLACK);
        assert_eq!(img.width() as usize, matrix.width());
    }

    #[tokio::test]
    async fn test_bind_rebuilds_matrix_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let assets = test_assets(dir.path());
        let p = configured("size: 0.8\nbinding: {text: qr_payload}").await.unwrap();
        assert_eq!(p.text, PLACEHOLDER_TEXT);

        let values = BindValues::new().with("qr_payload", "https://example.com/a");
        let bound = p.bind(&values, &assets).await.unwrap().unwrap();
        assert_eq!(bound.text, "https://example.com/a");
        assert_ne!(bound.matrix(), p.matrix());
        assert_eq!(
            **bound.matrix().unwrap(),
            QrMatrix::encode("https://example.com/a", Recovery::Medium).unwrap()
        );

        // Same payload as the configured text → nothing to rebuild.
        let values = BindValues::new().with("qr_payload", PLACEHOLDER_TEXT);
        assert!(p.bind(&values, &assets).await.unwrap().is_none());
    }
}
