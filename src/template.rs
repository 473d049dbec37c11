//! # Templates
//!
//! A template is an ordered list of configured plugins plus a sizing policy.
//! It has no canvas of its own: the width is picked per request from
//! `allWidths` and the height derived from `widthHeightRatio`.
//!
//! ```yaml
//! allWidths: [500, 800]
//! widthHeightRatio: 0.8
//! backgroundColor: "#ffffff"
//! plugins:
//!   - type: image
//!     binding: {image: source}
//!   - type: text
//!     fontUri: builtin:spleen
//!     fontSize: 24
//!     binding: {price: price, promotion_price: promotion_price}
//! ```
//!
//! Plugins are bound in declared order, then drawn in declared order onto
//! one canvas: later plugins paint over earlier ones.

use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::assets::AssetSource;
use crate::error::{ConfigError, RenderError};
use crate::plugin::{self, BindValues, Plugin, normalize_keys, parse_plugin_entry};
use crate::raster::Canvas;
use crate::raster::color::parse_hex_color;
use crate::raster::encode::{self, OutputFormat};
use crate::registry::{Loadable, Registry};

/// Raw YAML shape, keys already normalised.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplateConfig {
    allwidths: Vec<u32>,
    widthheightratio: f64,
    backgroundcolor: String,
    plugins: Vec<Mapping>,
}

/// A parsed and configured template, shared read-only between renders.
#[derive(Debug)]
pub struct Template {
    pub name: String,
    pub allowed_widths: Vec<u32>,
    pub ratio: f64,
    pub background: Option<Rgba<u8>>,
    pub plugins: Vec<Arc<Plugin>>,
}

impl Template {
    /// Parse YAML bytes and configure every plugin. Any failure rejects the
    /// whole template.
    pub async fn parse(name: &str, bytes: &[u8], assets: &AssetSource) -> Result<Self, ConfigError> {
        let raw: Mapping = serde_yaml::from_slice(bytes)?;
        let config: TemplateConfig = serde_yaml::from_value(Value::Mapping(normalize_keys(raw)))?;

        if config.allwidths.is_empty() {
            return Err(ConfigError::MissingField("allWidths"));
        }
        if config.allwidths.contains(&0) {
            return Err(ConfigError::InvalidField {
                field: "allWidths",
                reason: "widths must be positive".to_string(),
            });
        }

        let ratio = if config.widthheightratio > 0.0 {
            config.widthheightratio
        } else {
            1.0
        };
        let background = match config.backgroundcolor.trim() {
            "" => None,
            hex => Some(parse_hex_color(hex)?),
        };

        let mut plugins = Vec::with_capacity(config.plugins.len());
        for (index, fields) in config.plugins.into_iter().enumerate() {
            let mut plugin = parse_plugin_entry(fields).map_err(|e| ConfigError::PluginEntry {
                index,
                source: Box::new(e),
            })?;
            let kind = plugin.kind();
            plugin
                .configure(assets)
                .await
                .map_err(|e| ConfigError::Plugin {
                    index,
                    kind,
                    source: Box::new(e),
                })?;
            plugins.push(Arc::new(plugin));
        }

        info!(
            template = name,
            widths = ?config.allwidths,
            ratio,
            plugins = plugins.len(),
            "load template"
        );

        Ok(Self {
            name: name.to_string(),
            allowed_widths: config.allwidths,
            ratio,
            background,
            plugins,
        })
    }

    /// `requested` if allowed, otherwise the default (first) width.
    pub fn select_width(&self, requested: u32) -> u32 {
        if self.allowed_widths.contains(&requested) {
            requested
        } else {
            self.allowed_widths[0]
        }
    }

    pub fn derive_height(&self, width: u32) -> u32 {
        (width as f64 / self.ratio).floor() as u32
    }

    /// Bind against `values` and draw onto a fresh canvas.
    pub async fn render(
        &self,
        values: &BindValues,
        requested_width: u32,
        assets: &AssetSource,
    ) -> Result<RgbaImage, RenderError> {
        let width = self.select_width(requested_width);
        let height = self.derive_height(width);
        let bound = plugin::bind_all(&self.plugins, values, assets).await?;

        let background = self.background;
        let canvas = tokio::task::spawn_blocking(move || compose(&bound, width, height, background))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))??;
        Ok(canvas.into_image())
    }
}

/// Draw `plugins` in order onto a `width × height` canvas.
pub fn compose(
    plugins: &[Arc<Plugin>],
    width: u32,
    height: u32,
    background: Option<Rgba<u8>>,
) -> Result<Canvas, RenderError> {
    let mut canvas = Canvas::new(width, height, background);
    for (index, plugin) in plugins.iter().enumerate() {
        plugin.apply(&mut canvas).map_err(|source| RenderError::Draw {
            index,
            kind: plugin.kind(),
            source,
        })?;
    }
    Ok(canvas)
}

/// Render and encode in one call.
pub async fn render_template(
    template: &Template,
    values: &BindValues,
    requested_width: u32,
    format: OutputFormat,
    assets: &AssetSource,
) -> Result<Vec<u8>, RenderError> {
    let img = template.render(values, requested_width, assets).await?;
    let bytes = tokio::task::spawn_blocking(move || encode::encode(&img, format))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))??;
    Ok(bytes)
}

/// Composed templates by name.
pub type TemplateRegistry = Registry<Template>;

#[async_trait]
impl Loadable for Template {
    const FAMILY: &'static str = "template";

    fn name(&self) -> &str {
        &self.name
    }

    async fn load(name: &str, bytes: &[u8], assets: &AssetSource) -> Result<Self, ConfigError> {
        Template::parse(name, bytes, assets).await
    }
}
