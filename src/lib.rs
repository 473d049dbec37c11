//! # Vitrine - On-Demand Marketing Image Renderer
//!
//! Vitrine composes product photos, text, prices and QR codes into finished
//! marketing images from declarative YAML templates. It provides:
//!
//! - **Templates**: a canvas size policy plus an ordered list of plugins
//! - **Plugins**: image, text and QR drawables with per-request bindings
//! - **Price frames**: photo + decorative frame + formatted price labels
//! - **Server**: an axum surface that renders on every request
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vitrine::{AssetSource, BindValues, Fetcher, OutputFormat, Template, render_template};
//! use vitrine::fetch::FetcherConfig;
//!
//! # async fn demo() -> Result<(), vitrine::VitrineError> {
//! let fetcher = Fetcher::new(&FetcherConfig::default())
//!     .map_err(|e| vitrine::VitrineError::Transport(e.to_string()))?;
//! let assets = AssetSource::new(Arc::new(fetcher), "static");
//!
//! let yaml = br##"
//! allWidths: [400]
//! widthHeightRatio: 1
//! backgroundColor: "#ffffff"
//! plugins:
//!   - type: qr
//!     size: 0.8
//!     anchor: {x: 0.5, y: 0.5}
//!     binding: {text: payload}
//! "##;
//! let template = Template::parse("qr", yaml, &assets).await?;
//!
//! let values = BindValues::new().with("payload", "https://example.com/p/1");
//! let png = render_template(&template, &values, 400, OutputFormat::Png, &assets).await?;
//! std::fs::write("qr.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | Template parsing, width policy, composition |
//! | [`plugin`] | Drawables and request bindings |
//! | [`frame`] | Price-frame templates |
//! | [`raster`] | Canvas, decoding, resizing, fonts, encoding |
//! | [`assets`] | `local:`, embedded and remote asset lookup |
//! | [`fetch`] | Bounded-concurrency HTTP client |
//! | [`registry`] | Named template stores loaded from directories |
//! | [`config`] | Service configuration |
//! | [`server`] | HTTP surface |
//! | [`error`] | Error types |

pub mod assets;
pub mod config;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod geometry;
pub mod plugin;
pub mod raster;
pub mod registry;
pub mod server;
pub mod template;

// Re-exports for convenience
pub use assets::AssetSource;
pub use config::ServiceConfig;
pub use error::VitrineError;
pub use fetch::Fetcher;
pub use frame::{FrameRegistry, FrameTemplate};
pub use plugin::BindValues;
pub use raster::encode::OutputFormat;
pub use template::{Template, TemplateRegistry, render_template};
