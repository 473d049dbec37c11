//! # Error Types
//!
//! This module defines the error taxonomy used throughout the vitrine library.
//!
//! | Error | Raised | Scope of failure |
//! |-------|--------|------------------|
//! | [`ConfigError`] | template/plugin load | that one template |
//! | [`BindError`] | per-request binding | the current render |
//! | [`DrawError`] | plugin painting | the current render |
//! | [`RenderError`] | wraps the above per render call | the current render |
//!
//! Upstream failures travel as [`FetchError`](crate::fetch::FetchError) inside
//! these wrappers; [`RenderError::fetch_error`] digs them back out so the HTTP
//! layer can tell "not found" from "unavailable".

use thiserror::Error;

use crate::assets::AssetError;
use crate::fetch::FetchError;
use crate::plugin::PluginKind;

/// Main error type for vitrine operations (CLI and server bootstrap).
#[derive(Debug, Error)]
pub enum VitrineError {
    /// Template or service configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Render failure
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Transport-level errors (listener bind, server loop)
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bad or missing template/plugin fields, reported at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unknown plugin type {0:?}")]
    UnknownPluginType(String),

    #[error("Field {0} is required")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid color {0:?}")]
    InvalidColor(String),

    #[error("Unknown binding field {field:?} for {kind} plugin")]
    UnknownBinding { kind: PluginKind, field: String },

    #[error("Load asset {uri:?}: {source}")]
    Asset {
        uri: String,
        #[source]
        source: AssetError,
    },

    #[error("Load font {uri:?}: {reason}")]
    Font { uri: String, reason: String },

    #[error("QR code generation failed: {0}")]
    Qr(String),

    #[error("Parse plugin #{index}: {source}")]
    PluginEntry {
        index: usize,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("Configure plugin #{index} ({kind}): {source}")]
    Plugin {
        index: usize,
        kind: PluginKind,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// The upstream fetch failure behind this error, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            ConfigError::Asset { source, .. } => source.fetch_error(),
            ConfigError::Plugin { source, .. } | ConfigError::PluginEntry { source, .. } => {
                source.fetch_error()
            }
            _ => None,
        }
    }
}

/// A request value failed coercion, or the bound copy failed to reconfigure.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Value {value:?} for key {key:?} is not a valid integer")]
    Coercion { key: String, value: String },

    #[error("Reconfigure bound plugin: {0}")]
    Reconfigure(#[from] ConfigError),
}

/// Internal invariant violation while painting onto the canvas.
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("Degenerate rectangle {width}x{height}")]
    DegenerateRect { width: i64, height: i64 },

    #[error("Plugin was drawn before being configured")]
    NotConfigured,
}

/// Any failure of a single render call. Failure is all-or-nothing: no raster
/// is ever produced alongside one of these.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Bind plugin #{index} ({kind}): {source}")]
    Bind {
        index: usize,
        kind: PluginKind,
        #[source]
        source: BindError,
    },

    #[error("Draw plugin #{index} ({kind}): {source}")]
    Draw {
        index: usize,
        kind: PluginKind,
        #[source]
        source: DrawError,
    },

    #[error("Source image: {0}")]
    Source(#[from] AssetError),

    #[error("Encode error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Render task failed: {0}")]
    Task(String),
}

impl RenderError {
    /// The upstream fetch failure behind this error, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            RenderError::Bind {
                source: BindError::Reconfigure(e),
                ..
            } => e.fetch_error(),
            RenderError::Source(e) => e.fetch_error(),
            _ => None,
        }
    }

    /// True when the request itself carried an unusable value.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            RenderError::Bind {
                source: BindError::Coercion { .. },
                ..
            }
        )
    }
}
