//! Service configuration.
//!
//! Read from an optional YAML file (`config.yaml` by default); every key has
//! a default, so an empty or missing file yields a working service.
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! log_level: info
//! media_upstream: https://media3.example.com/
//! static_root: static
//! fetcher:
//!   concurrency: 16
//!   timeout_secs: 10
//! templates:
//!   generic_dir: templates/generic
//!   qr_dir: templates/qr
//!   frame_dir: /etc/vitrine/frames
//! ```
//!
//! Template directories name a directory of the embedded bundle unless a
//! directory exists at that path on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, VitrineError};
use crate::fetch::{self, FetcherConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen: String,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Base URL that `/template/{name}/{source}` paths are appended to.
    pub media_upstream: String,
    /// Root directory for `local:` asset URIs.
    pub static_root: PathBuf,
    pub fetcher: FetcherSettings,
    pub templates: TemplateDirs,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            media_upstream: "https://media3.example.com/".to_string(),
            static_root: PathBuf::from("static"),
            fetcher: FetcherSettings::default(),
            templates: TemplateDirs::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherSettings {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        let defaults = FetcherConfig::default();
        Self {
            concurrency: fetch::default_concurrency(),
            timeout_secs: defaults.timeout.as_secs(),
            user_agent: defaults.user_agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateDirs {
    pub generic_dir: String,
    pub qr_dir: String,
    pub frame_dir: String,
}

impl Default for TemplateDirs {
    fn default() -> Self {
        Self {
            generic_dir: "templates/generic".to_string(),
            qr_dir: "templates/qr".to_string(),
            frame_dir: "templates/frame".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parse a YAML document. An empty document is the default config.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let config: ServiceConfig = if value.is_null() {
            ServiceConfig::default()
        } else {
            serde_yaml::from_value(value)?
        };
        Ok(config.normalized())
    }

    /// Read `path`. `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, VitrineError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::from_yaml(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VitrineError::Io(e)),
        }
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Fill in derived invariants: the upstream ends with `/`, at least one
    /// fetch slot, a non-zero timeout.
    pub fn normalized(mut self) -> Self {
        if !self.media_upstream.ends_with('/') {
            self.media_upstream.push('/');
        }
        self.fetcher.concurrency = self.fetcher.concurrency.max(1);
        if self.fetcher.timeout_secs == 0 {
            self.fetcher.timeout_secs = fetch::DEFAULT_TIMEOUT.as_secs();
        }
        self
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            concurrency: self.fetcher.concurrency,
            timeout: Duration::from_secs(self.fetcher.timeout_secs),
            user_agent: self.fetcher.user_agent.clone(),
            ..FetcherConfig::default()
        }
    }

    /// Absolute URL of a media path relative to the upstream.
    pub fn media_url(&self, source: &str) -> String {
        format!("{}{}", self.media_upstream, source.trim_start_matches('/'))
    }
}
