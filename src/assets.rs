//! Asset resolution: turns template URIs into bytes.
//!
//! | URI | Source |
//! |-----|--------|
//! | `http://…`, `https://…` | upstream, through the bounded [`Fetcher`] |
//! | `local:/path` | file under the configured static root |
//! | anything else (`path`, `/path`) | the `static/` directory embedded in the binary |
//!
//! Callers never care which scheme answered, only whether they got bytes,
//! a not-found, or a transport failure.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use include_dir::{Dir, include_dir};
use reqwest::Url;
use thiserror::Error;

use crate::fetch::{FetchError, Fetcher};
use crate::raster::decode;

/// Files bundled at compile time (templates, frames, icons).
pub static EMBEDDED: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Errors that can occur while resolving an asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode failed: {0}")]
    Decode(String),
}

impl AssetError {
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            AssetError::Fetch(e) => Some(e),
            _ => None,
        }
    }

    /// True for a missing local/embedded file or an upstream 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            AssetError::NotFound(_) => true,
            AssetError::Fetch(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Resolves asset URIs for plugins, fonts and frame templates.
#[derive(Clone)]
pub struct AssetSource {
    fetcher: Arc<Fetcher>,
    static_root: PathBuf,
    embedded: &'static Dir<'static>,
}

impl AssetSource {
    /// Create a source backed by `fetcher`, reading `local:` URIs from
    /// `static_root` and everything else from the embedded directory.
    pub fn new(fetcher: Arc<Fetcher>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            static_root: static_root.into(),
            embedded: &EMBEDDED,
        }
    }

    /// Swap the embedded directory (tests, alternative bundles).
    pub fn with_embedded(mut self, dir: &'static Dir<'static>) -> Self {
        self.embedded = dir;
        self
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// Fetch the raw bytes behind `uri`.
    pub async fn get(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        self.get_tagged(uri, "asset").await
    }

    /// Like [`get`](Self::get), labelling upstream downloads with `tag`.
    pub async fn get_tagged(&self, uri: &str, tag: &str) -> Result<Vec<u8>, AssetError> {
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                Ok(self.fetcher.fetch(uri, tag).await?)
            }
            Ok(url) if url.scheme() == "local" => self.read_local(url.path()).await,
            _ => self.read_embedded(uri),
        }
    }

    /// Fetch and decode an image.
    pub async fn image(&self, uri: &str) -> Result<DynamicImage, AssetError> {
        let bytes = self.get(uri).await?;
        decode::decode_image(&bytes)
    }

    /// `(file stem, bytes)` of every `*.yaml` file directly inside `dir`,
    /// sorted by name. `dir` is a disk directory when one exists at that
    /// path, a `local:` path under the static root, or else a directory of
    /// the embedded bundle.
    pub async fn list_yaml(&self, dir: &str) -> Result<Vec<(String, Vec<u8>)>, AssetError> {
        let disk = match Url::parse(dir) {
            Ok(url) if url.scheme() == "local" => {
                Some(self.static_root.join(url.path().trim_start_matches('/')))
            }
            _ if Path::new(dir).is_dir() => Some(PathBuf::from(dir)),
            _ => None,
        };

        let mut found = match disk {
            Some(path) => read_yaml_dir(&path).await?,
            None => self.embedded_yaml(dir)?,
        };
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn embedded_yaml(&self, dir: &str) -> Result<Vec<(String, Vec<u8>)>, AssetError> {
        let trimmed = dir.trim_matches('/');
        let sub = if trimmed.is_empty() {
            Some(self.embedded)
        } else {
            self.embedded.get_dir(trimmed)
        };
        let sub = sub.ok_or_else(|| AssetError::NotFound(dir.to_string()))?;

        Ok(sub
            .files()
            .filter_map(|f| yaml_stem(f.path()).map(|stem| (stem, f.contents().to_vec())))
            .collect())
    }

    async fn read_local(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AssetError::NotFound(path.to_string()));
        }

        match tokio::fs::read(self.static_root.join(relative)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(format!("local:{}", path)))
            }
            Err(e) => Err(AssetError::Io(e)),
        }
    }

    fn read_embedded(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        self.embedded
            .get_file(uri.trim_start_matches('/'))
            .map(|f| f.contents().to_vec())
            .ok_or_else(|| AssetError::NotFound(uri.to_string()))
    }
}

fn yaml_stem(path: &Path) -> Option<String> {
    if path.extension()? != "yaml" {
        return None;
    }
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

async fn read_yaml_dir(dir: &Path) -> Result<Vec<(String, Vec<u8>)>, AssetError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AssetError::NotFound(dir.display().to_string()));
        }
        Err(e) => return Err(AssetError::Io(e)),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(stem) = yaml_stem(&path) {
            found.push((stem, tokio::fs::read(&path).await?));
        }
    }
    Ok(found)
}
