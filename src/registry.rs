//! Named, load-once template stores.
//!
//! Both template families (composed [`Template`](crate::template::Template)s
//! and price [`FrameTemplate`](crate::frame::FrameTemplate)s) are scanned
//! from a directory of `*.yaml` files and registered by file stem. A file
//! that fails to parse or configure is logged and skipped; the rest stay
//! usable.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::error;

use crate::assets::AssetSource;
use crate::error::ConfigError;

/// Something that can be built from a named YAML document.
#[async_trait]
pub trait Loadable: Sized + Send + Sync + 'static {
    /// Family name used in logs (`template`, `frame`).
    const FAMILY: &'static str;

    fn name(&self) -> &str;

    async fn load(name: &str, bytes: &[u8], assets: &AssetSource) -> Result<Self, ConfigError>;
}

pub struct Registry<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("names", &self.names()).finish()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        map.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Loadable> Registry<T> {
    /// Register (or replace) an entry under its own name.
    pub fn insert(&self, item: T) {
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        map.insert(item.name().to_string(), Arc::new(item));
    }

    /// Register every `*.yaml` under `dir` (disk path, `local:` path or
    /// embedded directory) by file stem. Returns how many were registered.
    pub async fn load_dir(&self, dir: &str, assets: &AssetSource) -> Result<usize, ConfigError> {
        let files = assets
            .list_yaml(dir)
            .await
            .map_err(|source| ConfigError::Asset {
                uri: dir.to_string(),
                source,
            })?;

        let mut loaded = 0;
        for (name, bytes) in files {
            match T::load(&name, &bytes, assets).await {
                Ok(item) => {
                    self.insert(item);
                    loaded += 1;
                }
                Err(e) => error!(family = T::FAMILY, name = %name, dir, error = %e, "rejected"),
            }
        }
        Ok(loaded)
    }
}
