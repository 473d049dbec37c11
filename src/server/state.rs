//! Server state shared across handlers.

use std::sync::Arc;

use tracing::{info, warn};

use crate::assets::AssetSource;
use crate::config::ServiceConfig;
use crate::error::VitrineError;
use crate::fetch::Fetcher;
use crate::frame::FrameRegistry;
use crate::registry::{Loadable, Registry};
use crate::template::TemplateRegistry;

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServiceConfig,
    pub assets: AssetSource,
    /// Product templates served under `/template`.
    pub templates: TemplateRegistry,
    /// QR templates served under `/qr`.
    pub qr_templates: TemplateRegistry,
    pub frames: FrameRegistry,
}

impl AppState {
    /// Empty registries over `assets`.
    pub fn new(config: ServiceConfig, assets: AssetSource) -> Self {
        Self {
            config,
            assets,
            templates: TemplateRegistry::new(),
            qr_templates: TemplateRegistry::new(),
            frames: FrameRegistry::new(),
        }
    }

    /// Build the fetcher and asset source from `config` and load every
    /// template directory it names.
    pub async fn load(config: ServiceConfig) -> Result<Self, VitrineError> {
        let fetcher = Fetcher::new(&config.fetcher_config())
            .map_err(|e| VitrineError::Transport(e.to_string()))?;
        let assets = AssetSource::new(Arc::new(fetcher), config.static_root.clone());
        let state = Self::new(config, assets);

        let dirs = state.config.templates.clone();
        load_family(&state.templates, &dirs.generic_dir, &state.assets).await;
        load_family(&state.qr_templates, &dirs.qr_dir, &state.assets).await;
        load_family(&state.frames, &dirs.frame_dir, &state.assets).await;
        Ok(state)
    }
}

/// A missing directory leaves the family empty; the server still starts.
async fn load_family<T: Loadable>(registry: &Registry<T>, dir: &str, assets: &AssetSource) {
    match registry.load_dir(dir, assets).await {
        Ok(count) => info!(family = T::FAMILY, dir, count, "templates loaded"),
        Err(e) => warn!(family = T::FAMILY, dir, error = %e, "template directory unavailable"),
    }
}
