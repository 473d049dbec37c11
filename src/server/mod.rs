//! # HTTP Server
//!
//! Thin axum surface over the renderers.
//!
//! | Route | Answer |
//! |-------|--------|
//! | `GET /ready` | `ok` |
//! | `GET /template/:template/*source` | JPEG: one product photo from the media upstream |
//! | `GET /template/:template` | JPEG: two products (`img_source1`, `img_source2`, ...) |
//! | `GET /qr/:template?payload=` | PNG: QR code |
//! | `GET /frame/*source?template=` | JPEG: photo with a price frame |
//! | `GET /internal/templates` | JSON: registered template names |
//!
//! ## Usage
//!
//! ```bash
//! vitrine serve --listen 0.0.0.0:8080
//! curl 'http://localhost:8080/template/product-card/p/123.jpg?price=250000&promotion_price=199000'
//! ```

mod handlers;
mod state;

pub use state::AppState;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::VitrineError;

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ready", get(handlers::internal::ready))
        .route("/internal/templates", get(handlers::internal::templates))
        .route("/template/:template", get(handlers::template::pair))
        .route("/template/:template/*source", get(handlers::template::single))
        .route("/qr/:template", get(handlers::qr::render))
        .route("/frame/*source", get(handlers::frame::render))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load templates and serve until the listener fails.
pub async fn serve(config: ServiceConfig) -> Result<(), VitrineError> {
    let listen = config.listen.clone();
    let state = Arc::new(AppState::load(config).await?);

    info!(
        listen = %listen,
        templates = state.templates.len(),
        qr = state.qr_templates.len(),
        frames = state.frames.len(),
        concurrency = state.assets.fetcher().max_concurrency(),
        "vitrine listening"
    );

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| VitrineError::Transport(format!("Failed to bind to {}: {}", listen, e)))?;

    axum::serve(listener, router(state))
        .await
        .map_err(|e| VitrineError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}
