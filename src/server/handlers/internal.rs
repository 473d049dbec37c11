//! Liveness and introspection.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::server::state::AppState;

/// GET /ready
pub async fn ready() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub templates: Vec<String>,
    pub qr: Vec<String>,
    pub frames: Vec<String>,
}

/// GET /internal/templates - registered names per family.
pub async fn templates(State(state): State<Arc<AppState>>) -> Json<TemplateList> {
    Json(TemplateList {
        templates: state.templates.names(),
        qr: state.qr_templates.names(),
        frames: state.frames.names(),
    })
}
