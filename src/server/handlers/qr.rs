//! QR code endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;

use super::{Failure, image_response, requested_width};
use crate::plugin::BindValues;
use crate::raster::encode::OutputFormat;
use crate::server::state::AppState;
use crate::template::render_template;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QrQuery {
    pub payload: String,
    pub width: String,
}

/// GET /qr/:template - QR code for `payload`, as PNG.
pub async fn render(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<QrQuery>,
) -> Result<Response, Failure> {
    if query.payload.is_empty() {
        return Err(Failure::bad_request("payload is required"));
    }
    let template = state
        .qr_templates
        .get(&name)
        .ok_or_else(|| Failure::unknown_template(&name))?;

    let values = BindValues::new().with("qr_payload", query.payload);
    let bytes = render_template(
        &template,
        &values,
        requested_width(&query.width),
        OutputFormat::Png,
        &state.assets,
    )
    .await?;
    Ok(image_response(OutputFormat::Png, bytes))
}
