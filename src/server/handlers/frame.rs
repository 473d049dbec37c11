//! Price frame endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;

use super::{Failure, image_response};
use crate::error::RenderError;
use crate::plugin::BindValues;
use crate::raster::encode::OutputFormat;
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FrameQuery {
    pub template: String,
    pub price: String,
    pub promotion_price: String,
}

/// GET /frame/*source - the source photo with a price frame, as JPEG.
pub async fn render(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(query): Query<FrameQuery>,
) -> Result<Response, Failure> {
    let frame = state
        .frames
        .get(&query.template)
        .ok_or_else(|| Failure::unknown_template(&query.template))?;

    let prices = BindValues::new()
        .with("price", query.price)
        .with("promotion_price", query.promotion_price);
    let price = prices
        .get_int("price")
        .map_err(|e| Failure::bad_request(e.to_string()))?;
    let promotion_price = prices
        .get_int("promotion_price")
        .map_err(|e| Failure::bad_request(e.to_string()))?;

    let url = state.config.media_url(&source);
    let photo = state
        .assets
        .get_tagged(&url, "frame")
        .await
        .map_err(RenderError::Source)?;

    let bytes = tokio::task::spawn_blocking(move || frame.render_bytes(&photo, price, promotion_price))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))??;
    Ok(image_response(OutputFormat::Jpeg, bytes))
}
