//! Product template endpoints.

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

/// Query for a single product photo.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemQuery {
    pub price: String,
    pub promotion_price: String,
    pub product_name: String,
    pub width: String,
}

/// Query for the two-product layout; sources are media paths.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PairQuery {
    pub img_source1: String,
    pub price1: String,
    pub promotion_price1: String,
    pub img_source2: String,
    pub price2: String,
    pub promotion_price2: String,
    pub width: String,
}

/// GET /template/:template/*source - one product photo from the media upstream.
pub async fn single(
    State(state): State<Arc<AppState>>,
    Path((name, source)): Path<(String, String)>,
    Query(query): Query<ItemQuery>,
) -> Result<Response, Failure> {
    let values = BindValues::new()
        .with("template", name.as_str())
        .with("source", state.config.media_url(&source))
        .with("product_name", query.product_name)
        .with("price", query.price)
        .with("promotion_price", query.promotion_price);

    render(&state, &name, &values, requested_width(&query.width)).await
}

/// GET /template/:template - two products side by side.
pub async fn pair(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<PairQuery>,
) -> Result<Response, Failure> {
    let media = |source: &str| {
        if source.is_empty() {
            String::new()
        } else {
            state.config.media_url(source)
        }
    };
    let values = BindValues::new()
        .with("template", name.as_str())
        .with("img_source1", media(&query.img_source1))
        .with("price1", query.price1)
        .with("promotion_price1", query.promotion_price1)
        .with("img_source2", media(&query.img_source2))
        .with("price2", query.price2)
        .with("promotion_price2", query.promotion_price2);

    render(&state, &name, &values, requested_width(&query.width)).await
}

async fn render(
    state: &AppState,
    name: &str,
    values: &BindValues,
    width: u32,
) -> Result<Response, Failure> {
    let template = state
        .templates
        .get(name)
        .ok_or_else(|| Failure::unknown_template(name))?;
    let bytes = render_template(&template, values, width, OutputFormat::Jpeg, &state.assets).await?;
    Ok(image_response(OutputFormat::Jpeg, bytes))
}
