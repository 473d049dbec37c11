//! HTTP handlers for the server.
//!
//! Every image endpoint answers failures with a transparent 1×1 PNG and a
//! status derived from the error, so `<img>` tags degrade quietly.

pub mod frame;
pub mod internal;
pub mod qr;
pub mod template;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::RenderError;
use crate::fetch::FetchError;
use crate::raster::encode::{OutputFormat, empty_png};

/// A failed image request.
#[derive(Debug)]
pub struct Failure {
    pub status: StatusCode,
    pub message: String,
}

impl Failure {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unknown_template(name: &str) -> Self {
        Self::bad_request(format!("unknown template {:?}", name))
    }
}

impl From<RenderError> for Failure {
    fn from(err: RenderError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        (
            self.status,
            [(header::CONTENT_TYPE, OutputFormat::Png.content_type())],
            empty_png(),
        )
            .into_response()
    }
}

/// 400 for unusable request values, 404/502/504 for upstream failures,
/// 500 for everything else.
pub fn status_for(err: &RenderError) -> StatusCode {
    if err.is_bad_request() {
        return StatusCode::BAD_REQUEST;
    }
    match err.fetch_error() {
        Some(e) => fetch_status(e),
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn fetch_status(err: &FetchError) -> StatusCode {
    match err {
        FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Requested canvas width from the raw `width` query value. Anything that
/// is not a `u32` reads as 0, which every template maps to its default.
pub fn requested_width(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}

/// Encoded image response.
pub fn image_response(format: OutputFormat, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, format.content_type())], bytes).into_response()
}
