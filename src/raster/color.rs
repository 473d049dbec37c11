//! Hex color parsing.

use image::Rgba;

use crate::error::ConfigError;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>, ConfigError> {
    let invalid = || ConfigError::InvalidColor(s.to_string());
    let hex = s.trim().trim_start_matches('#');

    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<_>>()
        .ok_or_else(invalid)?;

    let channels: Vec<u8> = match digits.len() {
        3 | 4 => digits.iter().map(|d| d * 17).collect(),
        6 | 8 => digits.chunks(2).map(|p| (p[0] << 4) | p[1]).collect(),
        _ => return Err(invalid()),
    };

    let alpha = channels.get(3).copied().unwrap_or(255);
    Ok(Rgba([channels[0], channels[1], channels[2], alpha]))
}

/// Parse an optional color field, falling back to `default` when empty.
pub fn parse_or(s: &str, default: Rgba<u8>) -> Result<Rgba<u8>, ConfigError> {
    if s.trim().is_empty() {
        Ok(default)
    } else {
        parse_hex_color(s)
    }
}
