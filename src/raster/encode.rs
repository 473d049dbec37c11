//! Canvas encoding (JPEG for photographs, PNG for QR/transparent output).

use std::io::Cursor;
use std::sync::OnceLock;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

/// JPEG quality used for every photo response.
pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

/// Encode a canvas. JPEG drops the alpha channel.
pub fn encode(img: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
    }
    Ok(buf)
}

static EMPTY_PNG: OnceLock<Vec<u8>> = OnceLock::new();

/// A transparent 1×1 PNG, sent as the body of failed image responses.
pub fn empty_png() -> &'static [u8] {
    EMPTY_PNG.get_or_init(|| {
        encode(&RgbaImage::new(1, 1), OutputFormat::Png).expect("encode 1x1 PNG")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_jpeg_signature() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([200, 10, 10, 255]));
        let bytes = encode(&img, OutputFormat::Jpeg).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_png_signature() {
        let img = RgbaImage::new(4, 4);
        let bytes = encode(&img, OutputFormat::Png).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_empty_png_is_one_pixel() {
        let decoded = image::load_from_memory(empty_png()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1, 1));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(OutputFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(OutputFormat::Png.content_type(), "image/png");
    }
}
