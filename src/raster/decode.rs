//! Image decoding for source photographs and template assets.
//!
//! Whatever the `image` crate recognises from the leading bytes (JPEG, PNG,
//! GIF, WebP) decodes; anything else is an [`AssetError::Decode`].

use image::DynamicImage;

use crate::assets::AssetError;

/// Decode bytes of any supported format into a pixel buffer.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AssetError> {
    image::load_from_memory(bytes).map_err(|e| AssetError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::encode::{OutputFormat, encode};
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_png_round_trip_dimensions() {
        let img = RgbaImage::from_pixel(7, 3, Rgba([10, 20, 30, 255]));
        let bytes = encode(&img, OutputFormat::Png).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 3));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
    }

    #[test]
    fn test_heic_container_is_decode_error() {
        let mut data = vec![0, 0, 0, 24];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0; 16]);
        assert!(matches!(decode_image(&data), Err(AssetError::Decode(_))));
    }
}
