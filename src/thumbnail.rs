//! In-memory gallery thumbnails for stored screenshots.
//!
//! Thumbnails are never written into the screenshot directory; callers get PNG
//! bytes back and decide what to do with them.

use std::io::Cursor;

use image::{imageops::FilterType, ImageFormat};
use thiserror::Error;
use tracing::debug;

/// Longest edge of a gallery thumbnail, in pixels.
pub const THUMBNAIL_SIZE: u32 = 256;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Failed to decode screenshot: {0}")]
    Decode(image::ImageError),
    #[error("Failed to encode thumbnail: {0}")]
    Encode(image::ImageError),
}

/// Decodes `bytes` and returns a PNG no larger than `max_edge` on either side.
/// Images already small enough keep their size.
pub fn thumbnail_png(bytes: &[u8], max_edge: u32) -> Result<Vec<u8>, ThumbnailError> {
    let img = image::load_from_memory(bytes).map_err(ThumbnailError::Decode)?;
    let max_edge = max_edge.max(1);

    let thumb = if img.width() > max_edge || img.height() > max_edge {
        img.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    thumb
        .write_to(&mut out, ImageFormat::Png)
        .map_err(ThumbnailError::Encode)?;
    debug!(
        width = thumb.width(),
        height = thumb.height(),
        bytes = out.get_ref().len(),
        "Generated thumbnail"
    );
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, RgbaImage};

    fn png_of(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_large_image_is_downscaled_keeping_ratio() {
        let thumb = thumbnail_png(&png_of(1024, 512), THUMBNAIL_SIZE).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (256, 128));
    }

    #[test]
    fn test_small_image_keeps_size() {
        let thumb = thumbnail_png(&png_of(40, 30), THUMBNAIL_SIZE).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            thumbnail_png(b"definitely not an image", THUMBNAIL_SIZE),
            Err(ThumbnailError::Decode(_))
        ));
    }
}
