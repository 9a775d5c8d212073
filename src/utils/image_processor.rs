use std::io::Cursor;

use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use thiserror::Error;

/// Width of every generated thumbnail; height follows the source aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 90;

/// Thumbnails are always PNG, whatever the source format.
pub const THUMBNAIL_MIME: &str = "image/png";

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("{0}")]
    Decode(String),
    #[error("image is {width}x{height}, above the limit of {max_pixels} pixels")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    #[error("thumbnail would be {width}x{height}, above the limit of {max_pixels} pixels")]
    ThumbnailTooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    #[error("failed to encode thumbnail: {0}")]
    Encode(String),
}

/// Decodes `data` and renders a PNG thumbnail [`THUMBNAIL_WIDTH`] pixels wide.
///
/// The header is read first so that images above `max_pixels`, or whose
/// thumbnail would be, are rejected before a raster is allocated for them.
pub fn create_thumbnail(data: &[u8], max_pixels: u64) -> Result<Vec<u8>, ThumbnailError> {
    // 1. Check dimensions
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(ThumbnailError::TooLarge {
            width,
            height,
            max_pixels,
        });
    }

    let thumb_height = thumbnail_height(width, height);
    if u64::from(THUMBNAIL_WIDTH) * u64::from(thumb_height) > max_pixels {
        return Err(ThumbnailError::ThumbnailTooLarge {
            width: THUMBNAIL_WIDTH,
            height: thumb_height,
            max_pixels,
        });
    }

    // 2. Load image
    let img = image::load_from_memory(data).map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    // 3. Resize to the target width, height bounded by the checked target
    let thumb = img.resize(THUMBNAIL_WIDTH, thumb_height, FilterType::Lanczos3);

    // 4. Encode
    let mut buffer = Cursor::new(Vec::new());
    thumb
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Height of the thumbnail for a `width` x `height` source, rounded up.
fn thumbnail_height(width: u32, height: u32) -> u32 {
    let scaled = (u64::from(height) * u64::from(THUMBNAIL_WIDTH)).div_ceil(u64::from(width.max(1)));
    u32::try_from(scaled.max(1)).unwrap_or(u32::MAX)
}
