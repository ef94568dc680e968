//! Size-bounded JPEG encoding.

use crate::error::{MediaError, Result};
use core_runtime::config::ImageConfig;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{debug, warn};

/// Result of the quality search.
#[derive(Debug, Clone)]
pub struct EncodedJpeg {
    pub bytes: Vec<u8>,
    pub quality: u8,
    /// `false` when even the floor quality is above the ceiling
    pub within_ceiling: bool,
}

/// Encodes `img` starting at `quality_start`, stepping quality down until
/// the output fits `size_ceiling_bytes` or the floor is reached.
///
/// Quality strictly decreases, so the loop runs at most
/// `(start - floor) / step + 1` encodes. When the floor still does not fit,
/// the floor-quality bytes are returned with `within_ceiling = false`.
pub fn encode_within_ceiling(img: &RgbImage, config: &ImageConfig) -> Result<EncodedJpeg> {
    let floor = config.quality_floor.max(1);
    let step = config.quality_step.max(1);
    let mut quality = config.quality_start.clamp(floor, 100);

    loop {
        let bytes = encode_jpeg(img, quality)?;
        debug!(quality, size = bytes.len(), "Encoded JPEG");

        if bytes.len() <= config.size_ceiling_bytes {
            return Ok(EncodedJpeg {
                bytes,
                quality,
                within_ceiling: true,
            });
        }

        if quality <= floor {
            warn!(
                quality,
                size = bytes.len(),
                ceiling = config.size_ceiling_bytes,
                "Image still above size ceiling at minimum quality"
            );
            return Ok(EncodedJpeg {
                bytes,
                quality,
                within_ceiling: false,
            });
        }

        quality = quality.saturating_sub(step).max(floor);
    }
}

pub(crate) fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(img)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buffer)
}
