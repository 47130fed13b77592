//! Frame resizing
//!
//! Frames whose longest side exceeds the configured maximum are downscaled in
//! place with an aspect-preserving Lanczos filter. Frames already within
//! bounds are never rewritten, so a second pass is a no-op.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, instrument};
use crate::common::{KeyframeError, Result};

const JPEG_QUALITY: u8 = 95;

/// Dimensions after fitting `width`×`height` into a `max_dimension` square
///
/// Returns `None` when no resize is needed.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return None;
    }

    let scale = max_dimension as f64 / longest as f64;
    let fit = |side: u32| -> u32 {
        if side == longest {
            max_dimension
        } else {
            ((side as f64 * scale).round() as u32).max(1)
        }
    };
    Some((fit(width), fit(height)))
}

/// Downscale the image at `path` if its longest side exceeds `max_dimension`
///
/// # Returns
/// * `Result<bool>` - Whether the file was rewritten
#[instrument(fields(path = %path.display()))]
pub fn resize_if_needed(path: &Path, max_dimension: u32) -> Result<bool> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| KeyframeError::image_error(path, e))?;

    let Some((new_width, new_height)) = target_dimensions(width, height, max_dimension) else {
        return Ok(false);
    };

    let img = image::open(path).map_err(|e| KeyframeError::image_error(path, e))?;
    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3).to_rgb8();

    let writer = BufWriter::new(File::create(path)?);
    resized
        .write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))
        .map_err(|e| KeyframeError::image_error(path, e))?;

    debug!("Resized {}x{} -> {}x{}", width, height, new_width, new_height);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions(3000, 2000, 1568), Some((1568, 1045)));
        assert_eq!(target_dimensions(2000, 3000, 1568), Some((1045, 1568)));
        assert_eq!(target_dimensions(4000, 4000, 1568), Some((1568, 1568)));
        assert_eq!(target_dimensions(1568, 900, 1568), None);
        assert_eq!(target_dimensions(1280, 720, 1568), None);
        assert_eq!(target_dimensions(10000, 1, 1568), Some((1568, 1)));
    }

    #[test]
    fn test_resize_large_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0000_0.50s.jpg");
        write_jpeg(&path, 3000, 2000);

        assert!(resize_if_needed(&path, 1568).unwrap());

        let (width, height) = image::image_dimensions(&path).unwrap();
        assert_eq!(width, 1568);
        let expected_height = 2000.0 * 1568.0 / 3000.0;
        assert!((height as f64 - expected_height).abs() <= 1.0);
    }

    #[test]
    fn test_resize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        write_jpeg(&path, 800, 600);
        let before = std::fs::read(&path).unwrap();

        assert!(!resize_if_needed(&path, 1568).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_resize_missing_file() {
        let result = resize_if_needed(Path::new("does_not_exist.jpg"), 1568);
        assert!(matches!(result, Err(KeyframeError::Image { .. })));
    }
}
