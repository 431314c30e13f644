//! Image compression.
//!
//! Oversized uploads are re-encoded at stepwise-decreasing JPEG quality until
//! they fit under the configured ceiling or the quality floor is reached.
//! Compression is a mitigation for oversized blobs, never a default path.

use image::imageops::FilterType;
use relaypix_common::{AppError, AppResult};

/// Bounds for the iterative re-encoding loop.
#[derive(Debug, Clone)]
pub struct CompressionPolicy {
    /// Target ceiling in bytes the encoded result should fit under.
    pub target_max_bytes: usize,
    /// Neither output dimension may exceed this (aspect ratio preserved).
    pub max_dimension: u32,
    /// Initial JPEG quality (0-100 scale).
    pub start_quality: u8,
    /// Quality floor; below this the best effort so far is returned.
    pub min_quality: u8,
    /// Quality decrement per iteration.
    pub quality_step: u8,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            target_max_bytes: 10 * 1024 * 1024,
            max_dimension: 1600,
            start_quality: 70,
            min_quality: 20,
            quality_step: 10,
        }
    }
}

/// Re-encode an oversized image to fit under `policy.target_max_bytes`.
///
/// Decodes the blob, downscales so neither dimension exceeds the cap, then
/// encodes JPEG at decreasing quality. If even the floor quality is still
/// oversized the smallest encoding produced is returned; the caller decides
/// whether to reject it. The input is never mutated.
///
/// CPU-bound; run under `spawn_blocking` from async contexts.
pub fn compress_image(data: &[u8], policy: &CompressionPolicy) -> AppResult<Vec<u8>> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| AppError::Media(format!("decode failed: {e}")))?;

    let (w, h) = (decoded.width(), decoded.height());
    let resized = if w > policy.max_dimension || h > policy.max_dimension {
        decoded.resize(
            policy.max_dimension,
            policy.max_dimension,
            FilterType::Triangle,
        )
    } else {
        decoded
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();

    let mut quality = policy.start_quality;
    let mut best: Option<Vec<u8>> = None;

    loop {
        let encoded = encode_jpeg(&rgb, quality)?;

        if encoded.len() <= policy.target_max_bytes {
            return Ok(encoded);
        }

        // Track the smallest result so the best effort is what comes back
        // once the floor is reached.
        match best {
            Some(ref b) if b.len() <= encoded.len() => {}
            _ => best = Some(encoded),
        }

        if quality < policy.min_quality + policy.quality_step {
            tracing::debug!(
                quality = quality,
                target = policy.target_max_bytes,
                "quality floor reached, returning best effort"
            );
            return best.ok_or_else(|| AppError::Media("encoding produced no output".to_string()));
        }
        quality -= policy.quality_step;
    }
}

fn encode_jpeg(rgb: &image::RgbImage, quality: u8) -> AppResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| AppError::Media(format!("encode failed at quality {quality}: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A pseudo-noise image, which compresses poorly and keeps the loop busy.
    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17));
            image::Rgb([(v % 255) as u8, (v / 3 % 255) as u8, (v / 7 % 255) as u8])
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut buf),
                image::ImageFormat::Png,
            )
            .unwrap();
        buf
    }

    #[test]
    fn test_result_fits_generous_target() {
        let data = noise_png(2000, 1000);
        let policy = CompressionPolicy {
            target_max_bytes: 5 * 1024 * 1024,
            ..Default::default()
        };
        let out = compress_image(&data, &policy).unwrap();
        assert!(out.len() <= policy.target_max_bytes);
    }

    #[test]
    fn test_dimensions_are_capped() {
        let data = noise_png(2000, 1000);
        let policy = CompressionPolicy::default();
        let out = compress_image(&data, &policy).unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert!(decoded.width() <= 1600);
        assert!(decoded.height() <= 1600);
        // Aspect ratio preserved: 2:1 input stays 2:1.
        assert_eq!(decoded.width(), 1600);
        assert_eq!(decoded.height(), 800);
    }

    #[test]
    fn test_terminates_when_target_is_unreachable() {
        let data = noise_png(800, 600);
        let policy = CompressionPolicy {
            target_max_bytes: 1,
            ..Default::default()
        };
        // Cannot possibly fit; must still terminate with a best effort.
        let out = compress_image(&data, &policy).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn test_best_effort_is_no_larger_than_first_attempt() {
        let data = noise_png(800, 600);
        let policy = CompressionPolicy {
            target_max_bytes: 1,
            ..Default::default()
        };
        let best = compress_image(&data, &policy).unwrap();

        let decoded = image::load_from_memory(&data).unwrap().to_rgb8();
        let first = encode_jpeg(&decoded, policy.start_quality).unwrap();
        assert!(best.len() <= first.len());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let data = noise_png(400, 300);
        let copy = data.clone();
        let _ = compress_image(&data, &CompressionPolicy::default()).unwrap();
        assert_eq!(data, copy);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let data = noise_png(100, 80);
        let out = compress_image(&data, &CompressionPolicy::default()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 80);
    }

    #[test]
    fn test_undecodable_input_is_rejected() {
        let result = compress_image(b"not an image", &CompressionPolicy::default());
        assert!(matches!(result, Err(AppError::Media(_))));
    }
}
