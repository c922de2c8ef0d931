//! High-level preparation operations.
//!
//! These functions combine calculations with pixel work: plan the upload
//! size, downsample when needed, then JPEG-encode.

use super::calculations::calculate_upload_dimensions;
use super::params::{Quality, UploadPlan};
use crate::config::ClientConfig;
use crate::error::AnalysisError;
use crate::model::EncodedImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use tracing::debug;

/// Result type for preparation.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Settings for preparing images for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareSettings {
    /// Upper bound for both edges, in pixels.
    pub max_dimension: u32,
    pub quality: Quality,
}

impl PrepareSettings {
    /// Build settings from the `[images]` config section.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_dimension: config.images.max_dimension,
            quality: Quality::new(config.images.quality),
        }
    }
}

impl Default for PrepareSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Plan the upload of an image without touching its pixels.
pub fn plan_upload(dimensions: (u32, u32), settings: &PrepareSettings) -> UploadPlan {
    let (width, height) = calculate_upload_dimensions(dimensions, settings.max_dimension);
    UploadPlan {
        source_width: dimensions.0,
        source_height: dimensions.1,
        width,
        height,
        quality: settings.quality,
    }
}

/// Downsample (if needed) and JPEG-encode an in-memory image.
///
/// Images within `max_dimension` on both edges are re-encoded at their
/// original size. Larger ones are scaled so the longer edge equals
/// `max_dimension` with a triangle filter.
///
/// A zero-sized image or an encoder failure means the capture is corrupt
/// and is reported as [`AnalysisError::InvalidRequest`].
pub fn prepare(image: &DynamicImage, settings: &PrepareSettings) -> Result<EncodedImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(AnalysisError::InvalidRequest(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }

    let plan = plan_upload((image.width(), image.height()), settings);
    let bytes = if plan.needs_resize() {
        let resized = image.resize_exact(plan.width, plan.height, FilterType::Triangle);
        encode_jpeg(&resized, plan.quality)?
    } else {
        encode_jpeg(image, plan.quality)?
    };

    debug!(
        source = ?(plan.source_width, plan.source_height),
        upload = ?(plan.width, plan.height),
        quality = plan.quality.value(),
        bytes = bytes.len(),
        "prepared image for upload"
    );

    Ok(EncodedImage::jpeg(bytes, plan.width, plan.height))
}

/// Decode captured image bytes (JPEG, PNG, TIFF or WebP) and prepare them.
pub fn prepare_bytes(bytes: &[u8], settings: &PrepareSettings) -> Result<EncodedImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| AnalysisError::InvalidRequest(format!("unreadable image data: {e}")))?;
    prepare(&image, settings)
}

fn encode_jpeg(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.as_jpeg())
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| AnalysisError::InvalidRequest(format!("JPEG encode failed: {e}")))?;
    Ok(bytes)
}
