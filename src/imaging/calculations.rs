//! Pure calculation functions for upload dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions an image is uploaded at.
///
/// Images whose width and height both fit within `max_dimension` keep their
/// size. Larger images are scaled proportionally so the longer edge equals
/// `max_dimension` exactly; the shorter edge is rounded and never drops
/// below one pixel.
///
/// # Arguments
/// * `original` - Source dimensions (width, height)
/// * `max_dimension` - Upper bound for both edges, in pixels
///
/// # Returns
/// * `(width, height)` - Upload dimensions
///
/// # Examples
/// ```
/// # use copperzync::imaging::calculate_upload_dimensions;
/// // 4032x3024 camera frame → 800x600
/// assert_eq!(calculate_upload_dimensions((4032, 3024), 800), (800, 600));
///
/// // Already small enough → unchanged
/// assert_eq!(calculate_upload_dimensions((640, 480), 800), (640, 480));
/// ```
pub fn calculate_upload_dimensions(original: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;

    if orig_w <= max_dimension && orig_h <= max_dimension {
        return original;
    }

    if orig_w >= orig_h {
        // Landscape or square: width is the longer edge
        let ratio = max_dimension as f64 / orig_w as f64;
        let h = ((orig_h as f64 * ratio).round() as u32).max(1);
        (max_dimension, h)
    } else {
        // Portrait: height is the longer edge
        let ratio = max_dimension as f64 / orig_h as f64;
        let w = ((orig_w as f64 * ratio).round() as u32).max(1);
        (w, max_dimension)
    }
}
