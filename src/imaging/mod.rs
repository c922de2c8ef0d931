//! Image preparation: pure Rust, no system libraries.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Decode** (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | **Plan** | [`calculate_upload_dimensions`] (longer edge ≤ 800 px) |
//! | **Downsample** | `DynamicImage::resize_exact` with `Triangle` |
//! | **Encode** | `image::codecs::jpeg::JpegEncoder` at quality 70 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing the upload
//! - **Operations**: Functions combining calculations with pixel work

mod calculations;
pub mod operations;
mod params;

pub use calculations::calculate_upload_dimensions;
pub use operations::{PrepareSettings, plan_upload, prepare, prepare_bytes};
pub use params::{Quality, UploadPlan};
