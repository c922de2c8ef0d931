//! Parameter types for upload preparation.
//!
//! These structs describe *what* to do to a captured image before it is
//! uploaded, not *how* to do it. [`operations`](super::operations) computes an
//! [`UploadPlan`] from the source dimensions and then executes it, which keeps
//! the dimension logic testable without touching pixels.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 70). Clamped on construction.
//! - [`UploadPlan`]: Source dimensions, target dimensions and quality for one image.

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the `u8` the JPEG encoder expects.
    pub fn as_jpeg(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// What to do with one image: keep or shrink, then encode at `quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPlan {
    pub source_width: u32,
    pub source_height: u32,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

impl UploadPlan {
    /// True when the image must be downsampled before encoding.
    pub fn needs_resize(&self) -> bool {
        self.width != self.source_width || self.height != self.source_height
    }
}
