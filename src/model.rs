//! Request and result types shared by the preparation, transport and
//! presentation layers.
//!
//! Textual fields of an [`AnalysisResult`] are opaque strings chosen by the
//! backend. The literal [`UNKNOWN`] is its way of saying "could not tell";
//! it is kept as a string sentinel rather than mapped to `Option`, because
//! the backend contract defines it.

use serde::{Deserialize, Serialize};

/// Sentinel the backend writes into fields it could not identify.
pub const UNKNOWN: &str = "unknown";

/// MIME type of every uploaded image.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Which face of the coin an uploaded image shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSide {
    /// A single unlabeled photo.
    Single,
    Front,
    Back,
}

impl ImageSide {
    /// Multipart form field name the backend expects for this side.
    pub fn field_name(self) -> &'static str {
        match self {
            ImageSide::Single => "image",
            ImageSide::Front => "front_image",
            ImageSide::Back => "back_image",
        }
    }

    /// Filename reported in the part's `Content-Disposition`.
    pub fn filename(self) -> &'static str {
        match self {
            ImageSide::Single => "coin_image.jpg",
            ImageSide::Front => "coin_front.jpg",
            ImageSide::Back => "coin_back.jpg",
        }
    }
}

/// An image ready for upload: downsized and JPEG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
}

impl EncodedImage {
    pub fn jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
            content_type: JPEG_CONTENT_TYPE,
        }
    }

    /// Filename to upload this image under when it shows `side`.
    pub fn suggested_filename(&self, side: ImageSide) -> &'static str {
        side.filename()
    }
}

/// One logical "analyze" call: a single photo or both faces of a coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    Single(EncodedImage),
    BothSides {
        front: EncodedImage,
        back: EncodedImage,
    },
}

impl AnalysisRequest {
    /// Images in upload order, labeled with their side.
    pub fn parts(&self) -> Vec<(ImageSide, &EncodedImage)> {
        match self {
            AnalysisRequest::Single(image) => vec![(ImageSide::Single, image)],
            AnalysisRequest::BothSides { front, back } => {
                vec![(ImageSide::Front, front), (ImageSide::Back, back)]
            }
        }
    }

    /// Total encoded image bytes carried by the request.
    pub fn image_bytes(&self) -> usize {
        self.parts().iter().map(|(_, image)| image.bytes.len()).sum()
    }
}

/// Successful body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub timestamp: String,
    #[serde(rename = "coin_analysis")]
    pub analysis: AnalysisResult,
    pub metadata: AnalysisMetadata,
}

/// The identification itself, as rendered to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub basic_info: BasicInfo,
    pub value_assessment: ValueAssessment,
    pub description: String,
    pub historical_context: String,
    pub technical_details: TechnicalDetails,
}

const UNKNOWN_ANALYSIS_MESSAGE: &str = "We couldn't identify this coin. This might be due to:\n\n\
• Poor lighting or image quality\n\
• Coin not clearly visible\n\
• Unusual or rare coin type\n\
• Image angle or focus issues\n\n\
Try taking a clearer photo with better lighting and ensuring the coin is centered and well-focused.";

impl AnalysisResult {
    /// The nine fields whose unanimous [`UNKNOWN`] marks a non-identification.
    pub fn identification_fields(&self) -> [&str; 9] {
        [
            &self.basic_info.released_year,
            &self.basic_info.country,
            &self.basic_info.denomination,
            &self.basic_info.composition,
            &self.value_assessment.collector_value,
            &self.value_assessment.rarity,
            &self.description,
            &self.historical_context,
            &self.technical_details.rarity,
        ]
    }

    /// True when every identification field is `"unknown"` (any case).
    pub fn is_unknown_analysis(&self) -> bool {
        self.identification_fields()
            .iter()
            .all(|value| value.eq_ignore_ascii_case(UNKNOWN))
    }

    /// Guidance shown instead of a result when the coin was not identified.
    pub fn unknown_analysis_message(&self) -> Option<&'static str> {
        self.is_unknown_analysis().then_some(UNKNOWN_ANALYSIS_MESSAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicInfo {
    pub released_year: String,
    pub country: String,
    pub denomination: String,
    pub composition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAssessment {
    pub collector_value: String,
    pub rarity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_mark: Option<String>,
    pub rarity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diameter_mm: Option<String>,
}

impl TechnicalDetails {
    /// Diameter for display: `"24.3 mm"`, the raw value plus `" mm"` when it
    /// is not numeric, or `"Unknown"`.
    pub fn formatted_diameter(&self) -> String {
        match self.diameter_mm.as_deref() {
            None => "Unknown".to_string(),
            Some(raw) if raw.eq_ignore_ascii_case(UNKNOWN) => "Unknown".to_string(),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) => format!("{value:.1} mm"),
                Err(_) => format!("{raw} mm"),
            },
        }
    }

    pub fn has_diameter(&self) -> bool {
        self.diameter_mm
            .as_deref()
            .is_some_and(|raw| !raw.is_empty() && !raw.eq_ignore_ascii_case(UNKNOWN))
    }
}

/// Backend bookkeeping about how the analysis was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub model_used: String,
    pub image_filename: String,
    pub image_size_bytes: u64,
    pub processing_time: String,
}

/// Error body the backend sends alongside non-success outcomes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub timestamp: String,
}
