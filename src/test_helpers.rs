//! Shared test utilities for the copperzync test suite.
//!
//! Provides synthetic images, backend JSON fixtures, a `multer`-backed
//! multipart parser, and a scripted [`MockTransport`] that records every
//! request it is handed.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let transport = MockTransport::new()
//!     .fail(TransportError::Timeout)
//!     .respond(200, analysis_json("France"));
//! let engine = AnalysisEngine::new(transport, StaticProbe(true), EngineSettings::default());
//!
//! engine.analyze(&request).await.unwrap();
//! assert_eq!(engine.transport().attempts(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{Value, json};

use crate::model::{
    AnalysisMetadata, AnalysisResponse, AnalysisResult, BasicInfo, TechnicalDetails,
    ValueAssessment,
};
use crate::transport::{ConnectivityProbe, HttpRequest, HttpResponse, Transport, TransportError};

// =========================================================================
// Images
// =========================================================================

/// A deterministic RGB gradient; compresses like a photo, not like a flat fill.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

/// [`gradient_image`] encoded as JPEG bytes, as a camera would hand them over.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    gradient_image(width, height)
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .unwrap();
    bytes.into_inner()
}

// =========================================================================
// Typed results
// =========================================================================

/// A fully identified coin.
pub fn sample_result() -> AnalysisResult {
    AnalysisResult {
        basic_info: BasicInfo {
            released_year: "1943".to_string(),
            country: "United States".to_string(),
            denomination: "1 Cent".to_string(),
            composition: "Zinc-coated steel".to_string(),
        },
        value_assessment: ValueAssessment {
            collector_value: "$0.10 - $0.50".to_string(),
            rarity: "Common".to_string(),
        },
        description: "Lincoln wheat cent struck in steel during wartime copper shortages."
            .to_string(),
        historical_context: "Copper was reserved for ammunition in 1943.".to_string(),
        technical_details: TechnicalDetails {
            mint_mark: Some("D".to_string()),
            rarity: "Common".to_string(),
            diameter_mm: Some("19.05".to_string()),
        },
    }
}

/// A result whose nine identification fields all read `value`.
pub fn unknown_result(value: &str) -> AnalysisResult {
    AnalysisResult {
        basic_info: BasicInfo {
            released_year: value.to_string(),
            country: value.to_string(),
            denomination: value.to_string(),
            composition: value.to_string(),
        },
        value_assessment: ValueAssessment {
            collector_value: value.to_string(),
            rarity: value.to_string(),
        },
        description: value.to_string(),
        historical_context: value.to_string(),
        technical_details: TechnicalDetails {
            mint_mark: None,
            rarity: value.to_string(),
            diameter_mm: None,
        },
    }
}

fn response_with(analysis: AnalysisResult) -> AnalysisResponse {
    AnalysisResponse {
        success: true,
        timestamp: "2025-06-01T12:00:00Z".to_string(),
        analysis,
        metadata: AnalysisMetadata {
            model_used: "gpt-4o".to_string(),
            image_filename: "coin_image.jpg".to_string(),
            image_size_bytes: 48213,
            processing_time: "3.2s".to_string(),
        },
    }
}

pub fn sample_response() -> AnalysisResponse {
    response_with(sample_result())
}

pub fn unknown_response() -> AnalysisResponse {
    response_with(unknown_result("unknown"))
}

// =========================================================================
// Backend JSON bodies
// =========================================================================

/// Success body identifying a coin from `country`.
pub fn analysis_json_value(country: &str) -> Value {
    json!({
        "success": true,
        "timestamp": "2025-06-01T12:00:00Z",
        "coin_analysis": {
            "basic_info": {
                "released_year": "1943",
                "country": country,
                "denomination": "1 Cent",
                "composition": "Zinc-coated steel"
            },
            "value_assessment": {
                "collector_value": "$0.10 - $0.50",
                "rarity": "Common"
            },
            "description": "A small circulating coin.",
            "historical_context": "Minted during wartime.",
            "technical_details": {
                "mint_mark": "D",
                "rarity": "Common",
                "diameter_mm": "19.05"
            }
        },
        "metadata": {
            "model_used": "gpt-4o",
            "image_filename": "coin_image.jpg",
            "image_size_bytes": 48213,
            "processing_time": "3.2s"
        }
    })
}

pub fn analysis_json(country: &str) -> String {
    analysis_json_value(country).to_string()
}

/// Success body with every identification field set to `value`.
pub fn unknown_json(value: &str) -> String {
    let mut body = analysis_json_value(value);
    let analysis = &mut body["coin_analysis"];
    for key in ["released_year", "country", "denomination", "composition"] {
        analysis["basic_info"][key] = json!(value);
    }
    analysis["value_assessment"]["collector_value"] = json!(value);
    analysis["value_assessment"]["rarity"] = json!(value);
    analysis["description"] = json!(value);
    analysis["historical_context"] = json!(value);
    analysis["technical_details"]["rarity"] = json!(value);
    body.to_string()
}

/// Success body lacking `coin_analysis.basic_info.country`.
pub fn missing_country_json() -> String {
    let mut body = analysis_json_value("France");
    body["coin_analysis"]["basic_info"]
        .as_object_mut()
        .unwrap()
        .remove("country");
    body.to_string()
}

/// The backend's error shape.
pub fn error_json(message: &str) -> String {
    json!({
        "success": false,
        "error": message,
        "timestamp": "2025-06-01T12:00:00Z"
    })
    .to_string()
}

// =========================================================================
// Multipart parsing
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPart {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Parse a `multipart/form-data` body with `multer`, the way a server would.
/// The boundary is taken from the `Content-Type` header value.
pub async fn parse_multipart(content_type: &str, body: &[u8]) -> Vec<ParsedPart> {
    let boundary = multer::parse_boundary(content_type).unwrap();
    let mut form = multer::Multipart::with_reader(body, boundary);
    let mut parts = Vec::new();
    while let Some(field) = form.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(ParsedPart {
            name,
            filename,
            content_type,
            data,
        });
    }
    parts
}

// =========================================================================
// Transport doubles
// =========================================================================

enum Scripted {
    Respond(HttpResponse),
    Fail(TransportError),
    Hang,
}

/// Replays a script of responses, one per request, and records every
/// request it receives. An exhausted script fails with `Other`.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.push(Scripted::Respond(HttpResponse {
            status,
            body: body.into(),
        }))
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.push(Scripted::Fail(error))
    }

    /// Never answer; only a timeout ends this request.
    pub fn hang(self) -> Self {
        self.push(Scripted::Hang)
    }

    fn push(self, entry: Scripted) -> Self {
        self.script.lock().unwrap().push_back(entry);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(TransportError::Other(
                "mock transport script exhausted".to_string(),
            )),
        }
    }
}

/// A connectivity probe with a fixed answer.
pub struct StaticProbe(pub bool);

impl ConnectivityProbe for StaticProbe {
    async fn is_connected(&self) -> bool {
        self.0
    }
}
