//! Decoding `POST /analyze` bodies into typed results.
//!
//! The body is parsed into a `serde_json::Value` first and then read field
//! by field through [`Fields`], which carries the dotted path of the object
//! it reads from. A missing key, a value of the wrong JSON type, or a body
//! that is not JSON at all each produce a distinct [`ResponseFault`] naming
//! the offending path, so a bad deploy on the backend is diagnosable from
//! the client log alone.
//!
//! When the analysis shape does not decode, the body is tried as the
//! backend's error shape (`{success, error, timestamp}`) before giving up,
//! because the backend sometimes reports failures with HTTP 200.

use crate::error::{AnalysisError, ResponseFault};
use crate::model::{
    AnalysisMetadata, AnalysisResponse, AnalysisResult, BasicInfo, ErrorResponse,
    TechnicalDetails, ValueAssessment,
};
use serde_json::{Map, Value};

/// Decode a 200 body into an [`AnalysisResponse`].
///
/// Returns [`AnalysisError::Server`] when the body is the error shape and
/// [`AnalysisError::MalformedResponse`] otherwise.
pub fn decode_analysis(body: &[u8]) -> Result<AnalysisResponse, AnalysisError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        AnalysisError::MalformedResponse(ResponseFault::corrupted("", e.to_string()))
    })?;

    match read_response(&value) {
        Ok(response) => Ok(response),
        Err(fault) => match error_message(&value) {
            Some(message) => Err(AnalysisError::Server(message)),
            None => Err(AnalysisError::MalformedResponse(fault)),
        },
    }
}

/// Extract the backend's error message from a body, if it has the error shape.
pub fn decode_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    error_message(&value)
}

fn error_message(value: &Value) -> Option<String> {
    serde_json::from_value::<ErrorResponse>(value.clone())
        .ok()
        .map(|response| response.error)
}

fn read_response(value: &Value) -> Result<AnalysisResponse, ResponseFault> {
    let root = Fields::root(value)?;
    let analysis = root.object("coin_analysis")?;
    let basic_info = analysis.object("basic_info")?;
    let value_assessment = analysis.object("value_assessment")?;
    let technical_details = analysis.object("technical_details")?;
    let metadata = root.object("metadata")?;

    Ok(AnalysisResponse {
        success: root.boolean("success")?,
        timestamp: root.string("timestamp")?,
        analysis: AnalysisResult {
            basic_info: BasicInfo {
                released_year: basic_info.string("released_year")?,
                country: basic_info.string("country")?,
                denomination: basic_info.string("denomination")?,
                composition: basic_info.string("composition")?,
            },
            value_assessment: ValueAssessment {
                collector_value: value_assessment.string("collector_value")?,
                rarity: value_assessment.string("rarity")?,
            },
            description: analysis.string("description")?,
            historical_context: analysis.string("historical_context")?,
            technical_details: TechnicalDetails {
                mint_mark: technical_details.optional_string("mint_mark")?,
                rarity: technical_details.string("rarity")?,
                diameter_mm: technical_details.optional_string("diameter_mm")?,
            },
        },
        metadata: AnalysisMetadata {
            model_used: metadata.string("model_used")?,
            image_filename: metadata.string("image_filename")?,
            image_size_bytes: metadata.unsigned("image_size_bytes")?,
            processing_time: metadata.string("processing_time")?,
        },
    })
}

/// A JSON object together with the path it was reached by.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    fn root(value: &'a Value) -> Result<Self, ResponseFault> {
        match value {
            Value::Object(map) => Ok(Self {
                map,
                path: String::new(),
            }),
            other => Err(ResponseFault::corrupted(
                "",
                format!("expected a JSON object, found {}", json_type(other)),
            )),
        }
    }

    fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value, ResponseFault> {
        self.map
            .get(key)
            .ok_or_else(|| ResponseFault::missing(self.path_of(key)))
    }

    fn object(&self, key: &str) -> Result<Fields<'a>, ResponseFault> {
        match self.required(key)? {
            Value::Object(map) => Ok(Fields {
                map,
                path: self.path_of(key),
            }),
            other => Err(ResponseFault::type_mismatch(
                self.path_of(key),
                "object",
                json_type(other),
            )),
        }
    }

    fn string(&self, key: &str) -> Result<String, ResponseFault> {
        match self.required(key)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(ResponseFault::type_mismatch(
                self.path_of(key),
                "string",
                json_type(other),
            )),
        }
    }

    /// Absent and `null` both read as `None`.
    fn optional_string(&self, key: &str) -> Result<Option<String>, ResponseFault> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ResponseFault::type_mismatch(
                self.path_of(key),
                "string",
                json_type(other),
            )),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool, ResponseFault> {
        match self.required(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(ResponseFault::type_mismatch(
                self.path_of(key),
                "boolean",
                json_type(other),
            )),
        }
    }

    fn unsigned(&self, key: &str) -> Result<u64, ResponseFault> {
        let value = self.required(key)?;
        value.as_u64().ok_or_else(|| {
            ResponseFault::type_mismatch(self.path_of(key), "unsigned integer", json_type(value))
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(n) if n.is_i64() && !n.is_u64() => "negative integer",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
