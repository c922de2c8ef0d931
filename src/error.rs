//! Error taxonomy for an analysis call.
//!
//! Every failure the client can hit is one [`AnalysisError`]. Its `Display`
//! text is the message shown to the user; [`AnalysisError::is_transient`]
//! drives the retry engine and [`AnalysisError::offers_retry`] tells the UI
//! whether a "try again" button makes sense.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The request could not be built: undecodable image, bad URL.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("No internet connection available. Please check your network settings.")]
    NoConnectivity,
    #[error("Request timed out. The server may be starting up. Please try again.")]
    Timeout,
    #[error("Failed to establish connection to server. Please try again.")]
    ConnectionFailed,
    /// Message reported by the backend, or a status summary when it sent none.
    #[error("{0}")]
    Server(String),
    #[error("Invalid response format: {0}")]
    MalformedResponse(ResponseFault),
    #[error("Network data corruption detected. Please try again.")]
    DataCorruption,
    #[error("Network error: {0}")]
    Transport(String),
}

impl AnalysisError {
    /// Failures worth another attempt within the same call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalysisError::Timeout
                | AnalysisError::ConnectionFailed
                | AnalysisError::DataCorruption
                | AnalysisError::Transport(_)
        )
    }

    /// Whether the user should be invited to try again rather than shown a
    /// terminal failure.
    pub fn offers_retry(&self) -> bool {
        self.is_transient() || matches!(self, AnalysisError::NoConnectivity)
    }
}

/// Where and how a response body failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFault {
    /// Dotted JSON path, e.g. `coin_analysis.basic_info.country`.
    pub path: String,
    pub kind: FaultKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    Missing,
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// The body is not a JSON document of the expected shape at all.
    Corrupted(String),
}

impl ResponseFault {
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FaultKind::Missing,
        }
    }

    pub fn type_mismatch(path: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self {
            path: path.into(),
            kind: FaultKind::TypeMismatch { expected, found },
        }
    }

    pub fn corrupted(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FaultKind::Corrupted(detail.into()),
        }
    }
}

impl fmt::Display for ResponseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FaultKind::Missing => write!(f, "missing field '{}'", self.path),
            FaultKind::TypeMismatch { expected, found } => write!(
                f,
                "type mismatch for field '{}' (expected {expected}, found {found})",
                self.path
            ),
            FaultKind::Corrupted(detail) if self.path.is_empty() => {
                write!(f, "corrupted data ({detail})")
            }
            FaultKind::Corrupted(detail) => {
                write!(f, "corrupted data at '{}' ({detail})", self.path)
            }
        }
    }
}
