//! HTTP seam between the engine and the network.
//!
//! The engine never talks to `reqwest` directly. It builds an [`HttpRequest`],
//! hands it to a [`Transport`], and gets back either an [`HttpResponse`] or a
//! classified [`TransportError`]. Production uses [`ReqwestTransport`]; tests
//! script a mock.
//!
//! Classification is the only interesting part: a failed request is sorted
//! into "never connected", "connected then lost", "no network at all",
//! "timed out" or "bytes arrived garbled" by looking at the `io::ErrorKind`
//! buried in the error's source chain.

use crate::config::ClientConfig;
use crate::error::AnalysisError;
use reqwest::Url;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One HTTP exchange, fully described up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            content_type: None,
            body: Vec::new(),
            timeout,
        }
    }

    pub fn post(
        url: impl Into<String>,
        content_type: impl Into<String>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            content_type: Some(content_type.into()),
            body,
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Why a request produced no response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("could not connect to host")]
    Connect,
    #[error("connection lost mid-request")]
    ConnectionLost,
    #[error("not connected to a network")]
    NotConnected,
    #[error("response data corrupted: {0}")]
    Corrupted(String),
    /// The request itself could not be built.
    #[error("malformed request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for AnalysisError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => AnalysisError::Timeout,
            TransportError::Connect | TransportError::ConnectionLost => {
                AnalysisError::ConnectionFailed
            }
            TransportError::NotConnected => AnalysisError::NoConnectivity,
            TransportError::Corrupted(_) => AnalysisError::DataCorruption,
            TransportError::InvalidRequest(message) => AnalysisError::InvalidRequest(message),
            TransportError::Other(message) => AnalysisError::Transport(message),
        }
    }
}

/// Sends one request and waits for the full response body.
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the exchange.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Best-effort "is there a network at all" check.
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;
}

// ============================================================================
// reqwest
// ============================================================================

/// [`Transport`] over one pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn from_config(config: &ClientConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .user_agent(config.backend.user_agent.as_str())
            .pool_max_idle_per_host(config.backend.max_connections_per_host)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .build()
            .map_err(|e| AnalysisError::InvalidRequest(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            content_type,
            body,
            timeout,
        } = request;

        let mut builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(timeout);
        if let Some(content_type) = content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;
        trace!(%url, status, bytes = body.len(), "response received");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Sort a reqwest failure into a [`TransportError`].
pub fn classify(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if let Some(kind) = io_error_kind(&err) {
        if let Some(classified) = classify_io(kind) {
            return classified;
        }
    }
    if err.is_connect() {
        return TransportError::Connect;
    }
    if err.is_body() || err.is_decode() {
        return TransportError::Corrupted(err.to_string());
    }
    TransportError::Other(err.to_string())
}

fn classify_io(kind: io::ErrorKind) -> Option<TransportError> {
    match kind {
        io::ErrorKind::TimedOut => Some(TransportError::Timeout),
        io::ErrorKind::ConnectionRefused => Some(TransportError::Connect),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(TransportError::ConnectionLost),
        io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkDown => Some(TransportError::NotConnected),
        io::ErrorKind::InvalidData => Some(TransportError::Corrupted(
            "invalid data on the wire".to_string(),
        )),
        _ => None,
    }
}

fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = inner.source();
    }
    None
}

// ============================================================================
// Connectivity
// ============================================================================

/// Probes connectivity by opening a TCP connection to the backend host.
///
/// Any definitive answer from the host counts as "network up": a completed
/// handshake, or a refusal. A refusing backend is then reported by the
/// attempt loop as a connection failure, not as a missing network. Only
/// resolution failures, unreachable routes and silence count as offline.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Probe the host and port of `base_url` (port defaults by scheme).
    pub fn for_base_url(base_url: &str) -> Result<Self, AnalysisError> {
        let url = Url::parse(base_url)
            .map_err(|e| AnalysisError::InvalidRequest(format!("invalid base URL: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| AnalysisError::InvalidRequest(format!("no host in {base_url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AnalysisError::InvalidRequest(format!("no port for {base_url}")))?;
        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl ConnectivityProbe for TcpProbe {
    async fn is_connected(&self) -> bool {
        match tokio::net::TcpStream::connect((self.host.as_str(), self.port)).await {
            Ok(_) => true,
            Err(err) => {
                trace!(
                    host = %self.host,
                    port = self.port,
                    error = %err,
                    "connectivity probe failed"
                );
                host_answered(err.kind())
            }
        }
    }
}

/// Whether a failed connect still proves the host was reached.
fn host_answered(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}
