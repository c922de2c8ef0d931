//! # CopperZync
//!
//! Client for the CopperZync coin identification service. A photo of a coin
//! (or one of each face) is shrunk, JPEG-encoded, uploaded as
//! `multipart/form-data`, and the backend's structured analysis comes back
//! as typed data or as a typed error.
//!
//! # Architecture: Prepare, Encode, Deliver
//!
//! ```text
//! 1. Prepare   bitmap        →  JPEG ≤ 800 px     (imaging)
//! 2. Encode    JPEG(s)       →  multipart body    (multipart)
//! 3. Deliver   body          →  AnalysisResult    (engine over transport)
//! ```
//!
//! [`service::CoinAnalysisService`] strings the three together. All retry,
//! timeout and validation logic lives in the engine; the service only
//! prepares images.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Downsizing and JPEG encoding of captured images |
//! | [`multipart`] | `multipart/form-data` body and boundary selection |
//! | [`model`] | Request and result types, unknown-analysis classification |
//! | [`decode`] | Response validation with JSON field paths |
//! | [`error`] | `AnalysisError` taxonomy and user-facing messages |
//! | [`transport`] | HTTP seam, reqwest implementation, connectivity probe |
//! | [`retry`] | Retry budget, backoff, per-call retry bookkeeping |
//! | [`engine`] | Connectivity check, attempt loop, timeouts, health and reachability |
//! | [`service`] | Analyze one side or both sides of a coin |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Backend Sleeps
//!
//! The backend runs on a host that suspends idle services. The first request
//! after a quiet spell can take most of the 30 second request timeout while
//! the service boots. A timeout is therefore reported as "the server may be
//! starting up" and offered for retry, never as a hard failure.
//!
//! ## "unknown" Is Data
//!
//! When the model cannot identify a coin, the backend still answers 200 and
//! fills every field with the string `"unknown"`. The client keeps that
//! sentinel as a string ([`model::UNKNOWN`]) instead of mapping it to
//! `Option`: the convention belongs to the backend contract. The engine
//! retries such a response once, since it usually means the model choked on
//! the upload, and returns it as a normal result if it persists.
//!
//! ## Traits at the Network Seam
//!
//! The engine is generic over [`transport::Transport`] and
//! [`transport::ConnectivityProbe`]. Production plugs in reqwest and a TCP
//! probe; tests plug in a scripted mock and drive retries and timeouts on a
//! paused tokio clock, without sockets.
//!
//! ## Cancellation by Drop
//!
//! Both the per-request timeout and the operation ceiling are
//! `tokio::time::timeout`s. When one fires, the in-flight request future is
//! dropped, and reqwest aborts the connection.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod imaging;
pub mod model;
pub mod multipart;
pub mod output;
pub mod retry;
pub mod service;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;
