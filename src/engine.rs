//! Transport/retry engine: one resilient `POST /analyze` per call.
//!
//! ```text
//! connectivity probe (raced against its timeout)
//!   └─ unreachable → NoConnectivity, nothing sent
//! build multipart body once
//! ┌─ operation ceiling ───────────────────────────────┐
//! │ attempt n: POST under the per-request timeout     │
//! │   200 → decode → identified  → done               │
//! │                 → unknown     → retry / return it │
//! │                 → error shape → Server            │
//! │                 → bad shape   → MalformedResponse │
//! │   !200 → Server(message or status)                │
//! │   transport failure → classify → retry / fail     │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Attempts are strictly sequential. Both timeouts drop the in-flight
//! transport future, which aborts the request rather than abandoning it.
//!
//! Progress is logged through `tracing` and, when a sender is attached with
//! [`AnalysisEngine::with_events`], published as [`EngineEvent`]s.

use crate::config::ClientConfig;
use crate::decode::{decode_analysis, decode_error_message};
use crate::error::AnalysisError;
use crate::model::{AnalysisRequest, AnalysisResponse};
use crate::multipart;
use crate::retry::{BackoffKind, BackoffPolicy, RetryPolicy, RetryState, Step};
use crate::transport::{ConnectivityProbe, HttpRequest, HttpResponse, Transport};
use std::sync::mpsc::Sender;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runtime settings for the engine, derived from [`ClientConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Backend root, without trailing slash.
    pub base_url: String,
    pub request_timeout: Duration,
    pub operation_timeout: Duration,
    pub connectivity_timeout: Duration,
    pub health_timeout: Duration,
    pub reachability_timeout: Duration,
    pub retry: RetryPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        let timeouts = &config.timeouts;
        let backoff = match config.retry.backoff {
            BackoffKind::Immediate => BackoffPolicy::Immediate,
            BackoffKind::Exponential => BackoffPolicy::Exponential {
                base: Duration::from_secs(config.retry.backoff_base_secs),
            },
        };
        Self {
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(timeouts.request_secs),
            operation_timeout: Duration::from_secs(timeouts.operation_secs),
            connectivity_timeout: Duration::from_secs(timeouts.connectivity_secs),
            health_timeout: Duration::from_secs(timeouts.health_secs),
            reachability_timeout: Duration::from_secs(timeouts.reachability_secs),
            retry: RetryPolicy {
                max_retries: config.retry.max_retries,
                backoff,
            },
        }
    }

    /// Absolute URL of an endpoint below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Progress notifications for one engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ConnectivityChecked {
        connected: bool,
    },
    AttemptStarted {
        attempt: u32,
        total: u32,
    },
    /// `retry_in` is `None` when this failure ends the call.
    AttemptFailed {
        attempt: u32,
        error: AnalysisError,
        retry_in: Option<Duration>,
    },
    UnknownAnalysis {
        attempt: u32,
        retry_in: Duration,
    },
    Completed {
        attempts: u32,
        identified: bool,
    },
    /// The operation ceiling elapsed before any attempt settled the call.
    OperationTimedOut {
        after: Duration,
    },
}

/// Result of `GET /`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    pub status: u16,
}

impl Reachability {
    /// 200 and 404 both prove the server answered.
    pub fn is_reachable(&self) -> bool {
        matches!(self.status, 200 | 404)
    }
}

pub struct AnalysisEngine<T, P> {
    transport: T,
    probe: P,
    settings: EngineSettings,
    events: Option<Sender<EngineEvent>>,
}

impl<T: Transport, P: ConnectivityProbe> AnalysisEngine<T, P> {
    pub fn new(transport: T, probe: P, settings: EngineSettings) -> Self {
        Self {
            transport,
            probe,
            settings,
            events: None,
        }
    }

    /// Publish [`EngineEvent`]s to `sender` from now on.
    pub fn with_events(mut self, sender: Sender<EngineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Upload `request` and return the backend's analysis.
    ///
    /// An unknown-analysis response that survives every retry is returned as
    /// `Ok`; callers check [`crate::model::AnalysisResult::is_unknown_analysis`].
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.ensure_connected().await?;

        let body = multipart::build_body(request);
        let url = self.settings.endpoint("analyze");
        let content_type = body.content_type();
        info!(
            %url,
            bytes = body.bytes.len(),
            images = request.parts().len(),
            "starting analysis"
        );

        let mut state = RetryState::new(self.settings.retry);
        let ceiling = self.settings.operation_timeout;
        let attempts = self.run_attempts(&mut state, &url, &content_type, &body.bytes);
        let outcome = timeout(ceiling, attempts).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    attempts = state.attempts(),
                    ceiling_secs = ceiling.as_secs_f64(),
                    "operation ceiling reached"
                );
                self.emit(EngineEvent::OperationTimedOut { after: ceiling });
                Err(AnalysisError::Timeout)
            }
        }
    }

    /// `GET /health`; any status other than 200 is a server error.
    pub async fn check_health(&self) -> Result<(), AnalysisError> {
        self.ensure_connected().await?;
        let request = HttpRequest::get(self.settings.endpoint("health"), self.settings.health_timeout);
        let response = self.send_bounded(request).await?;
        if response.status == 200 {
            info!("backend healthy");
            Ok(())
        } else {
            warn!(status = response.status, "backend health check failed");
            Err(AnalysisError::Server(format!(
                "Backend health check failed with status: {}",
                response.status
            )))
        }
    }

    /// `GET /` to see whether the server answers at all.
    pub async fn test_connection(&self) -> Result<Reachability, AnalysisError> {
        let request = HttpRequest::get(
            self.settings.endpoint(""),
            self.settings.reachability_timeout,
        );
        let response = self.send_bounded(request).await?;
        let reachability = Reachability {
            status: response.status,
        };
        debug!(
            status = response.status,
            reachable = reachability.is_reachable(),
            "reachability probe answered"
        );
        Ok(reachability)
    }

    async fn ensure_connected(&self) -> Result<(), AnalysisError> {
        let connected = timeout(self.settings.connectivity_timeout, self.probe.is_connected())
            .await
            .unwrap_or(false);
        self.emit(EngineEvent::ConnectivityChecked { connected });
        if connected {
            debug!("connectivity check passed");
            Ok(())
        } else {
            warn!("no network connectivity");
            Err(AnalysisError::NoConnectivity)
        }
    }

    async fn run_attempts(
        &self,
        state: &mut RetryState,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<AnalysisResponse, AnalysisError> {
        loop {
            let attempt = state.next_attempt();
            let total = state.total_attempts();
            self.emit(EngineEvent::AttemptStarted { attempt, total });
            debug!(attempt, total, "sending analysis request");

            let request =
                HttpRequest::post(url, content_type, body.to_vec(), self.settings.request_timeout);
            let outcome = self.attempt(request).await;
            let unknown = matches!(&outcome, Ok(response) if response.analysis.is_unknown_analysis());
            let failure = outcome.as_ref().err().cloned();

            match state.record(outcome) {
                Step::Done(result) => {
                    match &result {
                        Ok(response) => {
                            let identified = !response.analysis.is_unknown_analysis();
                            info!(attempts = attempt, identified, "analysis complete");
                            self.emit(EngineEvent::Completed {
                                attempts: attempt,
                                identified,
                            });
                        }
                        Err(error) => {
                            warn!(attempt, %error, "analysis failed");
                            self.emit(EngineEvent::AttemptFailed {
                                attempt,
                                error: error.clone(),
                                retry_in: None,
                            });
                        }
                    }
                    return result;
                }
                Step::RetryAfter(delay) => {
                    if unknown {
                        warn!(attempt, "backend could not identify the coin, retrying");
                        self.emit(EngineEvent::UnknownAnalysis {
                            attempt,
                            retry_in: delay,
                        });
                    } else if let Some(error) = failure {
                        warn!(attempt, %error, retry_in_secs = delay.as_secs_f64(), "attempt failed, retrying");
                        self.emit(EngineEvent::AttemptFailed {
                            attempt,
                            error,
                            retry_in: Some(delay),
                        });
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn attempt(&self, request: HttpRequest) -> Result<AnalysisResponse, AnalysisError> {
        let response = self.send_bounded(request).await?;
        interpret(response)
    }

    /// Send under the request's own timeout, in addition to whatever the
    /// transport enforces.
    async fn send_bounded(&self, request: HttpRequest) -> Result<HttpResponse, AnalysisError> {
        let limit = request.timeout;
        match timeout(limit, self.transport.send(request)).await {
            Ok(result) => result.map_err(AnalysisError::from),
            Err(_) => Err(AnalysisError::Timeout),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sender) = &self.events {
            // A closed receiver only means nobody is listening any more.
            let _ = sender.send(event);
        }
    }
}

/// Turn an `/analyze` response into a result or error.
fn interpret(response: HttpResponse) -> Result<AnalysisResponse, AnalysisError> {
    if response.status == 200 {
        return decode_analysis(&response.body);
    }
    let message = decode_error_message(&response.body)
        .unwrap_or_else(|| format!("Server error: {}", response.status));
    Err(AnalysisError::Server(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FaultKind, ResponseFault};
    use crate::model::EncodedImage;
    use crate::test_helpers::{
        MockTransport, StaticProbe, analysis_json, error_json, missing_country_json,
        parse_multipart, unknown_json,
    };
    use crate::transport::{Method, TransportError};
    use std::future::pending;

    fn settings() -> EngineSettings {
        EngineSettings {
            base_url: "https://backend.test".to_string(),
            ..EngineSettings::default()
        }
    }

    fn engine(transport: MockTransport) -> AnalysisEngine<MockTransport, StaticProbe> {
        AnalysisEngine::new(transport, StaticProbe(true), settings())
    }

    fn single() -> AnalysisRequest {
        AnalysisRequest::Single(EncodedImage::jpeg(vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9], 10, 10))
    }

    // =========================================================================
    // Settings
    // =========================================================================

    #[test]
    fn settings_from_stock_config() {
        let settings = EngineSettings::default();
        assert_eq!(settings.base_url, "https://copperzync-backend.onrender.com");
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.operation_timeout, Duration::from_secs(35));
        assert_eq!(settings.connectivity_timeout, Duration::from_secs(3));
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn settings_translate_exponential_backoff() {
        let mut config = ClientConfig::default();
        config.retry.backoff = BackoffKind::Exponential;
        config.retry.backoff_base_secs = 2;
        config.backend.base_url = "http://localhost:9000/".to_string();
        let settings = EngineSettings::from_config(&config);
        assert_eq!(
            settings.retry.backoff,
            BackoffPolicy::Exponential {
                base: Duration::from_secs(2)
            }
        );
        assert_eq!(settings.endpoint("analyze"), "http://localhost:9000/analyze");
        assert_eq!(settings.endpoint(""), "http://localhost:9000/");
    }

    // =========================================================================
    // analyze: success and unknown analysis
    // =========================================================================

    #[tokio::test]
    async fn well_formed_result_needs_no_retry() {
        let engine = engine(MockTransport::new().respond(200, analysis_json("France")));
        let response = engine.analyze(&single()).await.unwrap();
        assert_eq!(response.analysis.basic_info.country, "France");
        assert_eq!(engine.transport().attempts(), 1);
    }

    #[tokio::test]
    async fn request_is_multipart_post_to_analyze() {
        let engine = engine(MockTransport::new().respond(200, analysis_json("France")));
        engine.analyze(&single()).await.unwrap();

        let sent = engine.transport().requests();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].url, "https://backend.test/analyze");
        let content_type = sent[0].content_type.clone().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let parts = parse_multipart(&content_type, &sent[0].body).await;
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "image");
        assert_eq!(parts[0].data, vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn unknown_on_every_attempt_returns_unknown_result() {
        let engine = engine(
            MockTransport::new()
                .respond(200, unknown_json("Unknown"))
                .respond(200, unknown_json("UNKNOWN")),
        );
        let response = engine.analyze(&single()).await.unwrap();
        assert!(response.analysis.is_unknown_analysis());
        assert_eq!(engine.transport().attempts(), 2);
    }

    #[tokio::test]
    async fn unknown_then_identified_returns_identified() {
        let engine = engine(
            MockTransport::new()
                .respond(200, unknown_json("unknown"))
                .respond(200, analysis_json("Canada")),
        );
        let response = engine.analyze(&single()).await.unwrap();
        assert_eq!(response.analysis.basic_info.country, "Canada");
        assert_eq!(engine.transport().attempts(), 2);
    }

    #[tokio::test]
    async fn server_error_after_unknown_returns_unknown() {
        let engine = engine(
            MockTransport::new()
                .respond(200, unknown_json("unknown"))
                .respond(500, error_json("boom")),
        );
        let response = engine.analyze(&single()).await.unwrap();
        assert!(response.analysis.is_unknown_analysis());
        assert_eq!(engine.transport().attempts(), 2);
    }

    // =========================================================================
    // analyze: failures
    // =========================================================================

    #[tokio::test]
    async fn timeout_then_success_makes_two_attempts() {
        let engine = engine(
            MockTransport::new()
                .fail(TransportError::Timeout)
                .respond(200, analysis_json("Mexico")),
        );
        let response = engine.analyze(&single()).await.unwrap();
        assert_eq!(response.analysis.basic_info.country, "Mexico");
        assert_eq!(engine.transport().attempts(), 2);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_classified_error() {
        let engine = engine(
            MockTransport::new()
                .fail(TransportError::Connect)
                .fail(TransportError::ConnectionLost),
        );
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::ConnectionFailed)
        );
        assert_eq!(engine.transport().attempts(), 2);
    }

    #[tokio::test]
    async fn server_error_body_message_is_surfaced() {
        let engine = engine(MockTransport::new().respond(500, error_json("boom")));
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::Server("boom".to_string()))
        );
        assert_eq!(engine.transport().attempts(), 1);
    }

    #[tokio::test]
    async fn unbuildable_request_is_not_retried() {
        let engine = engine(
            MockTransport::new().fail(TransportError::InvalidRequest("bad url".into())),
        );
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::InvalidRequest("bad url".to_string()))
        );
        assert_eq!(engine.transport().attempts(), 1);
    }

    #[tokio::test]
    async fn server_error_without_body_reports_status() {
        let engine = engine(MockTransport::new().respond(503, "Service Unavailable"));
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::Server("Server error: 503".to_string()))
        );
    }

    #[tokio::test]
    async fn unreachable_network_sends_nothing() {
        let engine = AnalysisEngine::new(
            MockTransport::new().respond(200, analysis_json("France")),
            StaticProbe(false),
            settings(),
        );
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::NoConnectivity)
        );
        assert_eq!(engine.transport().attempts(), 0);
    }

    #[tokio::test]
    async fn missing_country_is_malformed_with_path() {
        let engine = engine(MockTransport::new().respond(200, missing_country_json()));
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::MalformedResponse(ResponseFault::missing(
                "coin_analysis.basic_info.country"
            )))
        );
        assert_eq!(engine.transport().attempts(), 1);
    }

    #[tokio::test]
    async fn garbage_body_is_corrupted_fault() {
        let engine = engine(MockTransport::new().respond(200, "<html>oops</html>"));
        match engine.analyze(&single()).await {
            Err(AnalysisError::MalformedResponse(fault)) => {
                assert!(matches!(fault.kind, FaultKind::Corrupted(_)))
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    // =========================================================================
    // Timing (paused clock)
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn hung_request_times_out_and_is_retried() {
        let transport = MockTransport::new()
            .hang()
            .respond(200, analysis_json("Peru"));
        let mut settings = settings();
        settings.request_timeout = Duration::from_secs(10);
        let engine = AnalysisEngine::new(transport, StaticProbe(true), settings);

        let started = tokio::time::Instant::now();
        let response = engine.analyze(&single()).await.unwrap();
        assert_eq!(response.analysis.basic_info.country, "Peru");
        assert_eq!(engine.transport().attempts(), 2);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn operation_ceiling_bounds_all_attempts() {
        let transport = MockTransport::new().hang().hang().hang();
        let mut settings = settings();
        settings.request_timeout = Duration::from_secs(30);
        settings.operation_timeout = Duration::from_secs(35);
        settings.retry.max_retries = 2;
        let engine = AnalysisEngine::new(transport, StaticProbe(true), settings);

        let started = tokio::time::Instant::now();
        assert_eq!(engine.analyze(&single()).await, Err(AnalysisError::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(35));
        assert!(started.elapsed() < Duration::from_secs(36));
        assert_eq!(engine.transport().attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_backoff_waits_between_attempts() {
        let transport = MockTransport::new()
            .fail(TransportError::Timeout)
            .fail(TransportError::Timeout)
            .respond(200, analysis_json("Chile"));
        let mut settings = settings();
        settings.retry = RetryPolicy {
            max_retries: 2,
            backoff: BackoffPolicy::Exponential {
                base: Duration::from_secs(1),
            },
        };
        let engine = AnalysisEngine::new(transport, StaticProbe(true), settings);

        let started = tokio::time::Instant::now();
        engine.analyze(&single()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(engine.transport().attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_counts_as_no_connectivity() {
        struct NeverAnswers;
        impl ConnectivityProbe for NeverAnswers {
            async fn is_connected(&self) -> bool {
                pending::<bool>().await
            }
        }

        let engine = AnalysisEngine::new(MockTransport::new(), NeverAnswers, settings());
        let started = tokio::time::Instant::now();
        assert_eq!(
            engine.analyze(&single()).await,
            Err(AnalysisError::NoConnectivity)
        );
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(engine.transport().attempts(), 0);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[tokio::test]
    async fn events_trace_a_retried_call() {
        let (tx, rx) = std::sync::mpsc::channel();
        let engine = engine(
            MockTransport::new()
                .fail(TransportError::Timeout)
                .respond(200, analysis_json("France")),
        )
        .with_events(tx);
        engine.analyze(&single()).await.unwrap();
        drop(engine);

        let events: Vec<EngineEvent> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                EngineEvent::ConnectivityChecked { connected: true },
                EngineEvent::AttemptStarted { attempt: 1, total: 2 },
                EngineEvent::AttemptFailed {
                    attempt: 1,
                    error: AnalysisError::Timeout,
                    retry_in: Some(Duration::ZERO),
                },
                EngineEvent::AttemptStarted { attempt: 2, total: 2 },
                EngineEvent::Completed {
                    attempts: 2,
                    identified: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn unknown_retry_is_announced() {
        let (tx, rx) = std::sync::mpsc::channel();
        let engine = engine(
            MockTransport::new()
                .respond(200, unknown_json("unknown"))
                .respond(200, unknown_json("unknown")),
        )
        .with_events(tx);
        engine.analyze(&single()).await.unwrap();
        drop(engine);

        let events: Vec<EngineEvent> = rx.iter().collect();
        assert!(events.contains(&EngineEvent::UnknownAnalysis {
            attempt: 1,
            retry_in: Duration::ZERO,
        }));
        assert_eq!(
            events.last(),
            Some(&EngineEvent::Completed {
                attempts: 2,
                identified: false,
            })
        );
    }

    // =========================================================================
    // Health and reachability
    // =========================================================================

    #[tokio::test]
    async fn health_ok_on_200() {
        let engine = engine(MockTransport::new().respond(200, "{\"status\":\"ok\"}"));
        assert_eq!(engine.check_health().await, Ok(()));
        let sent = engine.transport().requests();
        assert_eq!(sent[0].method, Method::Get);
        assert_eq!(sent[0].url, "https://backend.test/health");
    }

    #[tokio::test]
    async fn health_reports_bad_status() {
        let engine = engine(MockTransport::new().respond(502, ""));
        assert_eq!(
            engine.check_health().await,
            Err(AnalysisError::Server(
                "Backend health check failed with status: 502".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn health_requires_connectivity() {
        let engine = AnalysisEngine::new(MockTransport::new(), StaticProbe(false), settings());
        assert_eq!(
            engine.check_health().await,
            Err(AnalysisError::NoConnectivity)
        );
    }

    #[tokio::test]
    async fn reachability_accepts_404() {
        let engine = engine(MockTransport::new().respond(404, "Not Found"));
        let reachability = engine.test_connection().await.unwrap();
        assert!(reachability.is_reachable());
        assert_eq!(engine.transport().requests()[0].url, "https://backend.test/");
    }

    #[tokio::test]
    async fn reachability_rejects_server_errors() {
        let engine = engine(MockTransport::new().respond(500, ""));
        assert!(!engine.test_connection().await.unwrap().is_reachable());
    }

    #[tokio::test]
    async fn reachability_transport_failure_is_classified() {
        let engine = engine(MockTransport::new().fail(TransportError::NotConnected));
        assert_eq!(
            engine.test_connection().await,
            Err(AnalysisError::NoConnectivity)
        );
    }
}
