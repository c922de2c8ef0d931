//! Retry budget and backoff.
//!
//! [`RetryState`] is the pure half of the engine's attempt loop: it is fed
//! the outcome of each attempt and answers "stop with this" or "try again
//! after this long". Keeping it free of I/O and clocks lets every branch be
//! tested without a runtime.
//!
//! Retried: transient transport failures and unknown-analysis responses.
//! Surfaced at once: server-reported errors, malformed bodies, missing
//! connectivity, bad requests.
//!
//! An unknown-analysis response is a complete answer; retrying it only
//! tries for a better one. When the budget runs out on it, or when any
//! later attempt fails for good, transient or not, the retained response
//! is returned as a normal result.

use crate::error::AnalysisError;
use crate::model::AnalysisResponse;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Retry at once.
    Immediate,
    /// Wait `base * 2^retry` before retry number `retry` (0-based).
    Exponential { base: Duration },
}

impl BackoffPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Immediate => Duration::ZERO,
            BackoffPolicy::Exponential { base } => base.saturating_mul(1u32 << attempt.min(16)),
        }
    }
}

/// Config-file spelling of the backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Immediate,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: BackoffPolicy::Immediate,
        }
    }
}

/// What the attempt loop should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Done(Result<AnalysisResponse, AnalysisError>),
    RetryAfter(Duration),
}

/// Bookkeeping for one analyze call.
#[derive(Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
    unknown: Option<AnalysisResponse>,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            unknown: None,
        }
    }

    /// Attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 1-based number of the attempt about to start.
    pub fn next_attempt(&self) -> u32 {
        self.attempts + 1
    }

    pub fn total_attempts(&self) -> u32 {
        self.policy.total_attempts()
    }

    /// The latest unknown-analysis response seen, if any.
    pub fn retained_unknown(&self) -> Option<&AnalysisResponse> {
        self.unknown.as_ref()
    }

    /// Record the outcome of the attempt that just finished.
    pub fn record(&mut self, outcome: Result<AnalysisResponse, AnalysisError>) -> Step {
        let attempt = self.attempts;
        self.attempts += 1;
        let budget_left = self.attempts < self.policy.total_attempts();

        match outcome {
            Ok(response) if !response.analysis.is_unknown_analysis() => Step::Done(Ok(response)),
            Ok(response) if budget_left => {
                self.unknown = Some(response);
                Step::RetryAfter(self.policy.backoff.delay(attempt))
            }
            Ok(response) => Step::Done(Ok(response)),
            Err(err) if err.is_transient() && budget_left => {
                Step::RetryAfter(self.policy.backoff.delay(attempt))
            }
            Err(err) => match self.unknown.take() {
                Some(response) => Step::Done(Ok(response)),
                None => Step::Done(Err(err)),
            },
        }
    }
}
