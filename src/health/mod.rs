// ABOUTME: Bounded-retry health probing for deployment targets.
// ABOUTME: A failed probe is a HealthResult value, never an error.

mod http;

pub use http::{HttpHealthCheck, validate_endpoint};

use async_trait::async_trait;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::inventory::Target;

/// How hard to try before declaring a target unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Number of attempts before giving up.
    pub max_attempts: NonZeroU32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl ProbePolicy {
    pub fn new(timeout: Duration, max_attempts: NonZeroU32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_attempts,
            backoff,
        }
    }
}

/// Why a single health attempt did not pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid health endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unhealthy status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one probe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Pass,
    Fail,
}

/// Result of probing one target, including how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthResult {
    pub outcome: HealthOutcome,
    pub attempts: u32,
    pub last_error: Option<ProbeError>,
}

impl HealthResult {
    fn pass(attempts: u32) -> Self {
        Self {
            outcome: HealthOutcome::Pass,
            attempts,
            last_error: None,
        }
    }

    fn fail(attempts: u32, last_error: Option<ProbeError>) -> Self {
        Self {
            outcome: HealthOutcome::Fail,
            attempts,
            last_error,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == HealthOutcome::Pass
    }

    /// Human-readable failure description.
    pub fn describe(&self) -> String {
        match (&self.outcome, &self.last_error) {
            (HealthOutcome::Pass, _) => format!("healthy after {} attempt(s)", self.attempts),
            (HealthOutcome::Fail, Some(e)) => {
                format!("unhealthy after {} attempt(s): {}", self.attempts, e)
            }
            (HealthOutcome::Fail, None) => format!("unhealthy after {} attempt(s)", self.attempts),
        }
    }
}

/// A single health attempt against a target.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, target: &Target) -> Result<(), ProbeError>;
}

#[async_trait]
impl<C: HealthCheck + ?Sized> HealthCheck for Arc<C> {
    async fn check(&self, target: &Target) -> Result<(), ProbeError> {
        (**self).check(target).await
    }
}

/// Runs a [`HealthCheck`] under a [`ProbePolicy`].
#[derive(Debug, Clone)]
pub struct HealthProber<C> {
    check: C,
}

impl<C: HealthCheck> HealthProber<C> {
    pub fn new(check: C) -> Self {
        Self { check }
    }

    /// Probe a target, retrying up to `policy.max_attempts` times.
    ///
    /// Each attempt is bounded by `policy.timeout`. The backoff is slept between
    /// attempts only, so an always-failing target costs exactly `max_attempts`
    /// checks and `max_attempts - 1` pauses.
    pub async fn probe(&self, target: &Target, policy: &ProbePolicy) -> HealthResult {
        let max_attempts = policy.max_attempts.get();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(policy.timeout, self.check.check(target)).await {
                Ok(Ok(())) => {
                    tracing::debug!(target_id = %target.id, attempt, "health check passed");
                    return HealthResult::pass(attempt);
                }
                Ok(Err(e)) => {
                    tracing::debug!(target_id = %target.id, attempt, error = %e, "health check failed");
                    last_error = Some(e);
                }
                Err(_elapsed) => {
                    tracing::debug!(target_id = %target.id, attempt, "health check timed out");
                    last_error = Some(ProbeError::Timeout(policy.timeout));
                }
            }

            if attempt < max_attempts && !policy.backoff.is_zero() {
                tokio::time::sleep(policy.backoff).await;
            }
        }

        tracing::warn!(
            target_id = %target.id,
            attempts = max_attempts,
            "target unhealthy after exhausting attempts"
        );
        HealthResult::fail(max_attempts, last_error)
    }
}
