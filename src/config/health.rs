// ABOUTME: Health probe configuration for forward rollouts and rollbacks.
// ABOUTME: Defines endpoint template and retry parameters with sensible defaults.

use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::health::ProbePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthConfig {
    /// Endpoint template; `{target}` is replaced by the target id.
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_attempts")]
    pub attempts: NonZeroU32,

    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: default_timeout(),
            attempts: default_attempts(),
            backoff: default_backoff(),
        }
    }
}

impl HealthConfig {
    pub fn policy(&self) -> ProbePolicy {
        ProbePolicy::new(self.timeout, self.attempts, self.backoff)
    }
}

/// Probe settings used after a revert. Unset fields fall back to `health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RollbackHealthConfig {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub attempts: Option<NonZeroU32>,

    #[serde(default, with = "humantime_serde")]
    pub backoff: Option<Duration>,
}

impl RollbackHealthConfig {
    pub fn policy(&self, forward: &HealthConfig) -> ProbePolicy {
        ProbePolicy::new(
            self.timeout.unwrap_or(forward.timeout),
            self.attempts.unwrap_or(forward.attempts),
            self.backoff.unwrap_or(forward.backoff),
        )
    }
}

fn default_url() -> String {
    "http://{target}/health".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_attempts() -> NonZeroU32 {
    NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN)
}

fn default_backoff() -> Duration {
    Duration::from_secs(2)
}
