// ABOUTME: Rollout pacing and deploy command configuration.
// ABOUTME: Batch delay, auto-rollback toggle, and the shell command templates.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RolloutConfig {
    #[serde(default = "default_batch_delay", with = "humantime_serde")]
    pub batch_delay: Duration,

    #[serde(default = "default_auto_rollback")]
    pub auto_rollback: bool,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            batch_delay: default_batch_delay(),
            auto_rollback: default_auto_rollback(),
        }
    }
}

fn default_batch_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_auto_rollback() -> bool {
    true
}

/// Shell commands that deploy or revert one target.
///
/// Both templates accept `{target}`, `{version}` and `{deployment}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployConfig {
    pub command: String,

    #[serde(default)]
    pub revert_command: Option<String>,

    #[serde(default = "default_deploy_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_deploy_timeout() -> Duration {
    Duration::from_secs(300)
}
