// ABOUTME: Deployment executor capability and its shell-command implementation.
// ABOUTME: Deploy and revert are side effects only; health validation happens elsewhere.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::{DeployError, DeployErrorKind};
use crate::config::DeployConfig;
use crate::inventory::Target;
use crate::types::{DeploymentName, TargetId, Version};

/// Issues the "run this version" side effect against one target.
///
/// Implementations must not probe health: the coordinator validates every
/// deploy separately. Reverting a target to the version it already runs must
/// be a no-op so that rollback stays idempotent.
#[async_trait]
pub trait DeploymentExecutor: Send + Sync {
    /// Replace whatever runs on `target` with `version`.
    async fn deploy(&self, target: &Target, version: &Version) -> Result<(), DeployError>;

    /// Put `to_version` back on `target`.
    async fn revert(&self, target: &Target, to_version: &Version) -> Result<(), DeployError>;
}

#[async_trait]
impl<E: DeploymentExecutor + ?Sized> DeploymentExecutor for Arc<E> {
    async fn deploy(&self, target: &Target, version: &Version) -> Result<(), DeployError> {
        (**self).deploy(target, version).await
    }

    async fn revert(&self, target: &Target, to_version: &Version) -> Result<(), DeployError> {
        (**self).revert(target, to_version).await
    }
}

/// Runs a configured shell command per target.
///
/// Templates may use `{target}`, `{version}` and `{deployment}`; for example
/// `kubectl set image deployment/{target} app=registry.local/app:{version}`.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    deployment: DeploymentName,
    deploy_template: String,
    revert_template: String,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(deployment: DeploymentName, config: &DeployConfig) -> Self {
        Self {
            deployment,
            deploy_template: config.command.clone(),
            revert_template: config
                .revert_command
                .clone()
                .unwrap_or_else(|| config.command.clone()),
            timeout: config.timeout,
        }
    }

    /// Expand a command template for one target.
    pub fn render(&self, template: &str, target: &Target, version: &Version) -> String {
        template
            .replace("{target}", target.id.as_str())
            .replace("{version}", version.as_str())
            .replace("{deployment}", self.deployment.as_str())
    }

    async fn run(&self, target: &Target, command: String) -> Result<(), DeployError> {
        // Ids are interpolated unquoted.
        if let Err(e) = TargetId::parse(target.id.as_str()) {
            return Err(DeployError::new(
                target.id.clone(),
                DeployErrorKind::Spawn,
                format!("refusing to run deploy command: {e}"),
            ));
        }

        tracing::debug!(target_id = %target.id, %command, "running deploy command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .env("TRANCHE_TARGET", target.id.as_str())
            .env("TRANCHE_DEPLOYMENT", self.deployment.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::new(target.id.clone(), DeployErrorKind::Spawn, e.to_string()))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DeployError::new(
                    target.id.clone(),
                    DeployErrorKind::Spawn,
                    e.to_string(),
                ));
            }
            Err(_elapsed) => {
                return Err(DeployError::new(
                    target.id.clone(),
                    DeployErrorKind::Timeout,
                    format!("command did not finish within {:?}", self.timeout),
                ));
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match (output.status.code(), stderr.trim()) {
            (Some(code), "") => format!("command exited with code {code}"),
            (Some(code), msg) => format!("command exited with code {code}: {msg}"),
            (None, _) => "command terminated by signal".to_string(),
        };
        Err(DeployError::failed(target.id.clone(), reason))
    }
}

#[async_trait]
impl DeploymentExecutor for CommandExecutor {
    async fn deploy(&self, target: &Target, version: &Version) -> Result<(), DeployError> {
        let command = self.render(&self.deploy_template, target, version);
        self.run(target, command).await
    }

    async fn revert(&self, target: &Target, to_version: &Version) -> Result<(), DeployError> {
        let command = self.render(&self.revert_template, target, to_version);
        self.run(target, command).await
    }
}
