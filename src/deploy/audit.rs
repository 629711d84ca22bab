// ABOUTME: Append-only JSON-lines audit log of rollout milestones.
// ABOUTME: One line per event; write failures are reported to the caller, not fatal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{BatchResult, RolloutStatus};
use crate::types::{DeploymentName, RolloutId, TargetId, Version};

/// Rollout milestone written to the audit log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    RolloutStarted {
        version: Version,
        batch_size: usize,
        batches: usize,
        targets: Vec<TargetId>,
    },
    BatchCompleted {
        batch: usize,
        result: BatchResult,
        targets: Vec<TargetId>,
    },
    RollbackCompleted {
        reverted: Vec<TargetId>,
        manual_intervention: Vec<TargetId>,
    },
    RolloutFinished {
        status: RolloutStatus,
    },
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: DateTime<Utc>,
    rollout_id: &'a RolloutId,
    deployment: &'a DeploymentName,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a JSON line, creating the file if needed.
    pub async fn record(
        &self,
        rollout_id: &RolloutId,
        deployment: &DeploymentName,
        event: &AuditEvent,
    ) -> std::io::Result<()> {
        let record = AuditRecord {
            timestamp: Utc::now(),
            rollout_id,
            deployment,
            event,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}
