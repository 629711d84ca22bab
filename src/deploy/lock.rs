// ABOUTME: Rollout lock to prevent two processes from rolling out the same deployment.
// ABOUTME: Uses atomic create-new of <state_dir>/<deployment>.lock holding the holder's info.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::types::DeploymentName;

use super::LockError;

/// Information about who holds a rollout lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Deployment being rolled out.
    pub deployment: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(deployment: &DeploymentName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            deployment: deployment.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a deployment.
    pub fn lock_path(state_dir: &Path, deployment: &DeploymentName) -> PathBuf {
        state_dir.join(format!("{}.lock", deployment))
    }
}

/// A held rollout lock. Call [`RolloutLock::release`] when done.
#[derive(Debug)]
pub struct RolloutLock {
    path: PathBuf,
}

impl RolloutLock {
    /// Acquire the rollout lock for `deployment`.
    ///
    /// Creation is atomic (create-new), so two processes cannot both win.
    /// Stale locks (>1 hour, judged by file mtime when the info is
    /// unreadable) are broken with a warning; `force` breaks any lock.
    pub async fn acquire(
        state_dir: &Path,
        deployment: &DeploymentName,
        force: bool,
    ) -> Result<Self, LockError> {
        tokio::fs::create_dir_all(state_dir)
            .await
            .map_err(|e| LockError::io(state_dir, e))?;

        let path = LockInfo::lock_path(state_dir, deployment);
        let info = LockInfo::new(deployment);
        let contents = serde_json::to_vec(&info)?;

        if Self::try_create(&path, &contents).await? {
            return Ok(Self { path });
        }

        let existing = Self::read_existing(&path).await;
        let stale_file = existing.is_none() && !force && Self::file_is_stale(&path).await;

        match existing {
            Some(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
            }
            Some(existing) if existing.is_stale() => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
            }
            Some(existing) => {
                return Err(LockError::Held {
                    deployment: existing.deployment,
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            // An empty or partial file may belong to a holder still writing it.
            None if force => {
                tracing::warn!("Breaking unreadable lock at {}", path.display());
            }
            None if stale_file => {
                tracing::warn!("Auto-breaking stale unreadable lock at {}", path.display());
            }
            None => return Err(LockError::Unreadable(path)),
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(LockError::io(&path, e)),
        }

        if Self::try_create(&path, &contents).await? {
            Ok(Self { path })
        } else {
            Err(LockError::Contended(deployment.to_string()))
        }
    }

    /// Returns false if the file already exists.
    async fn try_create(path: &Path, contents: &[u8]) -> Result<bool, LockError> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await;

        match file {
            Ok(mut file) => {
                file.write_all(contents)
                    .await
                    .map_err(|e| LockError::io(path, e))?;
                file.flush().await.map_err(|e| LockError::io(path, e))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LockError::io(path, e)),
        }
    }

    /// Age check by modification time, for lock files without readable info.
    async fn file_is_stale(path: &Path) -> bool {
        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => {
                let age = Utc::now() - DateTime::<Utc>::from(modified);
                age.num_hours() >= 1
            }
            // Removed by its holder in the meantime.
            Err(e) => e.kind() == ErrorKind::NotFound,
        }
    }

    async fn read_existing(path: &Path) -> Option<LockInfo> {
        let raw = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), LockError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(&self.path, e)),
        }
    }
}
