// ABOUTME: Diagnostics accumulator for non-fatal warnings during a rollout.
// ABOUTME: Collects warnings that shouldn't fail a rollout but should be shown to users.

/// Collects non-fatal warnings during rollout operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Consume the accumulator, keeping only the messages.
    pub fn into_messages(self) -> Vec<String> {
        self.warnings.into_iter().map(|w| w.message).collect()
    }
}

/// A non-fatal warning collected during a rollout.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    /// Create an audit log write warning.
    pub fn audit_write(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::AuditWrite,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to release the rollout lock (lock file may remain).
    LockRelease,
    /// Failed to append to the audit log.
    AuditWrite,
}
