// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{Batch, BatchResult, RolloutReport, RolloutStatus};
use crate::types::Version;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration_secs(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a warning (suppressed in quiet mode).
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => emit_json(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration_secs(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a batch plan without executing it.
    pub fn plan(&self, version: &Version, batches: &[Batch]) {
        match self.mode {
            OutputMode::Normal => {
                println!("Plan for {version}: {} batch(es)", batches.len());
                for batch in batches {
                    let ids: Vec<String> = batch.ids().into_iter().map(|id| id.into_inner()).collect();
                    println!("  batch {}: {}", batch.index() + 1, ids.join(", "));
                }
            }
            OutputMode::Quiet => {
                for batch in batches {
                    let ids: Vec<String> = batch.ids().into_iter().map(|id| id.into_inner()).collect();
                    println!("{}", ids.join(" "));
                }
            }
            OutputMode::Json => emit_json(&PlanEvent {
                event: "plan",
                version,
                batches: batches.iter().map(Batch::ids).collect(),
            }),
        }
    }

    /// Print the final rollout report.
    pub fn report(&self, report: &RolloutReport) {
        for warning in &report.warnings {
            self.warning(warning);
        }

        match self.mode {
            OutputMode::Normal => {
                for batch in &report.batches {
                    let result = match batch.result {
                        BatchResult::Succeeded => "healthy",
                        BatchResult::Failed => "FAILED",
                    };
                    println!("  batch {}: {result}", batch.index + 1);
                    for failure in &batch.failures {
                        println!("    ✗ {}: {}", failure.target, failure.reason);
                    }
                }
                if !report.reverted.is_empty() {
                    let ids: Vec<&str> = report.reverted.iter().map(|id| id.as_str()).collect();
                    println!("  reverted: {}", ids.join(", "));
                }
                for manual in &report.manual_intervention {
                    eprintln!("  ! {} needs manual intervention: {}", manual.target, manual.reason);
                }
                println!("{}", summary(report));
            }
            OutputMode::Quiet => println!("{}", summary(report)),
            OutputMode::Json => emit_json(&ReportEvent {
                event: "report",
                report,
                duration_secs: self.duration_secs(),
            }),
        }
    }
}

fn summary(report: &RolloutReport) -> String {
    match report.status {
        RolloutStatus::Succeeded => format!(
            "Rolled out {} to {} target(s)",
            report.version,
            report.committed.len()
        ),
        RolloutStatus::FailedRolledBack => format!(
            "Rollout of {} failed; {} target(s) rolled back",
            report.version,
            report.reverted.len()
        ),
        RolloutStatus::FailedManual => format!(
            "Rollout of {} failed; {} target(s) need manual intervention",
            report.version,
            report.manual_intervention.len()
        ),
        RolloutStatus::InProgress => format!("Rollout of {} still in progress", report.version),
    }
}

fn emit_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct PlanEvent<'a> {
    event: &'a str,
    version: &'a Version,
    batches: Vec<Vec<crate::types::TargetId>>,
}

#[derive(Serialize)]
struct ReportEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    report: &'a RolloutReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
