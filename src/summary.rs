//! End-of-run summary reporting.
//!
//! One record per process run, aggregated across all compile orders.
//! Rendered as human-readable lines by default, or as JSON with `--json`
//! for scripting around the runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{Action, PackageError};

/// Aggregated run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// The failure that ended the run, when there was one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// Package (or order file) the failure belongs to
    pub package: String,

    /// Stable failure kind label
    pub kind: String,

    /// Full diagnostic
    pub message: String,
}

/// Summary of one runner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Action the run was invoked with
    pub action: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub finished_at: DateTime<Utc>,

    /// Aggregated status
    pub status: RunStatus,

    /// Process exit code the run will terminate with
    pub exit_code: i32,

    /// Compile orders fully processed
    pub orders_completed: usize,

    /// Packages whose action ran to completion
    pub packages_completed: usize,

    /// Packages skipped as already installed
    pub packages_skipped: usize,

    /// The terminating failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

impl RunSummary {
    /// Start tallying a run for `action`.
    pub fn start(action: Action) -> Self {
        let now = Utc::now();
        Self {
            action: action.to_string(),
            started_at: now,
            finished_at: now,
            status: RunStatus::Success,
            exit_code: 0,
            orders_completed: 0,
            packages_completed: 0,
            packages_skipped: 0,
            failure: None,
        }
    }

    /// Record a successfully completed compile order.
    pub fn record_order(&mut self, completed: usize, skipped: usize) {
        self.orders_completed += 1;
        self.packages_completed += completed;
        self.packages_skipped += skipped;
    }

    /// Close the run as a success.
    pub fn finish_ok(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Close the run with the failure that short-circuited it.
    pub fn finish_failed(&mut self, error: &PackageError) {
        self.finished_at = Utc::now();
        self.status = RunStatus::Failed;
        self.exit_code = error.exit_code();
        self.failure = Some(FailureReport {
            package: error.package().to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    /// Human console epilogue.
    pub fn render_human(&self) -> String {
        let duration = self
            .finished_at
            .signed_duration_since(self.started_at)
            .num_seconds();
        let mut out = format!(
            "{}: {} order(s), {} package(s) done, {} skipped in {}s",
            self.action,
            self.orders_completed,
            self.packages_completed,
            self.packages_skipped,
            duration
        );
        match &self.failure {
            Some(failure) => {
                out.push_str(&format!("\nFAILED ({}): {}", failure.kind, failure.message));
            }
            None => out.push_str("\nOK"),
        }
        out
    }
}
