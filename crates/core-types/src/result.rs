//! Terminal result of one flow run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable outcome of a single executor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether every step completed with its expectation met
    pub success: bool,

    /// Steps fully completed before the run ended. Equals `steps_total` on
    /// success; equals k-1 when 1-indexed step k failed.
    pub steps_run: usize,

    /// Total steps in the flow as executed
    pub steps_total: usize,

    /// Wall-clock run duration
    pub duration: Duration,

    /// Failure message, present iff `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Artifact produced by the run (e.g. an emitted test file), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn succeeded(steps_total: usize, duration: Duration) -> Self {
        Self {
            success: true,
            steps_run: steps_total,
            steps_total,
            duration,
            error: None,
            artifact: None,
        }
    }

    pub fn failed(
        steps_run: usize,
        steps_total: usize,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            steps_run,
            steps_total,
            duration,
            error: Some(error.into()),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, path: PathBuf) -> Self {
        self.artifact = Some(path);
        self
    }
}
