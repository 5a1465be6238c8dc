//! Seams between the executor and its collaborators.

use async_trait::async_trait;
use thiserror::Error;

/// Errors crossing the browser port.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser connection failed: {0}")]
    Connection(String),

    #[error("page capture failed: {0}")]
    Capture(String),

    #[error("browser action failed: {0}")]
    Action(String),
}

/// Browser operations the executor needs, behind a trait so a run can be
/// driven against a fake in tests and skipped entirely in dry-run mode.
///
/// Implementations own the reconnect discipline: on a recoverable failure,
/// re-resolve a fresh handle and retry exactly once.
#[async_trait]
pub trait BrowserPort: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Returns false when no element matched the selector.
    async fn fill(&self, selector: &str, value: &str) -> Result<bool, BrowserError>;

    /// Returns false when no element matched the selector.
    async fn click(&self, selector: &str) -> Result<bool, BrowserError>;

    async fn capture(&self) -> Result<String, BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Whether any element currently matches the selector.
    async fn exists(&self, selector: &str) -> Result<bool, BrowserError>;
}

/// Where a run reports progress and asks for missing inputs.
///
/// The CLI implements this on the terminal; tests use a recording sink.
pub trait OutputSink: Send {
    fn message(&mut self, text: &str);

    fn step_started(&mut self, index: usize, total: usize, label: &str);

    fn step_finished(&mut self, index: usize, success: bool, detail: Option<&str>);

    /// Ask the operator for a value for an unbound variable. `None` means the
    /// operator declined, which fails the step.
    fn prompt(&mut self, variable: &str) -> Option<String>;
}

/// Sink that swallows everything and declines every prompt. Useful for
/// non-interactive callers.
#[derive(Default)]
pub struct SilentSink;

impl OutputSink for SilentSink {
    fn message(&mut self, _text: &str) {}
    fn step_started(&mut self, _index: usize, _total: usize, _label: &str) {}
    fn step_finished(&mut self, _index: usize, _success: bool, _detail: Option<&str>) {}
    fn prompt(&mut self, _variable: &str) -> Option<String> {
        None
    }
}
