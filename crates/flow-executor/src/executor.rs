//! The per-run state machine.

use questline_core_types::{
    AssertKind, ExecutionContext, ExecutionResult, Expectation, Flow, Step, StepAction, StepInput,
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::ExecutorError;
use crate::ports::{BrowserError, BrowserPort, OutputSink};

/// Run lifecycle. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Drives one flow + context against a browser port, step by step.
///
/// Single-use: a second `execute` on the same instance is an error, keeping
/// terminal states terminal.
pub struct FlowExecutor {
    state: RunState,
}

impl FlowExecutor {
    pub fn new() -> Self {
        Self {
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute the flow. Steps run strictly in order; the first failing step
    /// ends the run with its index and message recorded. There is no
    /// business-logic step retry - only the browser port's connection
    /// retry-once discipline applies underneath.
    pub async fn execute(
        &mut self,
        flow: &Flow,
        ctx: &ExecutionContext,
        browser: &dyn BrowserPort,
        sink: &mut dyn OutputSink,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.transition_to_running(flow)?;

        let total = flow.steps.len();
        let started = Instant::now();
        // Last good capture, the fallback when a fresh capture fails mid-run.
        let mut cached_capture: Option<String> = None;

        info!(target: "flow-executor", flow = %flow.id, steps = total, "run started");

        for (index, step) in flow.steps.iter().enumerate() {
            sink.step_started(index + 1, total, &step.describe());

            match self
                .run_step(step, ctx, browser, sink, &mut cached_capture)
                .await
            {
                Ok(()) => {
                    sink.step_finished(index + 1, true, None);
                }
                Err(message) => {
                    sink.step_finished(index + 1, false, Some(&message));
                    self.state = RunState::Failed;
                    let error = format!("step {} ({}): {}", index + 1, step.id, message);
                    warn!(target: "flow-executor", flow = %flow.id, %error, "run failed");
                    return Ok(ExecutionResult::failed(
                        index,
                        total,
                        started.elapsed(),
                        error,
                    ));
                }
            }
        }

        self.state = RunState::Succeeded;
        info!(target: "flow-executor", flow = %flow.id, "run succeeded");
        Ok(ExecutionResult::succeeded(total, started.elapsed()))
    }

    /// Dry run: resolve and display the plan without touching the browser.
    pub fn plan(
        &self,
        flow: &Flow,
        ctx: &ExecutionContext,
        sink: &mut dyn OutputSink,
    ) -> Result<(), ExecutorError> {
        if flow.steps.is_empty() {
            return Err(ExecutorError::EmptyFlow {
                id: flow.id.clone(),
            });
        }

        sink.message(&format!(
            "{} ({} steps, against {})",
            flow.name,
            flow.steps.len(),
            ctx.base_url
        ));
        for (index, step) in flow.steps.iter().enumerate() {
            let mut line = format!("{}. {}", index + 1, step.describe());
            if let StepAction::Fill { value, .. } = &step.action {
                if let Some(resolved) = resolve_input_readonly(value, ctx) {
                    line.push_str(&format!(" [{resolved}]"));
                } else {
                    line.push_str(" [unbound - will prompt]");
                }
            }
            if let Some(expect) = step.expect.describe() {
                line.push_str(&format!(" => expect {expect}"));
            }
            sink.message(&line);
        }
        Ok(())
    }

    fn transition_to_running(&mut self, flow: &Flow) -> Result<(), ExecutorError> {
        match self.state {
            RunState::Pending => {
                if flow.steps.is_empty() {
                    return Err(ExecutorError::EmptyFlow {
                        id: flow.id.clone(),
                    });
                }
                self.state = RunState::Running;
                Ok(())
            }
            _ => Err(ExecutorError::AlreadyRan {
                id: flow.id.clone(),
            }),
        }
    }

    async fn run_step(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
        browser: &dyn BrowserPort,
        sink: &mut dyn OutputSink,
        cached_capture: &mut Option<String>,
    ) -> Result<(), String> {
        match &step.action {
            StepAction::Navigate { url } => {
                let url = ctx.resolve_url(url);
                browser
                    .navigate(&url)
                    .await
                    .map_err(|err| err.to_string())?;
            }
            StepAction::Fill { selector, value } => {
                let value = resolve_input(value, ctx, sink)
                    .ok_or_else(|| format!("no value for input {}", value.describe()))?;
                let matched = browser
                    .fill(selector, &value)
                    .await
                    .map_err(|err| err.to_string())?;
                if !matched {
                    return Err(format!("no element matches {selector}"));
                }
            }
            StepAction::Click { selector } => {
                let matched = browser
                    .click(selector)
                    .await
                    .map_err(|err| err.to_string())?;
                if !matched {
                    return Err(format!("no element matches {selector}"));
                }
            }
            StepAction::Assert { condition } => {
                let ok = self
                    .check_assertion(condition, browser, cached_capture)
                    .await?;
                if !ok {
                    return Err(format!("assertion failed: {condition}"));
                }
            }
        }

        self.check_expectation(&step.expect, browser, cached_capture)
            .await
    }

    async fn check_expectation(
        &self,
        expect: &Expectation,
        browser: &dyn BrowserPort,
        cached_capture: &mut Option<String>,
    ) -> Result<(), String> {
        let condition = match expect {
            Expectation::None => return Ok(()),
            Expectation::UrlContains { fragment } => AssertKind::UrlContains {
                fragment: fragment.clone(),
            },
            Expectation::TextVisible { text } => AssertKind::TextVisible { text: text.clone() },
            Expectation::ElementPresent { selector } => AssertKind::ElementPresent {
                selector: selector.clone(),
            },
        };

        if self
            .check_assertion(&condition, browser, cached_capture)
            .await?
        {
            Ok(())
        } else {
            Err(format!("expectation unmet: {condition}"))
        }
    }

    async fn check_assertion(
        &self,
        condition: &AssertKind,
        browser: &dyn BrowserPort,
        cached_capture: &mut Option<String>,
    ) -> Result<bool, String> {
        match condition {
            AssertKind::UrlContains { fragment } => {
                let url = browser.current_url().await.map_err(|e| e.to_string())?;
                Ok(url.contains(fragment))
            }
            AssertKind::ElementPresent { selector } => {
                browser.exists(selector).await.map_err(|e| e.to_string())
            }
            AssertKind::TextVisible { text } => {
                let reduced = self.reduced_capture(browser, cached_capture).await?;
                Ok(reduced.contains(text.as_str()))
            }
        }
    }

    /// Capture and reduce the current page, falling back to the cached prior
    /// capture when every capture strategy fails.
    async fn reduced_capture(
        &self,
        browser: &dyn BrowserPort,
        cached_capture: &mut Option<String>,
    ) -> Result<String, String> {
        match browser.capture().await {
            Ok(raw) => {
                let reduced = html_reducer::simplify(&raw);
                *cached_capture = Some(reduced.clone());
                Ok(reduced)
            }
            Err(BrowserError::Capture(reason)) => match cached_capture {
                Some(prior) => {
                    debug!(target: "flow-executor", %reason, "capture failed, using cached capture");
                    Ok(prior.clone())
                }
                None => Err(format!("capture failed with no cached fallback: {reason}")),
            },
            Err(err) => Err(err.to_string()),
        }
    }
}

impl Default for FlowExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_input(
    input: &StepInput,
    ctx: &ExecutionContext,
    sink: &mut dyn OutputSink,
) -> Option<String> {
    match input {
        StepInput::Literal { value } => Some(value.clone()),
        StepInput::Variable { name, default } => ctx
            .variables
            .get(name)
            .cloned()
            .or_else(|| default.clone())
            .or_else(|| sink.prompt(name)),
    }
}

/// Resolution for dry runs: never prompts.
fn resolve_input_readonly(input: &StepInput, ctx: &ExecutionContext) -> Option<String> {
    match input {
        StepInput::Literal { value } => Some(value.clone()),
        StepInput::Variable { name, default } => {
            ctx.variables.get(name).cloned().or_else(|| default.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use questline_core_types::FlowCategory;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scriptable fake browser that records every call.
    #[derive(Default)]
    struct FakeBrowser {
        calls: Arc<Mutex<Vec<String>>>,
        page: Mutex<String>,
        url: Mutex<String>,
        fail_selector: Option<String>,
        /// Captures beyond this count fail with a capture error.
        capture_budget: Option<usize>,
        captures_taken: Mutex<usize>,
    }

    impl FakeBrowser {
        fn with_page(page: &str) -> Self {
            Self {
                page: Mutex::new(page.to_string()),
                ..Default::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl BrowserPort for FakeBrowser {
        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            self.calls.lock().push(format!("navigate {url}"));
            *self.url.lock() = url.to_string();
            Ok(())
        }

        async fn fill(&self, selector: &str, value: &str) -> Result<bool, BrowserError> {
            self.calls.lock().push(format!("fill {selector}={value}"));
            Ok(self.fail_selector.as_deref() != Some(selector))
        }

        async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
            self.calls.lock().push(format!("click {selector}"));
            Ok(self.fail_selector.as_deref() != Some(selector))
        }

        async fn capture(&self) -> Result<String, BrowserError> {
            self.calls.lock().push("capture".to_string());
            let mut taken = self.captures_taken.lock();
            *taken += 1;
            if self.capture_budget.is_some_and(|budget| *taken > budget) {
                Err(BrowserError::Capture("all strategies failed".to_string()))
            } else {
                Ok(self.page.lock().clone())
            }
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            Ok(self.url.lock().clone())
        }

        async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
            Ok(self.fail_selector.as_deref() != Some(selector))
        }
    }

    /// Sink that records output and answers prompts from a map.
    #[derive(Default)]
    struct RecordingSink {
        lines: Vec<String>,
        answers: HashMap<String, String>,
    }

    impl OutputSink for RecordingSink {
        fn message(&mut self, text: &str) {
            self.lines.push(text.to_string());
        }
        fn step_started(&mut self, index: usize, total: usize, label: &str) {
            self.lines.push(format!("[{index}/{total}] {label}"));
        }
        fn step_finished(&mut self, _index: usize, _success: bool, _detail: Option<&str>) {}
        fn prompt(&mut self, variable: &str) -> Option<String> {
            self.answers.get(variable).cloned()
        }
    }

    fn login_flow() -> Flow {
        Flow::new("login", "Login", FlowCategory::Auth)
            .with_step(Step::new(
                "nav",
                StepAction::Navigate {
                    url: "/login".to_string(),
                },
            ))
            .with_step(Step::new(
                "email",
                StepAction::Fill {
                    selector: "#email".to_string(),
                    value: StepInput::variable("email", Some("dev@example.com".to_string())),
                },
            ))
            .with_step(
                Step::new(
                    "submit",
                    StepAction::Click {
                        selector: "[data-testid=\"login-submit\"]".to_string(),
                    },
                )
                .with_expect(Expectation::TextVisible {
                    text: "Welcome".to_string(),
                }),
            )
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("http://localhost:3000")
    }

    #[tokio::test]
    async fn successful_run_completes_all_steps() {
        let browser = FakeBrowser::with_page("<body><h1>Welcome back</h1></body>");
        let mut sink = RecordingSink::default();
        let mut executor = FlowExecutor::new();

        let result = executor
            .execute(&login_flow(), &ctx(), &browser, &mut sink)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.steps_run, 3);
        assert_eq!(result.steps_total, 3);
        assert!(result.error.is_none());
        assert_eq!(executor.state(), RunState::Succeeded);
    }

    #[tokio::test]
    async fn failure_at_step_k_reports_k_minus_one_run() {
        let mut browser = FakeBrowser::with_page("<body>Welcome</body>");
        browser.fail_selector = Some("#email".to_string());
        let mut sink = RecordingSink::default();
        let mut executor = FlowExecutor::new();

        let result = executor
            .execute(&login_flow(), &ctx(), &browser, &mut sink)
            .await
            .unwrap();

        // 1-indexed step 2 failed, so exactly 1 step completed.
        assert!(!result.success);
        assert_eq!(result.steps_run, 1);
        assert_eq!(result.steps_total, 3);
        assert!(result.error.as_deref().unwrap().contains("step 2"));
        assert_eq!(executor.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn unmet_expectation_fails_the_step() {
        let browser = FakeBrowser::with_page("<body>Wrong password</body>");
        let mut sink = RecordingSink::default();
        let mut executor = FlowExecutor::new();

        let result = executor
            .execute(&login_flow(), &ctx(), &browser, &mut sink)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.steps_run, 2);
        assert!(result.error.as_deref().unwrap().contains("expectation"));
    }

    #[tokio::test]
    async fn variables_override_discovered_defaults() {
        let browser = FakeBrowser::with_page("<body>Welcome</body>");
        let mut sink = RecordingSink::default();
        let context = ctx().with_variable("email", "op@example.com");

        FlowExecutor::new()
            .execute(&login_flow(), &context, &browser, &mut sink)
            .await
            .unwrap();

        let calls = browser.calls.lock();
        assert!(calls.iter().any(|c| c == "fill #email=op@example.com"));
    }

    #[tokio::test]
    async fn unbound_variable_prompts_then_fails_when_declined() {
        let flow = Flow::new("f", "F", FlowCategory::Form).with_step(Step::new(
            "fill",
            StepAction::Fill {
                selector: "#otp".to_string(),
                value: StepInput::variable("otp", None),
            },
        ));
        let browser = FakeBrowser::default();
        let mut sink = RecordingSink::default();

        let result = FlowExecutor::new()
            .execute(&flow, &ctx(), &browser, &mut sink)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.steps_run, 0);

        // With an answer available the same flow passes.
        let mut sink = RecordingSink {
            answers: HashMap::from([("otp".to_string(), "123456".to_string())]),
            ..Default::default()
        };
        let browser = FakeBrowser::default();
        let result = FlowExecutor::new()
            .execute(&flow, &ctx(), &browser, &mut sink)
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn capture_failure_falls_back_to_cached_capture() {
        let flow = Flow::new("f", "F", FlowCategory::Other)
            .with_step(
                Step::new(
                    "a",
                    StepAction::Navigate {
                        url: "/".to_string(),
                    },
                )
                .with_expect(Expectation::TextVisible {
                    text: "Welcome".to_string(),
                }),
            )
            .with_step(
                Step::new(
                    "b",
                    StepAction::Click {
                        selector: "button".to_string(),
                    },
                )
                .with_expect(Expectation::TextVisible {
                    text: "Welcome".to_string(),
                }),
            );

        // First expectation captures fine and caches; then captures start
        // failing and the cached reduction carries the second check.
        let mut browser = FakeBrowser::with_page("<body>Welcome</body>");
        browser.capture_budget = Some(1);
        let mut sink = RecordingSink::default();
        let mut executor = FlowExecutor::new();

        let result = executor
            .execute(&flow, &ctx(), &browser, &mut sink)
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn dry_run_touches_no_browser() {
        let browser = FakeBrowser::default();
        let mut sink = RecordingSink::default();

        FlowExecutor::new()
            .plan(&login_flow(), &ctx(), &mut sink)
            .unwrap();

        assert_eq!(browser.call_count(), 0);
        // Three numbered plan lines plus the header.
        assert_eq!(sink.lines.len(), 4);
        assert!(sink.lines[2].contains("dev@example.com"));
    }

    #[tokio::test]
    async fn empty_flow_is_rejected() {
        let flow = Flow::new("empty", "Empty", FlowCategory::Other);
        let browser = FakeBrowser::default();
        let mut sink = RecordingSink::default();

        let err = FlowExecutor::new()
            .execute(&flow, &ctx(), &browser, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::EmptyFlow { .. }));
    }

    #[tokio::test]
    async fn executors_are_single_use() {
        let browser = FakeBrowser::with_page("<body>Welcome</body>");
        let mut sink = RecordingSink::default();
        let mut executor = FlowExecutor::new();

        executor
            .execute(&login_flow(), &ctx(), &browser, &mut sink)
            .await
            .unwrap();
        let err = executor
            .execute(&login_flow(), &ctx(), &browser, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::AlreadyRan { .. }));
    }
}
