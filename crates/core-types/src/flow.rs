//! Flow definitions - discovered multi-step user journeys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Category a discovered flow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowCategory {
    /// Authentication journeys (login, logout, password reset)
    Auth,
    /// Account creation / onboarding
    Signup,
    /// Form submission journeys
    Form,
    /// Plain navigation journeys
    Navigation,
    /// Anything the scanner could not classify
    Other,
}

impl fmt::Display for FlowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowCategory::Auth => "auth",
            FlowCategory::Signup => "signup",
            FlowCategory::Form => "form",
            FlowCategory::Navigation => "navigation",
            FlowCategory::Other => "other",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FlowCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auth" => Ok(FlowCategory::Auth),
            "signup" => Ok(FlowCategory::Signup),
            "form" => Ok(FlowCategory::Form),
            "navigation" | "nav" => Ok(FlowCategory::Navigation),
            "other" => Ok(FlowCategory::Other),
            other => Err(format!("unknown flow category: {other}")),
        }
    }
}

/// A discovered, named multi-step user journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Stable flow identifier (e.g. "login")
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Category used for list filtering
    pub category: FlowCategory,

    /// What the journey does, in one or two sentences
    pub description: String,

    /// Discovery certainty in [0, 1]. Advisory only - never gates execution.
    pub confidence: f64,

    /// Ordered steps. Non-empty for any flow handed to an executor.
    pub steps: Vec<Step>,

    /// Last time discovery produced or refreshed this flow
    pub last_updated: DateTime<Utc>,
}

impl Flow {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: FlowCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            confidence: 0.5,
            steps: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// One atomic instruction within a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier, unique within the flow
    pub id: String,

    /// The action to perform
    pub action: StepAction,

    /// Expected outcome, re-evaluated against the freshly reduced page
    #[serde(default)]
    pub expect: Expectation,
}

impl Step {
    pub fn new(id: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            action,
            expect: Expectation::None,
        }
    }

    pub fn with_expect(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }

    /// Short label for plan listings and step logs.
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::Navigate { url } => format!("navigate to {url}"),
            StepAction::Fill { selector, value } => {
                format!("fill {selector} with {}", value.describe())
            }
            StepAction::Click { selector } => format!("click {selector}"),
            StepAction::Assert { condition } => format!("assert {condition}"),
        }
    }
}

/// Closed set of step kinds. The executor's loop is an exhaustive match over
/// this enum, so adding a kind is a compile-time event, not a runtime surprise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// Load a URL (absolute, or resolved against the context base URL)
    Navigate { url: String },

    /// Type a value into the element matched by `selector`
    Fill { selector: String, value: StepInput },

    /// Click the element matched by `selector`
    Click { selector: String },

    /// Check a condition against the current page without acting on it
    Assert { condition: AssertKind },
}

/// A step input, either fixed at discovery time or bound at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum StepInput {
    /// Fixed value baked in at discovery time
    Literal { value: String },

    /// Named variable resolved from the execution context, falling back to
    /// the discovered default, else prompted interactively
    Variable {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
}

impl StepInput {
    pub fn literal(value: impl Into<String>) -> Self {
        StepInput::Literal {
            value: value.into(),
        }
    }

    pub fn variable(name: impl Into<String>, default: Option<String>) -> Self {
        StepInput::Variable {
            name: name.into(),
            default,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StepInput::Literal { value } => format!("\"{value}\""),
            StepInput::Variable { name, .. } => format!("${{{name}}}"),
        }
    }
}

/// Assertion kinds usable both as standalone steps and as expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AssertKind {
    UrlContains { fragment: String },
    TextVisible { text: String },
    ElementPresent { selector: String },
}

impl fmt::Display for AssertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertKind::UrlContains { fragment } => write!(f, "url contains \"{fragment}\""),
            AssertKind::TextVisible { text } => write!(f, "text \"{text}\" visible"),
            AssertKind::ElementPresent { selector } => write!(f, "element {selector} present"),
        }
    }
}

/// Expected outcome attached to a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    /// No explicit expectation; the action itself succeeding is enough
    #[default]
    None,
    UrlContains { fragment: String },
    TextVisible { text: String },
    ElementPresent { selector: String },
}

impl Expectation {
    pub fn describe(&self) -> Option<String> {
        match self {
            Expectation::None => None,
            Expectation::UrlContains { fragment } => Some(format!("url contains \"{fragment}\"")),
            Expectation::TextVisible { text } => Some(format!("text \"{text}\" visible")),
            Expectation::ElementPresent { selector } => {
                Some(format!("element {selector} present"))
            }
        }
    }
}

/// Per-run execution context. Owned exclusively by one executor run and never
/// shared across concurrent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Environment label ("local", "staging", ...)
    pub environment: String,

    /// Base URL relative step targets resolve against
    pub base_url: String,

    /// Caller-supplied variable overrides; take precedence over discovered
    /// step defaults
    pub variables: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            environment: "local".to_string(),
            base_url: base_url.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Resolve a URL against the base, leaving absolute URLs untouched.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for cat in [
            FlowCategory::Auth,
            FlowCategory::Signup,
            FlowCategory::Form,
            FlowCategory::Navigation,
            FlowCategory::Other,
        ] {
            let parsed: FlowCategory = cat.to_string().parse().unwrap();
            assert_eq!(parsed, cat);
        }
    }

    #[test]
    fn confidence_is_clamped() {
        let flow = Flow::new("f", "F", FlowCategory::Other).with_confidence(1.7);
        assert_eq!(flow.confidence, 1.0);
    }

    #[test]
    fn resolve_url_respects_absolute() {
        let ctx = ExecutionContext::new("http://localhost:3000");
        assert_eq!(ctx.resolve_url("/login"), "http://localhost:3000/login");
        assert_eq!(ctx.resolve_url("https://other/x"), "https://other/x");
    }

    #[test]
    fn step_serializes_with_kind_tag() {
        let step = Step::new(
            "s1",
            StepAction::Fill {
                selector: "#email".into(),
                value: StepInput::variable("email", Some("dev@example.com".into())),
            },
        );
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"]["kind"], "fill");
        assert_eq!(json["action"]["value"]["source"], "variable");
    }
}
