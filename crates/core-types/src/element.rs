//! Interactive elements extracted from a reduced page capture.

use serde::{Deserialize, Serialize};

/// One interactive element found on a captured page. Derived fresh on every
/// capture and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractiveElement {
    /// Lowercase tag name ("button", "input", "a", ...)
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Test identifier (data-testid / data-test / data-cy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    /// Best resolvable selector for this element, by priority:
    /// test-id > id > tag+type+aria-label > tag+leading-text
    pub selector: String,
}

impl InteractiveElement {
    /// One-line summary used by table output and the step interpreter.
    pub fn summary(&self) -> String {
        let mut out = format!("<{}>", self.tag);
        if let Some(label) = &self.aria_label {
            out.push_str(&format!(" \"{label}\""));
        }
        out.push_str(&format!(" {}", self.selector));
        out
    }
}
