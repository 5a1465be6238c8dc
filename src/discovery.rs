//! Flow discovery: scan application source for auth endpoints and turn them
//! into runnable flows.
//!
//! The scanner is heuristic and deliberately conservative; an AI interpreter
//! can be plugged in through [`FlowInterpreter`] to refine or extend what the
//! scan found. The catalog only ever sees the finished flows.

use anyhow::Result;
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use questline_core_types::{
    Expectation, Flow, FlowCategory, FlowManifest, SourceFileRecord, Step, StepAction, StepInput,
};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source extensions worth scanning; mirrors what the watcher promotes.
const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "py", "rb", "go", "rs", "java", "php", "html", "vue",
    "svelte",
];

/// Quoted route-ish paths: "/login", '/auth/signup', `/password/reset`...
static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'`](/[A-Za-z0-9_./-]*)["'`]"#).expect("route regex compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EndpointKind {
    Login,
    Signup,
    PasswordReset,
    Logout,
}

impl EndpointKind {
    fn classify(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.contains("logout") || lower.contains("sign-out") || lower.contains("signout") {
            Some(EndpointKind::Logout)
        } else if lower.contains("login") || lower.contains("signin") || lower.contains("sign-in")
        {
            Some(EndpointKind::Login)
        } else if lower.contains("signup")
            || lower.contains("sign-up")
            || lower.contains("register")
        {
            Some(EndpointKind::Signup)
        } else if lower.contains("reset") && lower.contains("password")
            || lower.contains("forgot")
        {
            Some(EndpointKind::PasswordReset)
        } else {
            None
        }
    }
}

/// What the raw scan found, prior to interpretation.
#[derive(Debug, Default)]
pub struct ScanFindings {
    /// endpoint kind -> (path -> files mentioning it)
    pub endpoints: BTreeMap<EndpointKind, BTreeMap<String, Vec<PathBuf>>>,
    pub scanned_files: Vec<SourceFileRecord>,
    pub errors: Vec<String>,
}

/// Discovery outcome handed to the catalog and the CLI.
#[derive(Debug, Serialize)]
pub struct DiscoveryReport {
    pub flows: Vec<Flow>,
    pub total_found: usize,
    pub scanned_files: Vec<SourceFileRecord>,
    pub errors: Vec<String>,
}

impl DiscoveryReport {
    pub fn into_manifest(self) -> FlowManifest {
        let mut manifest = FlowManifest::new(self.flows);
        manifest.source_files = self.scanned_files;
        manifest.errors = self.errors;
        manifest
    }
}

/// Turns scan findings into flows. The default implementation is heuristic;
/// a language-model-backed interpreter is an external collaborator that can
/// replace it at construction time.
pub trait FlowInterpreter: Send + Sync {
    fn interpret(&self, findings: &ScanFindings) -> Vec<Flow>;
}

pub struct Discovery {
    root: PathBuf,
    interpreter: Box<dyn FlowInterpreter>,
}

impl Discovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            interpreter: Box::new(HeuristicInterpreter),
        }
    }

    pub fn with_interpreter(mut self, interpreter: Box<dyn FlowInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Scan the project tree and interpret findings into flows.
    ///
    /// A project with zero auth endpoints yields an empty flow list and no
    /// error.
    pub fn scan(&self) -> Result<DiscoveryReport> {
        let findings = self.collect_findings();
        let flows = self.interpreter.interpret(&findings);
        debug!(
            target: "discovery",
            files = findings.scanned_files.len(),
            flows = flows.len(),
            "scan complete"
        );
        Ok(DiscoveryReport {
            total_found: flows.len(),
            flows,
            scanned_files: findings.scanned_files,
            errors: findings.errors,
        })
    }

    fn collect_findings(&self) -> ScanFindings {
        let mut findings = ScanFindings::default();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !matches!(
                    name.as_ref(),
                    "node_modules" | "target" | "dist" | "build" | "vendor" | "coverage"
                )
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    findings.errors.push(err.to_string());
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || !has_source_extension(path) {
                continue;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(err) => {
                    // Binary or unreadable; note and move on.
                    warn!(target: "discovery", path = %path.display(), %err, "skipping unreadable file");
                    findings
                        .errors
                        .push(format!("{}: {err}", path.display()));
                    continue;
                }
            };

            findings.scanned_files.push(SourceFileRecord {
                path: path.to_path_buf(),
                modified_at: file_mtime(path),
            });

            for capture in ROUTE_RE.captures_iter(&content) {
                let route = capture[1].to_string();
                if let Some(kind) = EndpointKind::classify(&route) {
                    findings
                        .endpoints
                        .entry(kind)
                        .or_default()
                        .entry(route)
                        .or_default()
                        .push(path.to_path_buf());
                }
            }
        }

        findings
    }
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn file_mtime(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Rule-based interpreter: one flow per endpoint kind, anchored at the most
/// widely referenced path.
pub struct HeuristicInterpreter;

impl FlowInterpreter for HeuristicInterpreter {
    fn interpret(&self, findings: &ScanFindings) -> Vec<Flow> {
        let mut flows = Vec::new();

        for (kind, paths) in &findings.endpoints {
            // The path mentioned in the most files is the best anchor.
            let Some((route, files)) = paths
                .iter()
                .max_by_key(|(_, files)| files.len())
                .map(|(route, files)| (route.clone(), files.len()))
            else {
                continue;
            };
            let confidence = (0.5 + 0.1 * files as f64).min(0.9);

            let flow = match kind {
                EndpointKind::Login => login_flow(&route, confidence),
                EndpointKind::Signup => signup_flow(&route, confidence),
                EndpointKind::PasswordReset => reset_flow(&route, confidence),
                EndpointKind::Logout => logout_flow(&route, confidence),
            };
            flows.push(flow);
        }

        flows
    }
}

const EMAIL_SELECTOR: &str = r#"input[type="email"], input[name="email"]"#;
const PASSWORD_SELECTOR: &str = r#"input[type="password"]"#;
const SUBMIT_SELECTOR: &str = r#"button[type="submit"], input[type="submit"]"#;

fn login_flow(route: &str, confidence: f64) -> Flow {
    Flow::new("login", "Log in", FlowCategory::Auth)
        .with_description(format!("Sign in through {route} with email and password"))
        .with_confidence(confidence)
        .with_step(
            Step::new(
                "open-login",
                StepAction::Navigate {
                    url: route.to_string(),
                },
            )
            .with_expect(Expectation::ElementPresent {
                selector: EMAIL_SELECTOR.to_string(),
            }),
        )
        .with_step(Step::new(
            "enter-email",
            StepAction::Fill {
                selector: EMAIL_SELECTOR.to_string(),
                value: StepInput::variable("email", None),
            },
        ))
        .with_step(Step::new(
            "enter-password",
            StepAction::Fill {
                selector: PASSWORD_SELECTOR.to_string(),
                value: StepInput::variable("password", None),
            },
        ))
        .with_step(Step::new(
            "submit",
            StepAction::Click {
                selector: SUBMIT_SELECTOR.to_string(),
            },
        ))
}

fn signup_flow(route: &str, confidence: f64) -> Flow {
    Flow::new("signup", "Sign up", FlowCategory::Signup)
        .with_description(format!("Create an account through {route}"))
        .with_confidence(confidence)
        .with_step(
            Step::new(
                "open-signup",
                StepAction::Navigate {
                    url: route.to_string(),
                },
            )
            .with_expect(Expectation::ElementPresent {
                selector: EMAIL_SELECTOR.to_string(),
            }),
        )
        .with_step(Step::new(
            "enter-email",
            StepAction::Fill {
                selector: EMAIL_SELECTOR.to_string(),
                value: StepInput::variable("email", None),
            },
        ))
        .with_step(Step::new(
            "enter-password",
            StepAction::Fill {
                selector: PASSWORD_SELECTOR.to_string(),
                value: StepInput::variable("password", None),
            },
        ))
        .with_step(Step::new(
            "submit",
            StepAction::Click {
                selector: SUBMIT_SELECTOR.to_string(),
            },
        ))
}

fn reset_flow(route: &str, confidence: f64) -> Flow {
    Flow::new("password-reset", "Reset password", FlowCategory::Auth)
        .with_description(format!(
            "Request a password reset email through {route}; the mail monitor can follow the link"
        ))
        .with_confidence(confidence)
        .with_step(
            Step::new(
                "open-reset",
                StepAction::Navigate {
                    url: route.to_string(),
                },
            )
            .with_expect(Expectation::ElementPresent {
                selector: EMAIL_SELECTOR.to_string(),
            }),
        )
        .with_step(Step::new(
            "enter-email",
            StepAction::Fill {
                selector: EMAIL_SELECTOR.to_string(),
                value: StepInput::variable("email", None),
            },
        ))
        .with_step(Step::new(
            "submit",
            StepAction::Click {
                selector: SUBMIT_SELECTOR.to_string(),
            },
        ))
}

fn logout_flow(route: &str, confidence: f64) -> Flow {
    Flow::new("logout", "Log out", FlowCategory::Auth)
        .with_description(format!("End the session through {route}"))
        .with_confidence(confidence)
        .with_step(Step::new(
            "open-logout",
            StepAction::Navigate {
                url: route.to_string(),
            },
        ))
}
