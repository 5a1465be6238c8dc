//! Protocol client error taxonomy.

use thiserror::Error;

/// Errors surfaced by the protocol client.
///
/// `Connection` is recoverable by caller-driven reconnect; `Capture` lets the
/// caller fall back to a cached prior capture or fail the current step.
#[derive(Debug, Error)]
pub enum CdpError {
    #[error("cannot reach debugging endpoint at {endpoint}: {reason} (start the browser with --remote-debugging-port)")]
    Connection { endpoint: String, reason: String },

    #[error("no debuggable page target available at {endpoint}")]
    NoTargets { endpoint: String },

    #[error("no capture strategy produced usable HTML for {url}")]
    Capture { url: String },

    #[error("cdp command {method} failed: {message}")]
    Protocol { method: String, message: String },

    #[error("cdp command {method} timed out")]
    Timeout { method: String },

    #[error("websocket transport error: {0}")]
    Transport(String),
}

impl CdpError {
    pub fn connection(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CdpError::Connection {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn protocol(method: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CdpError::Protocol {
            method: method.into(),
            message: message.to_string(),
        }
    }

    /// Whether a fresh connection is worth attempting after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CdpError::Connection { .. }
                | CdpError::Transport(_)
                | CdpError::Timeout { .. }
                | CdpError::NoTargets { .. }
        )
    }
}
