//! Flow execution engine.
//!
//! One executor run drives one flow against one browser session, strictly in
//! step order, and produces a terminal [`questline_core_types::ExecutionResult`].
//! Browser access goes through the [`ports::BrowserPort`] seam so tests and
//! dry runs never touch a real connection.

pub mod browser;
pub mod errors;
pub mod executor;
pub mod ports;

pub use browser::CdpBrowser;
pub use errors::ExecutorError;
pub use executor::{FlowExecutor, RunState};
pub use ports::{BrowserError, BrowserPort, OutputSink};
