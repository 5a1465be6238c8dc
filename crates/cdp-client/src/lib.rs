//! Chrome DevTools Protocol client.
//!
//! Connects to a running browser's remote-debugging endpoint: the JSON target
//! list is fetched over HTTP, the active page target's WebSocket URL is
//! extracted, and commands are issued over a framed JSON-RPC connection.
//!
//! The client never auto-reconnects. Every caller applies the same pattern:
//! on failure, re-resolve a fresh handle and retry exactly once.
//!
//! Chrome must be started with remote debugging enabled:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod targets;
pub mod transport;

pub use client::CdpClient;
pub use config::CdpConfig;
pub use error::CdpError;
pub use session::SessionRegistry;
pub use targets::PageTarget;
