//! Inbound-mail monitor.
//!
//! A long-lived background task polls a development mailbox for
//! authentication links (magic links, verification, password reset) and, when
//! one arrives, drives the cached browser session to it - independent of any
//! active executor run.
//!
//! Exactly one monitor instance exists per process, owning one mailbox
//! connection and one cached browser handle; it lives in an explicit keyed
//! registry rather than a hidden global.

pub mod extract;
pub mod mailbox;
pub mod monitor;
pub mod navigator;
pub mod registry;

pub use extract::extract_auth_links;
pub use mailbox::{HttpMailbox, MailboxSource};
pub use monitor::{EmailMonitor, MailEvent, MonitorConfig, MonitorError};
pub use navigator::{CdpNavigator, LinkNavigator};
pub use registry::MonitorRegistry;
