//! Application-scoped monitor registry.
//!
//! The "exactly one mailbox connection and one cached handle per process"
//! requirement is modeled as an explicit service registry constructed once at
//! startup, not a hidden module-level global.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::monitor::EmailMonitor;

/// Keyed registry of monitor instances. In practice one key ("email") exists;
/// the keying leaves room for other inbound-event monitors.
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: RwLock<HashMap<String, Arc<EmailMonitor>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the monitor registered under `key`, constructing it with
    /// `build` on first access. First caller wins.
    pub fn get_or_insert<F>(&self, key: &str, build: F) -> Arc<EmailMonitor>
    where
        F: FnOnce() -> Arc<EmailMonitor>,
    {
        if let Some(existing) = self.monitors.read().get(key) {
            return existing.clone();
        }
        let mut guard = self.monitors.write();
        guard.entry(key.to_string()).or_insert_with(build).clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<EmailMonitor>> {
        self.monitors.read().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxSource;
    use crate::monitor::{MonitorConfig, MonitorError};
    use crate::navigator::LinkNavigator;
    use async_trait::async_trait;

    struct EmptyMailbox;

    #[async_trait]
    impl MailboxSource for EmptyMailbox {
        async fn poll(&self) -> Result<Vec<String>, MonitorError> {
            Ok(Vec::new())
        }
    }

    struct NoNavigator;

    #[async_trait]
    impl LinkNavigator for NoNavigator {
        async fn navigate(&self, _url: &str) -> Result<(), MonitorError> {
            Err(MonitorError::NoBrowserHandle)
        }
        async fn reconnect(&self) -> Result<(), MonitorError> {
            Err(MonitorError::NoBrowserHandle)
        }
        fn has_handle(&self) -> bool {
            false
        }
    }

    fn make_monitor() -> Arc<EmailMonitor> {
        EmailMonitor::new(
            MonitorConfig::default(),
            Arc::new(EmptyMailbox),
            Arc::new(NoNavigator),
        )
    }

    #[test]
    fn first_registration_wins() {
        let registry = MonitorRegistry::new();
        let first = registry.get_or_insert("email", make_monitor);
        let second = registry.get_or_insert("email", make_monitor);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_key_is_none() {
        let registry = MonitorRegistry::new();
        assert!(registry.get("email").is_none());
    }
}
