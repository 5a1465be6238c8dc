//! Cached browser session handles.
//!
//! The registry is single-writer/many-reader with a deliberately simple
//! "most recent successful connection wins" rule: a stale handle costs one
//! failed navigation, which the caller detects cheaply, not corruption.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::client::CdpClient;

/// Keyed store of live session handles shared across components.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<CdpClient>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a freshly established connection under `key`, replacing any
    /// previous handle. Last successful connection wins.
    pub fn publish(&self, key: &str, client: Arc<CdpClient>) {
        debug!(target: "cdp-client", key, target_id = client.target_id(), "session handle published");
        self.sessions.write().insert(key.to_string(), client);
    }

    /// Borrow the most recently published handle for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<CdpClient>> {
        self.sessions.read().get(key).cloned()
    }

    /// Drop the handle for `key`. Used on shutdown paths so sockets close.
    pub fn evict(&self, key: &str) {
        self.sessions.write().remove(key);
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
