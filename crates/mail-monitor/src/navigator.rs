//! Navigation seam for the monitor.

use async_trait::async_trait;
use cdp_client::{CdpClient, CdpConfig, SessionRegistry};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::monitor::MonitorError;

/// Session-registry key for the monitor's cached handle.
pub const MONITOR_SESSION: &str = "monitor";

/// Drives the browser to an inbound link. Behind a trait so the retry
/// discipline is testable without a browser.
#[async_trait]
pub trait LinkNavigator: Send + Sync {
    /// Navigate using the cached handle, if one exists.
    async fn navigate(&self, url: &str) -> Result<(), MonitorError>;

    /// Throw away the cached handle and establish a fresh one.
    async fn reconnect(&self) -> Result<(), MonitorError>;

    /// Whether a cached handle currently exists.
    fn has_handle(&self) -> bool;
}

/// Production navigator over the shared session registry. Publishes every
/// fresh connection there, so "most recent successful connection wins" holds
/// across monitor and executor alike.
pub struct CdpNavigator {
    cfg: CdpConfig,
    registry: Arc<SessionRegistry>,
    reconnect_lock: Mutex<()>,
}

impl CdpNavigator {
    pub fn new(cfg: CdpConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            cfg,
            registry,
            reconnect_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl LinkNavigator for CdpNavigator {
    async fn navigate(&self, url: &str) -> Result<(), MonitorError> {
        let client = self
            .registry
            .get(MONITOR_SESSION)
            .ok_or(MonitorError::NoBrowserHandle)?;
        client
            .navigate(url)
            .await
            .map_err(|err| MonitorError::Navigation(err.to_string()))
    }

    async fn reconnect(&self) -> Result<(), MonitorError> {
        let _guard = self.reconnect_lock.lock().await;
        let client = Arc::new(
            CdpClient::connect(&self.cfg)
                .await
                .map_err(|err| MonitorError::Navigation(err.to_string()))?,
        );
        info!(target: "mail-monitor", target_id = client.target_id(), "browser handle re-established");
        self.registry.publish(MONITOR_SESSION, client);
        Ok(())
    }

    fn has_handle(&self) -> bool {
        self.registry.get(MONITOR_SESSION).is_some()
    }
}
