//! Production browser port backed by the protocol client.

use async_trait::async_trait;
use cdp_client::{CdpClient, CdpConfig, CdpError, SessionRegistry};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ports::{BrowserError, BrowserPort};

/// Session-registry key for the executor's cached handle.
pub const EXECUTOR_SESSION: &str = "executor";

/// [`BrowserPort`] implementation over a cached CDP handle.
///
/// The protocol client never auto-reconnects, so the discipline lives here:
/// every operation that fails recoverably re-resolves a fresh handle and
/// retries exactly once. The freshly established handle is published to the
/// shared registry - most recent successful connection wins.
pub struct CdpBrowser {
    cfg: CdpConfig,
    registry: Arc<SessionRegistry>,
    // Serializes reconnect attempts so two failing ops don't race to publish.
    reconnect: Mutex<()>,
}

impl CdpBrowser {
    pub fn new(cfg: CdpConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            cfg,
            registry,
            reconnect: Mutex::new(()),
        }
    }

    async fn handle(&self) -> Result<Arc<CdpClient>, BrowserError> {
        if let Some(client) = self.registry.get(EXECUTOR_SESSION) {
            if client.is_alive() {
                return Ok(client);
            }
        }
        self.fresh_handle().await
    }

    async fn fresh_handle(&self) -> Result<Arc<CdpClient>, BrowserError> {
        let _guard = self.reconnect.lock().await;
        let client = Arc::new(
            CdpClient::connect(&self.cfg)
                .await
                .map_err(|err| BrowserError::Connection(err.to_string()))?,
        );
        self.registry.publish(EXECUTOR_SESSION, client.clone());
        info!(target: "flow-executor", target_id = client.target_id(), "browser handle established");
        Ok(client)
    }

    /// Run `op` against the cached handle; on a recoverable failure,
    /// re-resolve once and retry once.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, BrowserError>
    where
        F: Fn(Arc<CdpClient>) -> Fut,
        Fut: std::future::Future<Output = Result<T, CdpError>>,
    {
        let client = self.handle().await?;
        match op(client).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_recoverable() => {
                warn!(target: "flow-executor", %err, "browser op failed, reconnecting once");
                let client = self.fresh_handle().await?;
                op(client).await.map_err(map_err)
            }
            Err(err) => Err(map_err(err)),
        }
    }
}

fn map_err(err: CdpError) -> BrowserError {
    match err {
        CdpError::Capture { .. } => BrowserError::Capture(err.to_string()),
        CdpError::Connection { .. } | CdpError::NoTargets { .. } | CdpError::Transport(_) => {
            BrowserError::Connection(err.to_string())
        }
        other => BrowserError::Action(other.to_string()),
    }
}

#[async_trait]
impl BrowserPort for CdpBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let url = url.to_string();
        self.with_retry(move |client| {
            let url = url.clone();
            async move { client.navigate(&url).await }
        })
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<bool, BrowserError> {
        let selector = selector.to_string();
        let value = value.to_string();
        self.with_retry(move |client| {
            let selector = selector.clone();
            let value = value.clone();
            async move { client.fill(&selector, &value).await }
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        let selector = selector.to_string();
        self.with_retry(move |client| {
            let selector = selector.clone();
            async move { client.click(&selector).await }
        })
        .await
    }

    async fn capture(&self) -> Result<String, BrowserError> {
        self.with_retry(|client| async move { client.capture_page().await })
            .await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.with_retry(|client| async move { client.current_url().await })
            .await
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        let selector = selector.to_string();
        self.with_retry(move |client| {
            let selector = selector.clone();
            async move {
                let script = format!(
                    "!!document.querySelector({})",
                    serde_json::to_string(&selector).unwrap_or_else(|_| "\"\"".to_string())
                );
                let value = client.evaluate(&script).await?;
                Ok(value.as_bool().unwrap_or(false))
            }
        })
        .await
    }
}
