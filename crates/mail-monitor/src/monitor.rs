//! The background monitor task.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extract::extract_auth_links;
use crate::mailbox::MailboxSource;
use crate::navigator::LinkNavigator;

/// Capacity of the best-effort notification channel.
const NOTIFY_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("mailbox poll failed: {0}")]
    Mailbox(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("no cached browser handle")]
    NoBrowserHandle,

    #[error("event callback failed: {0}")]
    Callback(String),
}

/// Payload published for each detected authentication link.
#[derive(Debug, Clone)]
pub struct MailEvent {
    pub link: String,
    pub received_at: DateTime<Utc>,
}

/// Monitor tuning.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,

    /// Whether detected links are followed in the browser automatically.
    pub auto_navigate: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            auto_navigate: true,
        }
    }
}

type EventCallback = Arc<dyn Fn(&MailEvent) -> Result<(), MonitorError> + Send + Sync>;

/// Single process-wide mailbox monitor.
///
/// `start_background` is first-caller-wins; later calls are no-ops. The
/// instance owns exactly one mailbox connection and one cached browser
/// handle (through its navigator).
pub struct EmailMonitor {
    config: MonitorConfig,
    mailbox: Arc<dyn MailboxSource>,
    navigator: Arc<dyn LinkNavigator>,
    running: AtomicBool,
    cancel: CancellationToken,
    notify_tx: mpsc::Sender<MailEvent>,
    notify_rx: Mutex<Option<mpsc::Receiver<MailEvent>>>,
    callback: Mutex<Option<EventCallback>>,
    seen_links: Mutex<HashSet<String>>,
}

impl EmailMonitor {
    pub fn new(
        config: MonitorConfig,
        mailbox: Arc<dyn MailboxSource>,
        navigator: Arc<dyn LinkNavigator>,
    ) -> Arc<Self> {
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_CAPACITY);
        Arc::new(Self {
            config,
            mailbox,
            navigator,
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
            callback: Mutex::new(None),
            seen_links: Mutex::new(HashSet::new()),
        })
    }

    /// Register the callback invoked for every detected link.
    pub fn set_on_event(&self, callback: EventCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// Take the notification receiver. Single consumer; subsequent calls
    /// return `None`.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<MailEvent>> {
        self.notify_rx.lock().take()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the poll loop. First caller wins; a second call while running is
    /// a no-op.
    pub fn start_background(self: &Arc<Self>) -> Result<(), MonitorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!(target: "mail-monitor", "monitor already running, ignoring start");
            return Ok(());
        }

        let monitor = self.clone();
        tokio::spawn(async move {
            monitor.run().await;
            monitor.running.store(false, Ordering::SeqCst);
        });

        info!(
            target: "mail-monitor",
            interval_ms = self.config.poll_interval.as_millis() as u64,
            auto_navigate = self.config.auto_navigate,
            "mail monitor started"
        );
        Ok(())
    }

    /// Request shutdown; the loop exits at the next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(target: "mail-monitor", "mail monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.poll_once().await {
                        warn!(target: "mail-monitor", %err, "poll failed, will retry next tick");
                    }
                }
            }
        }
    }

    /// One poll: fetch new bodies, extract candidate links, act on each
    /// unseen link.
    pub async fn poll_once(&self) -> Result<(), MonitorError> {
        let bodies = self.mailbox.poll().await?;

        for body in bodies {
            for link in extract_auth_links(&body) {
                if !self.seen_links.lock().insert(link.clone()) {
                    continue;
                }
                self.handle_link(link).await;
            }
        }
        Ok(())
    }

    async fn handle_link(&self, link: String) {
        info!(target: "mail-monitor", %link, "authentication link detected");
        let event = MailEvent {
            link: link.clone(),
            received_at: Utc::now(),
        };

        // Best-effort notification: a full channel drops the event. The
        // navigation below is the durable action.
        if self.notify_tx.try_send(event.clone()).is_err() {
            debug!(target: "mail-monitor", "notification channel full, dropping");
        }

        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            if let Err(err) = callback(&event) {
                warn!(target: "mail-monitor", %err, "event callback failed");
            }
        }

        if self.config.auto_navigate {
            self.navigate_with_retry(&link).await;
        }
    }

    /// Same discipline as every other protocol-client caller: on failure,
    /// re-resolve the handle once and retry navigation exactly once.
    async fn navigate_with_retry(&self, link: &str) {
        if !self.navigator.has_handle() {
            if let Err(err) = self.navigator.reconnect().await {
                warn!(target: "mail-monitor", %err, "no browser handle and reconnect failed");
                return;
            }
        }

        match self.navigator.navigate(link).await {
            Ok(()) => {
                info!(target: "mail-monitor", %link, "navigated to authentication link");
            }
            Err(first) => {
                debug!(target: "mail-monitor", %first, "navigation failed, re-resolving handle");
                let retry = async {
                    self.navigator.reconnect().await?;
                    self.navigator.navigate(link).await
                };
                match retry.await {
                    Ok(()) => {
                        info!(target: "mail-monitor", %link, "navigated after handle refresh");
                    }
                    Err(err) => {
                        warn!(target: "mail-monitor", %link, %err, "giving up on link navigation");
                    }
                }
            }
        }
    }
}
