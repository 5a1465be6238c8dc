//! Mailbox sources.
//!
//! The monitor is transport-agnostic: anything that can produce message
//! bodies per poll works. The shipped implementation talks to a Mailpit-style
//! development mailbox over its HTTP JSON API.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

use crate::monitor::MonitorError;

/// External collaborator delivering free-text message bodies.
///
/// Contract: produce zero or more new bodies per poll. Implementations own
/// any "already seen" bookkeeping for their transport.
#[async_trait]
pub trait MailboxSource: Send + Sync {
    async fn poll(&self) -> Result<Vec<String>, MonitorError>;
}

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageSummary>,
}

#[derive(Debug, Deserialize)]
struct MessageSummary {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDetail {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "HTML", default)]
    html: String,
}

/// Mailbox over a Mailpit-compatible HTTP API (`/api/v1/messages`).
pub struct HttpMailbox {
    base_url: String,
    client: reqwest::Client,
    seen: Mutex<HashSet<String>>,
}

impl HttpMailbox {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            seen: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl MailboxSource for HttpMailbox {
    async fn poll(&self) -> Result<Vec<String>, MonitorError> {
        let list_url = format!("{}/api/v1/messages", self.base_url);
        let listing: MessageListResponse = self
            .client
            .get(&list_url)
            .send()
            .await
            .map_err(|err| MonitorError::Mailbox(err.to_string()))?
            .json()
            .await
            .map_err(|err| MonitorError::Mailbox(err.to_string()))?;

        let fresh_ids: Vec<String> = {
            let mut seen = self.seen.lock();
            listing
                .messages
                .into_iter()
                .map(|m| m.id)
                .filter(|id| seen.insert(id.clone()))
                .collect()
        };

        if fresh_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(target: "mail-monitor", count = fresh_ids.len(), "new messages in mailbox");

        let mut bodies = Vec::with_capacity(fresh_ids.len());
        for id in fresh_ids {
            let detail_url = format!("{}/api/v1/message/{}", self.base_url, id);
            let detail: MessageDetail = self
                .client
                .get(&detail_url)
                .send()
                .await
                .map_err(|err| MonitorError::Mailbox(err.to_string()))?
                .json()
                .await
                .map_err(|err| MonitorError::Mailbox(err.to_string()))?;
            bodies.push(if detail.text.is_empty() {
                detail.html
            } else {
                detail.text
            });
        }
        Ok(bodies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mailpit_listing() {
        let body = r#"{"total": 2, "messages": [{"ID": "m1"}, {"ID": "m2"}]}"#;
        let listing: MessageListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(listing.messages.len(), 2);
        assert_eq!(listing.messages[0].id, "m1");
    }

    #[test]
    fn detail_prefers_text_over_html() {
        let detail: MessageDetail =
            serde_json::from_str(r#"{"Text": "plain", "HTML": "<p>rich</p>"}"#).unwrap();
        assert_eq!(detail.text, "plain");
    }
}
