//! Target discovery over the debugging endpoint's HTTP surface.

use crate::config::CdpConfig;
use crate::error::CdpError;
use serde::Deserialize;
use tracing::debug;

/// One entry from the `/json/list` target listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PageTarget {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub websocket_url: Option<String>,
}

impl PageTarget {
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

/// Fetch the target list and pick the active page target.
///
/// The first `type == "page"` entry carrying a WebSocket URL wins; Chrome
/// lists the focused tab first.
pub async fn resolve_page_target(cfg: &CdpConfig) -> Result<PageTarget, CdpError> {
    let endpoint = cfg.http_base();
    let url = format!("{endpoint}/json/list");

    let client = reqwest::Client::builder()
        .timeout(cfg.connect_timeout)
        .build()
        .map_err(|err| CdpError::connection(&endpoint, err))?;

    let targets: Vec<PageTarget> = client
        .get(&url)
        .send()
        .await
        .map_err(|err| CdpError::connection(&endpoint, err))?
        .json()
        .await
        .map_err(|err| CdpError::connection(&endpoint, err))?;

    debug!(target: "cdp-client", count = targets.len(), "fetched target list");

    targets
        .into_iter()
        .find(|t| t.is_page() && t.websocket_url.is_some())
        .ok_or(CdpError::NoTargets { endpoint })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chrome_target_listing() {
        let body = r#"[
            {
                "id": "A1B2",
                "type": "page",
                "title": "Example",
                "url": "http://localhost:3000/",
                "webSocketDebuggerUrl": "ws://localhost:9222/devtools/page/A1B2"
            },
            {
                "id": "SW01",
                "type": "service_worker",
                "title": "sw",
                "url": "http://localhost:3000/sw.js"
            }
        ]"#;
        let targets: Vec<PageTarget> = serde_json::from_str(body).unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].is_page());
        assert!(!targets[1].is_page());
        assert!(targets[0].websocket_url.as_deref().unwrap().contains("A1B2"));
    }
}
