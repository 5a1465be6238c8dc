//! High-level protocol client: connect, navigate, interact, capture.

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::CdpError;
use crate::targets::{resolve_page_target, PageTarget};
use crate::transport::WsTransport;

/// Handle to one active page target.
///
/// Holds no reconnect logic: a dead handle stays dead, and the caller
/// re-resolves a fresh one and retries exactly once.
pub struct CdpClient {
    cfg: CdpConfig,
    target: PageTarget,
    transport: WsTransport,
}

impl CdpClient {
    /// Resolve the active page target and open a command connection to it,
    /// enabling the Page, DOM and Runtime domains.
    pub async fn connect(cfg: &CdpConfig) -> Result<Self, CdpError> {
        let target = resolve_page_target(cfg).await?;
        let ws_url = target
            .websocket_url
            .clone()
            .ok_or_else(|| CdpError::NoTargets {
                endpoint: cfg.http_base(),
            })?;

        let transport = WsTransport::connect(&ws_url, cfg.connect_timeout).await?;

        let client = Self {
            cfg: cfg.clone(),
            target,
            transport,
        };

        for domain in ["Page.enable", "DOM.enable", "Runtime.enable"] {
            client.command(domain, json!({})).await?;
        }

        info!(
            target: "cdp-client",
            target_id = %client.target.id,
            url = %client.target.url,
            "connected to page target"
        );
        Ok(client)
    }

    /// Whether the underlying connection is still believed to be live.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Identifier of the attached page target.
    pub fn target_id(&self) -> &str {
        &self.target.id
    }

    async fn command(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        self.transport
            .send_command(method, params, self.cfg.command_timeout)
            .await
    }

    /// Navigate the page and wait (bounded) for the load event.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let mut events = self.transport.subscribe();

        let result = self.command("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(CdpError::protocol("Page.navigate", error_text));
            }
        }

        let wait = tokio::time::timeout(self.cfg.load_timeout, async {
            while let Ok(event) = events.recv().await {
                if event.method == "Page.loadEventFired" {
                    return;
                }
            }
        });
        if wait.await.is_err() {
            debug!(target: "cdp-client", url, "load event not observed before deadline, continuing");
        }

        Ok(())
    }

    /// Evaluate a script in page context and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("evaluation threw");
            return Err(CdpError::protocol("Runtime.evaluate", text));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// URL the page currently shows.
    pub async fn current_url(&self) -> Result<String, CdpError> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Fill the first element matching `selector` with `value`, firing the
    /// input/change events frameworks listen for. Returns false when no
    /// element matched.
    pub async fn fill(&self, selector: &str, value: &str) -> Result<bool, CdpError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector),
            val = js_string(value),
        );
        let result = self.evaluate(&script).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Click the first element matching `selector`. Returns false when no
    /// element matched.
    pub async fn click(&self, selector: &str) -> Result<bool, CdpError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            sel = js_string(selector),
        );
        let result = self.evaluate(&script).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    /// Capture the page's HTML. Strategies, in order: resource-tree content
    /// retrieval; in-page serialization of the document element; a raw DOM
    /// snapshot. First non-empty result wins.
    pub async fn capture_page(&self) -> Result<String, CdpError> {
        match self.capture_via_resource_tree().await {
            Ok(html) if !html.trim().is_empty() => return Ok(html),
            Ok(_) => debug!(target: "cdp-client", "resource tree capture was empty"),
            Err(err) => debug!(target: "cdp-client", %err, "resource tree capture failed"),
        }

        match self.capture_via_outer_html().await {
            Ok(html) if !html.trim().is_empty() => return Ok(html),
            Ok(_) => debug!(target: "cdp-client", "outerHTML capture was empty"),
            Err(err) => debug!(target: "cdp-client", %err, "outerHTML capture failed"),
        }

        match self.capture_via_dom_snapshot().await {
            Ok(html) if !html.trim().is_empty() => return Ok(html),
            Ok(_) | Err(_) => {
                warn!(target: "cdp-client", url = %self.target.url, "all capture strategies failed");
                Err(CdpError::Capture {
                    url: self.target.url.clone(),
                })
            }
        }
    }

    async fn capture_via_resource_tree(&self) -> Result<String, CdpError> {
        let tree = self.command("Page.getResourceTree", json!({})).await?;
        let frame_id = tree
            .pointer("/frameTree/frame/id")
            .and_then(Value::as_str)
            .ok_or_else(|| CdpError::protocol("Page.getResourceTree", "missing frame id"))?;
        let frame_url = tree
            .pointer("/frameTree/frame/url")
            .and_then(Value::as_str)
            .ok_or_else(|| CdpError::protocol("Page.getResourceTree", "missing frame url"))?;

        let content = self
            .command(
                "Page.getResourceContent",
                json!({ "frameId": frame_id, "url": frame_url }),
            )
            .await?;

        let body = content
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if content
            .get("base64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let bytes = Base64
                .decode(body)
                .map_err(|err| CdpError::protocol("Page.getResourceContent", err))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(body.to_string())
        }
    }

    async fn capture_via_outer_html(&self) -> Result<String, CdpError> {
        let value = self
            .evaluate("document.documentElement.outerHTML")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn capture_via_dom_snapshot(&self) -> Result<String, CdpError> {
        let snapshot = self
            .command(
                "DOMSnapshot.captureSnapshot",
                json!({ "computedStyles": [] }),
            )
            .await?;
        Ok(flatten_dom_snapshot(&snapshot))
    }

}

/// Serialize a string as a JS string literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Crude last-resort serialization of a `DOMSnapshot.captureSnapshot` result.
/// Rebuilds tag soup from the string table; enough for the reducer to find
/// text and form controls when both richer strategies fail.
fn flatten_dom_snapshot(snapshot: &Value) -> String {
    let strings: Vec<&str> = snapshot
        .get("strings")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(document) = snapshot.pointer("/documents/0/nodes") else {
        return String::new();
    };

    let names = document
        .get("nodeName")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let values = document
        .get("nodeValue")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let lookup = |idx: &Value| -> Option<&str> {
        let i = idx.as_i64()?;
        if i < 0 {
            return None;
        }
        strings.get(i as usize).copied()
    };

    let mut out = String::new();
    for (name_idx, value_idx) in names.iter().zip(values.iter()) {
        match lookup(name_idx) {
            Some("#text") => {
                if let Some(text) = lookup(value_idx) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        out.push_str(trimmed);
                        out.push(' ');
                    }
                }
            }
            Some(name) if !name.starts_with('#') => {
                out.push_str(&format!("<{}>", name.to_ascii_lowercase()));
            }
            _ => {}
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn flatten_snapshot_recovers_text_and_tags() {
        let snapshot = json!({
            "strings": ["HTML", "BODY", "#text", "Welcome back"],
            "documents": [{
                "nodes": {
                    "nodeName": [0, 1, 2],
                    "nodeValue": [-1, -1, 3]
                }
            }]
        });
        let flat = flatten_dom_snapshot(&snapshot);
        assert!(flat.contains("<html>"));
        assert!(flat.contains("Welcome back"));
    }

    #[test]
    fn flatten_snapshot_tolerates_missing_documents() {
        assert_eq!(flatten_dom_snapshot(&json!({})), "");
    }
}
