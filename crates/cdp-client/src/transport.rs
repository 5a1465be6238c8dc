//! Framed JSON-RPC command/response transport over the debugger WebSocket.
//!
//! A single loop task owns the socket: commands arrive on a channel, are
//! assigned monotonically increasing call ids and written out; responses are
//! correlated back to in-flight callers; protocol events fan out on a
//! best-effort broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::CdpError;

/// A protocol event pushed by the browser (e.g. `Page.loadEventFired`).
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

struct ControlMessage {
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value, CdpError>>,
}

/// Live connection to one page target.
pub struct WsTransport {
    command_tx: mpsc::Sender<ControlMessage>,
    event_tx: broadcast::Sender<CdpEvent>,
    loop_task: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl WsTransport {
    /// Open the WebSocket and spawn the correlation loop.
    pub async fn connect(ws_url: &str, connect_timeout: Duration) -> Result<Self, CdpError> {
        let handshake = tokio::time::timeout(connect_timeout, connect_async(ws_url))
            .await
            .map_err(|_| CdpError::connection(ws_url, "websocket handshake timed out"))?;
        let (stream, _) = handshake.map_err(|err| CdpError::connection(ws_url, err))?;

        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(256);

        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = alive.clone();
        let loop_events = event_tx.clone();

        let loop_task = tokio::spawn(async move {
            if let Err(err) = run_loop(stream, command_rx, loop_events).await {
                warn!(target: "cdp-client", %err, "transport loop terminated");
            }
            loop_alive.store(false, Ordering::Relaxed);
        });

        Ok(Self {
            command_tx,
            event_tx,
            loop_task,
            alive,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Subscribe to protocol events. Lagging subscribers lose old events.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.event_tx.subscribe()
    }

    /// Issue one command and await its response within `deadline`.
    pub async fn send_command(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, CdpError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let message = ControlMessage {
            method: method.to_string(),
            params,
            responder: resp_tx,
        };

        self.command_tx
            .send(message)
            .await
            .map_err(|_| CdpError::Transport("command channel closed".to_string()))?;

        match tokio::time::timeout(deadline, resp_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::Transport(
                "response channel closed before reply".to_string(),
            )),
            Err(_) => Err(CdpError::Timeout {
                method: method.to_string(),
            }),
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();
    }
}

async fn run_loop(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut command_rx: mpsc::Receiver<ControlMessage>,
    event_tx: broadcast::Sender<CdpEvent>,
) -> Result<(), CdpError> {
    let (mut sink, mut source) = stream.split();
    let mut inflight: HashMap<u64, oneshot::Sender<Result<Value, CdpError>>> = HashMap::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else {
                    // All senders dropped; close the socket and stop.
                    let _ = sink.close().await;
                    return Ok(());
                };
                let id = next_id;
                next_id += 1;
                let frame = json!({ "id": id, "method": cmd.method, "params": cmd.params });
                match sink.send(Message::Text(frame.to_string())).await {
                    Ok(()) => {
                        inflight.insert(id, cmd.responder);
                    }
                    Err(err) => {
                        let _ = cmd.responder.send(Err(CdpError::Transport(err.to_string())));
                        fail_inflight(&mut inflight, &err.to_string());
                        return Err(CdpError::Transport(err.to_string()));
                    }
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&text, &mut inflight, &event_tx);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        fail_inflight(&mut inflight, "cdp connection closed");
                        return Ok(());
                    }
                    Some(Err(err)) => {
                        fail_inflight(&mut inflight, &err.to_string());
                        return Err(CdpError::Transport(err.to_string()));
                    }
                }
            }
        }
    }
}

fn handle_frame(
    text: &str,
    inflight: &mut HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>,
    event_tx: &broadcast::Sender<CdpEvent>,
) {
    let message: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!(target: "cdp-client", %err, "discarding unparseable frame");
            return;
        }
    };

    if let Some(id) = message.get("id").and_then(Value::as_u64) {
        let Some(sender) = inflight.remove(&id) else {
            debug!(target: "cdp-client", id, "response for unknown call id");
            return;
        };
        let result = if let Some(error) = message.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let text = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            Err(CdpError::protocol(
                format!("call#{id}"),
                format!("{code}: {text}"),
            ))
        } else {
            Ok(message.get("result").cloned().unwrap_or(Value::Null))
        };
        let _ = sender.send(result);
    } else if let Some(method) = message.get("method").and_then(Value::as_str) {
        let event = CdpEvent {
            method: method.to_string(),
            params: message.get("params").cloned().unwrap_or(Value::Null),
        };
        // Best-effort fan-out; nobody listening is fine.
        let _ = event_tx.send(event);
    }
}

fn fail_inflight(
    inflight: &mut HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>,
    reason: &str,
) {
    for (_, sender) in inflight.drain() {
        let _ = sender.send(Err(CdpError::Transport(reason.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_setup() -> (
        HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>,
        broadcast::Sender<CdpEvent>,
    ) {
        (HashMap::new(), broadcast::channel(8).0)
    }

    #[tokio::test]
    async fn correlates_response_to_inflight_call() {
        let (mut inflight, event_tx) = drain_setup();
        let (tx, rx) = oneshot::channel();
        inflight.insert(7, tx);

        handle_frame(r#"{"id":7,"result":{"ok":true}}"#, &mut inflight, &event_tx);

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value["ok"], true);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn protocol_error_reaches_caller() {
        let (mut inflight, event_tx) = drain_setup();
        let (tx, rx) = oneshot::channel();
        inflight.insert(3, tx);

        handle_frame(
            r#"{"id":3,"error":{"code":-32000,"message":"No node found"}}"#,
            &mut inflight,
            &event_tx,
        );

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, CdpError::Protocol { .. }));
    }

    #[tokio::test]
    async fn events_fan_out_to_subscribers() {
        let (mut inflight, event_tx) = drain_setup();
        let mut rx = event_tx.subscribe();

        handle_frame(
            r#"{"method":"Page.loadEventFired","params":{"timestamp":1.0}}"#,
            &mut inflight,
            &event_tx,
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.method, "Page.loadEventFired");
    }

    #[tokio::test]
    async fn unparseable_frames_are_discarded() {
        let (mut inflight, event_tx) = drain_setup();
        let (tx, mut rx) = oneshot::channel();
        inflight.insert(1, tx);

        handle_frame("not json at all", &mut inflight, &event_tx);

        assert!(rx.try_recv().is_err());
        assert_eq!(inflight.len(), 1);
    }
}
