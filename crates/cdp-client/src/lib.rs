//! CDP Client: a single-connection request/response multiplexer for a
//! browser's DevTools endpoint. Correlates numbered commands with their
//! replies and fans unsolicited events out to named listeners.

mod error;
mod wire;

pub use error::{CdpError, CdpErrorKind};
pub use wire::{InboundFrame, RemoteError};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// A decoded event delivered to a registered listener.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

enum Outbound {
    Command {
        id: u64,
        method: String,
        params: Value,
        session_id: Option<String>,
        responder: oneshot::Sender<Result<Value, CdpError>>,
    },
    Disconnect {
        done: oneshot::Sender<()>,
    },
}

struct Listeners {
    // Registration order matters: a single method name may have multiple
    // listeners, invoked in the order they were registered.
    by_method: HashMap<String, Vec<mpsc::UnboundedSender<CdpEvent>>>,
}

impl Listeners {
    fn new() -> Self {
        Self {
            by_method: HashMap::new(),
        }
    }

    fn dispatch(&mut self, event: CdpEvent) {
        if let Some(senders) = self.by_method.get_mut(&event.method) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

/// Handle to a connected CDP transport. Cheap to clone; clones share the
/// same background reader/writer task and pending-command table.
#[derive(Clone)]
pub struct CdpClient {
    outbound_tx: mpsc::Sender<Outbound>,
    next_id: Arc<AtomicU64>,
    listeners: Arc<Mutex<Listeners>>,
    reader_task: Arc<JoinHandle<()>>,
    closed: Arc<std::sync::atomic::AtomicBool>,
}

impl CdpClient {
    /// Opens the transport against `ws_url` and starts the background
    /// reader/writer loop.
    pub async fn connect(ws_url: &str) -> Result<Self, CdpError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|err| CdpError::new(CdpErrorKind::Io).with_hint(err.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(256);
        let listeners = Arc::new(Mutex::new(Listeners::new()));
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let listeners_for_loop = listeners.clone();
        let closed_for_loop = closed.clone();

        let reader_task = tokio::spawn(async move {
            let mut inflight: HashMap<u64, oneshot::Sender<Result<Value, CdpError>>> =
                HashMap::new();

            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(Outbound::Command { id, method, params, session_id, responder }) => {
                                let envelope = wire::CommandEnvelope { id, method, params, session_id };
                                let text = match serde_json::to_string(&envelope) {
                                    Ok(t) => t,
                                    Err(err) => {
                                        let _ = responder.send(Err(CdpError::new(CdpErrorKind::Internal).with_hint(err.to_string())));
                                        continue;
                                    }
                                };
                                if let Err(err) = sink.send(WsMessage::Text(text)).await {
                                    let _ = responder.send(Err(CdpError::new(CdpErrorKind::Io).with_hint(err.to_string())));
                                    continue;
                                }
                                inflight.insert(id, responder);
                            }
                            Some(Outbound::Disconnect { done }) => {
                                closed_for_loop.store(true, Ordering::SeqCst);
                                let cancelled = CdpError::new(CdpErrorKind::Cancelled).with_hint("disconnect requested");
                                for (_, responder) in inflight.drain() {
                                    let _ = responder.send(Err(cancelled.clone()));
                                }
                                let _ = done.send(());
                                break;
                            }
                            None => break,
                        }
                    }
                    message = stream.next() => {
                        match message {
                            Some(Ok(WsMessage::Text(text))) => {
                                match InboundFrame::parse(&text) {
                                    Some(InboundFrame::Reply { id, result, error }) => {
                                        if let Some(responder) = inflight.remove(&id) {
                                            let outcome = match error {
                                                Some(e) => Err(CdpError::new(CdpErrorKind::Remote)
                                                    .with_hint(format!("{}: {}", e.code, e.message))
                                                    .retriable(e.code >= 500)),
                                                None => Ok(result.unwrap_or(Value::Null)),
                                            };
                                            let _ = responder.send(outcome);
                                        }
                                    }
                                    Some(InboundFrame::Event { method, params, session_id }) => {
                                        let mut guard = listeners_for_loop.lock().await;
                                        guard.dispatch(CdpEvent { method, params, session_id });
                                    }
                                    None => {
                                        tracing::debug!(target: "cdp_client", "unparsable frame");
                                    }
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                tracing::warn!(target: "cdp_client", ?err, "websocket read error");
                                break;
                            }
                        }
                    }
                }
            }

            closed_for_loop.store(true, Ordering::SeqCst);
            let cancelled = CdpError::new(CdpErrorKind::Cancelled).with_hint("transport closed");
            for (_, responder) in inflight.drain() {
                let _ = responder.send(Err(cancelled.clone()));
            }
        });

        Ok(Self {
            outbound_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            listeners,
            reader_task: Arc::new(reader_task),
            closed,
        })
    }

    /// Sends `{id, method, params}` and awaits the framed reply carrying
    /// the same id. Fails with `Timeout` after 10s, `Closed` if the
    /// transport has gone away.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        self.send_scoped(method, params, None).await
    }

    /// Same as `send`, but scoped to a CDP-level session (flattened
    /// `sessionId` field) rather than the top-level browser target.
    pub async fn send_in_session(
        &self,
        session_id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, CdpError> {
        self.send_scoped(method, params, Some(session_id.to_string()))
            .await
    }

    async fn send_scoped(
        &self,
        method: &str,
        params: Value,
        session_id: Option<String>,
    ) -> Result<Value, CdpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CdpError::new(CdpErrorKind::Closed).with_hint("send after disconnect"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (responder, response_rx) = oneshot::channel();
        let started = std::time::Instant::now();

        self.outbound_tx
            .send(Outbound::Command {
                id,
                method: method.to_string(),
                params,
                session_id,
                responder,
            })
            .await
            .map_err(|_| CdpError::new(CdpErrorKind::Closed).with_hint("writer task gone"))?;

        let outcome = match tokio::time::timeout(COMMAND_TIMEOUT, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::new(CdpErrorKind::Closed).with_hint("responder dropped")),
            Err(_) => Err(CdpError::new(CdpErrorKind::Timeout)
                .with_hint(format!("{method} did not reply within {COMMAND_TIMEOUT:?}"))),
        };
        engine_metrics::observe_cdp_command(method, started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    /// Registers a listener for unsolicited events named `method`. Returns
    /// a receiver that yields every matching event in delivery order; a
    /// second registration for the same method is invoked after the first
    /// (registration order).
    pub async fn on_event(&self, method: &str) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.listeners.lock().await;
        guard.by_method.entry(method.to_string()).or_default().push(tx);
        rx
    }

    /// Cancels all pending commands with `Cancelled` and tears down the
    /// reader task. Routes through the same `Outbound` channel commands
    /// use so the drain happens on the reader task itself, rather than
    /// aborting it out from under in-flight responders.
    pub async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let (done_tx, done_rx) = oneshot::channel();
        if self.outbound_tx.send(Outbound::Disconnect { done: done_tx }).await.is_ok() {
            let _ = done_rx.await;
        }
        self.reader_task.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_dispatch_respects_registration_order() {
        let mut listeners = Listeners::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        listeners.by_method.insert(
            "Page.frameNavigated".to_string(),
            vec![tx1, tx2],
        );

        listeners.dispatch(CdpEvent {
            method: "Page.frameNavigated".to_string(),
            params: Value::Null,
            session_id: None,
        });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn dispatch_to_unregistered_method_is_noop() {
        let mut listeners = Listeners::new();
        listeners.dispatch(CdpEvent {
            method: "Network.requestWillBeSent".to_string(),
            params: Value::Null,
            session_id: None,
        });
    }
}
