//! Model transport client.
//!
//! One spawned task owns the WebSocket. Outgoing [`ClientEvent`]s arrive on a
//! bounded channel and are written in order. Incoming frames are parsed into
//! [`ModelEvent`]s and forwarded in arrival order. The task stops when the
//! socket closes, when every sender is dropped, or when the connection is
//! cancelled; the event channel then closes, which is how the relay learns
//! the transport is gone.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: G.711 u-law, base64 encoded

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::config::RealtimeSettings;
use super::error::{RealtimeError, RealtimeResult};
use super::messages::{ClientEvent, ModelEvent, ServerEvent};

/// Channel capacity for outgoing model instructions.
const WS_CHANNEL_CAPACITY: usize = 256;

/// An open model session.
pub struct RealtimeConnection {
    sender: mpsc::Sender<ClientEvent>,
    events: mpsc::UnboundedReceiver<ModelEvent>,
    task: RealtimeTask,
}

impl RealtimeConnection {
    /// Open a WebSocket to the model endpoint.
    pub async fn connect(settings: &RealtimeSettings, api_key: &str) -> RealtimeResult<Self> {
        if api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "model API key is empty".to_string(),
            ));
        }

        let url = settings.ws_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(model = %settings.model, "Connected to realtime model endpoint");
        Ok(Self::from_stream(ws_stream))
    }

    /// Drive an already-established WebSocket.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        // Unbounded: the socket reader never waits on the relay.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ModelEvent>();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_socket(ws_stream, rx, event_tx, cancel.clone()));

        Self {
            sender: tx,
            events: event_rx,
            task: RealtimeTask {
                cancel,
                handle: Some(handle),
            },
        }
    }

    /// Split into the instruction sender, the event receiver and the task handle.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<ClientEvent>,
        mpsc::UnboundedReceiver<ModelEvent>,
        RealtimeTask,
    ) {
        (self.sender, self.events, self.task)
    }
}

/// Handle to the socket task. Dropping it cancels the task.
pub struct RealtimeTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RealtimeTask {
    /// Cancel the socket task and wait up to `grace` for it to close the
    /// WebSocket. The task is aborted if it does not finish in time.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("Model socket task did not stop in time, aborting");
                handle.abort();
            }
        }
    }

    /// Whether the socket task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for RealtimeTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_socket<S>(
    ws_stream: WebSocketStream<S>,
    mut rx: mpsc::Receiver<ClientEvent>,
    event_tx: mpsc::UnboundedSender<ModelEvent>,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Model connection cancelled");
                break;
            }

            outgoing = rx.recv() => {
                let Some(event) = outgoing else {
                    debug!("All model senders dropped");
                    break;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize {}: {}", event.kind(), e);
                        continue;
                    }
                };
                trace!(kind = event.kind(), "-> model");
                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    warn!("Failed to send to model: {}", e);
                    break;
                }
            }

            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let server_event = match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                warn!("Failed to parse model event: {}", e);
                                continue;
                            }
                        };
                        match ModelEvent::from_server_event(server_event) {
                            Ok(Some(event)) => {
                                if event_tx.send(event).is_err() {
                                    debug!("Model event receiver dropped");
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => warn!("Dropping model audio delta: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Model endpoint closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Model WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Model WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    let _ = ws_sink.close().await;
}
