//! Media-stream WebSocket handler
//!
//! Each connection is one phone call. The handler opens a model session,
//! hands both transports to a [`CallRelay`] and tears everything down once the
//! relay returns.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, Stream, StreamExt, future, stream::SplitStream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::realtime::RealtimeConnection;
use crate::core::relay::{CallRelay, CallTransports};
use crate::core::telephony::CallerOutbound;
use crate::state::{AppState, CallSlot};

/// Channel buffer for frames going back to the caller
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long teardown waits for each socket to close.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

/// Media-stream WebSocket handler
///
/// The call slot reserved by the connection-limit middleware (if any) is held
/// until the call has been torn down.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<CallSlot>>,
) -> Response {
    debug!("Media stream upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            handle_media_socket(socket, state).await;
            drop(slot);
        })
}

async fn handle_media_socket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("Media stream connected");

    let api_key = match state.config.require_openai_api_key() {
        Ok(key) => key,
        Err(e) => {
            error!("Cannot open model session: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let connection = match RealtimeConnection::connect(&state.config.realtime, api_key).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to connect to realtime model: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut ws_sender, ws_receiver) = socket.split();
    let (caller_tx, mut caller_rx) = mpsc::channel::<CallerOutbound>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames. Ends, closing the socket, once the
    // relay drops its sender.
    let mut sender_task = tokio::spawn(async move {
        while let Some(frame) = caller_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize caller frame: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                warn!("Failed to send to caller: {}", e);
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    let (model_tx, model_rx, model_task) = connection.into_parts();

    let relay = CallRelay::new(
        state.policy.clone(),
        state.config.realtime.session_config(),
        state.retrieval.clone(),
    );

    let summary = relay
        .run(CallTransports {
            caller_inbound: caller_text_frames(ws_receiver),
            caller_outbound: caller_tx,
            model_outbound: model_tx,
            model_inbound: model_rx,
        })
        .await;

    // Cleanup
    if model_task.is_finished() {
        debug!(call_id = %summary.call_id, "Model socket already closed");
    }
    model_task.shutdown(TEARDOWN_GRACE).await;
    if tokio::time::timeout(TEARDOWN_GRACE, &mut sender_task)
        .await
        .is_err()
    {
        warn!(call_id = %summary.call_id, "Caller socket did not close in time, aborting");
        sender_task.abort();
    }

    info!(
        call_id = %summary.call_id,
        end_reason = ?summary.end_reason,
        "Media stream closed"
    );
}

/// Text frames from the caller, ending at the first close frame or socket error.
fn caller_text_frames(
    receiver: SplitStream<WebSocket>,
) -> impl Stream<Item = String> + Unpin + Send {
    receiver
        .take_while(|msg| {
            let open = match msg {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(e) => {
                    warn!("Caller WebSocket error: {}", e);
                    false
                }
            };
            future::ready(open)
        })
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        })
}
