//! Realtime model mock server
//!
//! Accepts one WebSocket connection, records every JSON event it receives and
//! answers through a script. Tests can also push server events at any time.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Maps one received client event to the server events sent back.
pub type Script = Box<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

enum Push {
    Event(Value),
    Close,
}

pub struct MockRealtimeServer {
    /// Base URL to put in `RealtimeSettings::url`
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
    authorization: Arc<Mutex<Option<String>>>,
    push_tx: mpsc::UnboundedSender<Push>,
}

impl MockRealtimeServer {
    /// Start a server that never answers on its own.
    pub async fn start() -> Self {
        Self::with_script(Box::new(|_| Vec::new())).await
    }

    pub async fn with_script(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let authorization = Arc::new(Mutex::new(None));
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        tokio::spawn(serve_one(
            listener,
            script,
            received.clone(),
            authorization.clone(),
            push_rx,
        ));

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            received,
            authorization,
            push_tx,
        }
    }

    /// Send a server event to the connected client.
    pub fn push(&self, event: Value) {
        let _ = self.push_tx.send(Push::Event(event));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.push_tx.send(Push::Close);
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    pub fn authorization(&self) -> Option<String> {
        self.authorization.lock().clone()
    }

    /// Poll until `pred` holds for the received events, panicking after 5 s.
    pub async fn wait_until<F>(&self, pred: F) -> Vec<Value>
    where
        F: Fn(&[Value]) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            {
                let received = self.received.lock();
                if pred(&received) {
                    return received.clone();
                }
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for model events, got {:?}",
                self.received()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve_one(
    listener: TcpListener,
    script: Script,
    received: Arc<Mutex<Vec<Value>>>,
    authorization: Arc<Mutex<Option<String>>>,
    mut push_rx: mpsc::UnboundedReceiver<Push>,
) {
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };

    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        *authorization.lock() = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(response)
    };
    let Ok(ws_stream) = accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let replies = script(&value);
                    received.lock().push(value);
                    for reply in replies {
                        if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            push = push_rx.recv() => match push {
                Some(Push::Event(value)) => {
                    if write.send(Message::Text(value.to_string().into())).await.is_err() {
                        return;
                    }
                }
                Some(Push::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            },
        }
    }
}
