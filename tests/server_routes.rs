//! HTTP routes and an end-to-end call through the media-stream WebSocket

mod mock_providers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use mock_providers::realtime_mock::MockRealtimeServer;
use mock_providers::retrieval_mock::{Behavior, RecordingGateway, SCHEME_PASSAGE};
use mock_providers::{event_type, media_frame, start_frame};
use rag_voice_relay::core::codec;
use rag_voice_relay::middleware::connection_limit_middleware;
use rag_voice_relay::{ServerConfig, routes, state::AppState};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

fn app(state: Arc<AppState>) -> Router {
    let media_routes = routes::media_stream::create_media_stream_router().layer(
        axum::middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );
    routes::api::create_api_router()
        .merge(media_routes)
        .with_state(state)
}

fn state_with(config: ServerConfig) -> Arc<AppState> {
    AppState::with_retrieval(config, RecordingGateway::new(Behavior::Answer))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app(state_with(ServerConfig::default()))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["active_calls"], 0);
}

#[tokio::test]
async fn test_voice_webhook_uses_host_header() {
    let request = Request::builder()
        .method("POST")
        .uri("/voice")
        .header(header::HOST, "abc123.ngrok.app")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA1&From=%2B14155550100"))
        .unwrap();

    let response = app(state_with(ServerConfig::default()))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    let body = body_string(response).await;
    assert!(body.contains("<Stream url=\"wss://abc123.ngrok.app/media-stream\"/>"));
}

#[tokio::test]
async fn test_voice_webhook_prefers_public_url() {
    let mut config = ServerConfig::default();
    config.public_url = Some("https://voice.example.com".to_string());

    let request = Request::builder()
        .method("POST")
        .uri("/voice")
        .header(header::HOST, "10.0.0.5:5050")
        .body(Body::empty())
        .unwrap();
    let response = app(state_with(config)).oneshot(request).await.unwrap();

    let body = body_string(response).await;
    assert!(body.contains("wss://voice.example.com/media-stream"));
}

#[tokio::test]
async fn test_voice_webhook_without_host_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/voice")
        .body(Body::empty())
        .unwrap();
    let response = app(state_with(ServerConfig::default()))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_media_stream_rejected_at_capacity() {
    let mut config = ServerConfig::default();
    config.max_concurrent_calls = Some(1);
    let state = state_with(config);
    let _held = state.try_acquire_call().unwrap();

    let request = Request::builder()
        .uri("/media-stream")
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

async fn wait_for<F: Fn() -> bool>(what: &str, pred: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !pred() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_call_end_to_end() {
    let model = MockRealtimeServer::start().await;

    let mut config = ServerConfig::default();
    config.openai_api_key = Some("sk-test".to_string());
    config.realtime.url = model.url.clone();
    config.relay.negotiation_delay = Duration::from_millis(50);
    let gateway = RecordingGateway::new(Behavior::Answer);
    let state = AppState::with_retrieval(config, gateway.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    let (mut caller, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/media-stream"))
        .await
        .unwrap();
    wait_for("call slot", || state.active_calls() == 1).await;

    caller
        .send(Message::Text(start_frame("MZ9").into()))
        .await
        .unwrap();
    caller
        .send(Message::Text(media_frame("MZ9", 1200).into()))
        .await
        .unwrap();

    let received = model
        .wait_until(|events| {
            events.iter().any(|e| event_type(e) == "input_audio_buffer.append")
                && events.iter().filter(|e| event_type(e) == "response.create").count() == 1
        })
        .await;
    assert_eq!(event_type(&received[0]), "session.update");
    assert_eq!(model.authorization().as_deref(), Some("Bearer sk-test"));

    model.push(json!({"type": "response.input_text.final", "text": "what is the scheme"}));
    model.push(json!({"type": "input_audio_buffer.speech_stopped", "audio_end_ms": 1500}));

    let received = model
        .wait_until(|events| {
            events.iter().filter(|e| event_type(e) == "response.create").count() == 3
        })
        .await;
    let commit = received
        .iter()
        .position(|e| event_type(e) == "input_audio_buffer.commit")
        .expect("commit sent");
    let answer = &received[commit + 1];
    assert_eq!(event_type(answer), "response.create");
    let instructions = answer["response"]["instructions"].as_str().unwrap();
    assert!(instructions.contains(SCHEME_PASSAGE));
    assert!(instructions.contains("what is the scheme"));
    assert_eq!(gateway.calls(), vec![("what is the scheme".to_string(), 3)]);

    model.push(json!({"type": "response.audio.delta", "delta": codec::encode(b"namaste")}));
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match caller.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str::<Value>(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("caller socket ended: {other:?}"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(frame["event"], "media");
    assert_eq!(frame["streamSid"], "MZ9");
    assert_eq!(frame["media"]["payload"], codec::encode(b"namaste"));

    caller.close(None).await.unwrap();
    wait_for("call teardown", || state.active_calls() == 0).await;
}
