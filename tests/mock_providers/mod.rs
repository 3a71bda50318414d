//! Mock collaborators for integration tests
//!
//! - `realtime_mock`: a scripted realtime model WebSocket server
//! - `retrieval_mock`: a retrieval gateway that records its calls

// Allow dead code in test infrastructure - not every test file uses every helper
#![allow(dead_code)]

pub mod realtime_mock;
pub mod retrieval_mock;

use rag_voice_relay::core::codec;
use serde_json::{Value, json};

/// A telephony `start` frame.
pub fn start_frame(stream_sid: &str) -> String {
    json!({
        "event": "start",
        "sequenceNumber": "1",
        "start": {
            "streamSid": stream_sid,
            "callSid": "CA0000",
            "tracks": ["inbound"],
            "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
        },
        "streamSid": stream_sid
    })
    .to_string()
}

/// A telephony `media` frame carrying `raw_len` bytes of u-law silence.
pub fn media_frame(stream_sid: &str, raw_len: usize) -> String {
    media_frame_with_payload(stream_sid, &codec::encode(&vec![0xFFu8; raw_len]))
}

pub fn media_frame_with_payload(stream_sid: &str, payload: &str) -> String {
    json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": {"track": "inbound", "chunk": "1", "timestamp": "5", "payload": payload}
    })
    .to_string()
}

pub fn stop_frame(stream_sid: &str) -> String {
    json!({"event": "stop", "streamSid": stream_sid, "stop": {"callSid": "CA0000"}}).to_string()
}

/// `type` field of a JSON event.
pub fn event_type(value: &Value) -> &str {
    value["type"].as_str().unwrap_or_default()
}
