//! Telephony media-stream message types.
//!
//! Inbound frames are JSON objects tagged by `event`:
//! - connected - Socket opened, nothing to do
//! - start - Stream started, carries the `streamSid`
//! - media - One base64 audio frame
//! - mark - Playback marker acknowledgement
//! - stop - Stream ended
//!
//! The relay sends only `media` frames back.

use serde::{Deserialize, Serialize};

/// Events received from the telephony media stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CallerEvent {
    Connected {},
    Start { start: StreamStart },
    Media { media: MediaPayload },
    Mark {},
    Stop {},
    #[serde(other)]
    Other,
}

/// Payload of a `start` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
}

/// Base64 audio carried by a `media` frame in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// Frames sent back to the telephony media stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CallerOutbound {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
}

impl CallerOutbound {
    /// A `media` frame for the given stream.
    pub fn media(stream_sid: impl Into<String>, payload: String) -> Self {
        CallerOutbound::Media {
            stream_sid: stream_sid.into(),
            media: MediaPayload { payload },
        }
    }
}
