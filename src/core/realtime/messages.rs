//! Realtime model WebSocket message types.
//!
//! Only the subset of the protocol the relay speaks is modelled. Every event
//! is a JSON object tagged by `type`.
//!
//! Client events (sent to the model):
//! - session.update - Configure the session
//! - input_audio_buffer.append - Append caller audio
//! - input_audio_buffer.commit - Commit the pending caller audio
//! - response.create - Ask the model to speak
//!
//! Server events (received from the model):
//! - session.created / session.updated - Session acknowledged
//! - response.input_text.final - Final transcript of the caller's turn
//! - conversation.item.input_audio_transcription.completed - Same, via input transcription
//! - response.audio.delta - Audio data chunk
//! - input_audio_buffer.speech_stopped - VAD detected end of speech
//! - error - Error occurred
//!
//! Anything else deserializes to [`ServerEvent::Other`] and is ignored.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::config::{AudioFormat, Modality, RealtimeVoice};
use crate::core::codec::{self, CodecResult};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration carried by `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub modalities: Vec<Modality>,
    pub instructions: String,
    pub voice: RealtimeVoice,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,
    pub turn_detection: TurnDetection,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        threshold: f32,
        /// Trailing silence in ms
        silence_duration_ms: u32,
    },
}

/// Response parameters for `response.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub instructions: String,
}

// =============================================================================
// Client Events (sent to the model)
// =============================================================================

/// Instructions sent to the model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseConfig },
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: codec::encode(data),
        }
    }

    /// Create a `response.create` carrying only instructions.
    pub fn response_with(instructions: impl Into<String>) -> Self {
        ClientEvent::ResponseCreate {
            response: ResponseConfig {
                instructions: instructions.into(),
            },
        }
    }

    /// Wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
            Self::ResponseCreate { .. } => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from the model)
// =============================================================================

/// Server events as they appear on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated {},

    #[serde(rename = "session.updated")]
    SessionUpdated {},

    #[serde(rename = "response.input_text.final")]
    InputTextFinal { text: String },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted { transcript: String },

    /// Audio delta (audio data chunk)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio delta
        delta: String,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    /// Any event the relay does not consume
    #[serde(other)]
    Other,
}

/// API error information.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}): {}", self.error_type, code, self.message),
            None => write!(f, "{}: {}", self.error_type, self.message),
        }
    }
}

// =============================================================================
// Model events
// =============================================================================

/// The closed set of model events the relay reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    SessionReady,
    TranscriptFinal(String),
    /// Decoded audio chunk, in arrival order.
    AudioDelta(Bytes),
    SpeechStopped,
    Error(ApiError),
}

impl ModelEvent {
    /// Map a wire event onto the relay's event set.
    ///
    /// Returns `Ok(None)` for events the relay ignores and an error when an
    /// audio delta carries malformed base64.
    pub fn from_server_event(event: ServerEvent) -> CodecResult<Option<Self>> {
        let mapped = match event {
            ServerEvent::Error { error } => Some(Self::Error(error)),
            ServerEvent::SessionCreated {} | ServerEvent::SessionUpdated {} => {
                Some(Self::SessionReady)
            }
            ServerEvent::InputTextFinal { text } => Some(Self::TranscriptFinal(text)),
            ServerEvent::TranscriptionCompleted { transcript } => {
                Some(Self::TranscriptFinal(transcript))
            }
            ServerEvent::AudioDelta { delta } => Some(Self::AudioDelta(codec::decode(&delta)?)),
            ServerEvent::SpeechStopped { .. } => Some(Self::SpeechStopped),
            ServerEvent::Other => None,
        };
        Ok(mapped)
    }
}
