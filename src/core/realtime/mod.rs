//! Realtime speech model transport.
//!
//! - `config`: model, voice and audio-format enums plus per-session settings
//! - `messages`: wire events and the closed [`ModelEvent`] set the relay consumes
//! - `client`: [`RealtimeConnection`], a WebSocket task with channel endpoints

mod client;
mod config;
mod error;
mod messages;

pub use client::{RealtimeConnection, RealtimeTask};
pub use config::{
    AudioFormat, DEFAULT_INSTRUCTIONS, DEFAULT_SILENCE_DURATION_MS, DEFAULT_TRANSCRIPTION_MODEL,
    DEFAULT_VAD_THRESHOLD, Modality, OPENAI_REALTIME_URL, RealtimeModel, RealtimeSettings,
    RealtimeVoice,
};
pub use error::{RealtimeError, RealtimeResult};
pub use messages::{
    ApiError, ClientEvent, InputAudioTranscription, ModelEvent, ResponseConfig, ServerEvent,
    SessionConfig, TurnDetection,
};
