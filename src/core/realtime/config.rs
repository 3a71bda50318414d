//! Realtime model endpoint configuration types.
//!
//! - Model selection
//! - Voice selection
//! - Audio format
//! - Session settings sent with `session.update`

use serde::{Deserialize, Serialize};

use super::messages::{InputAudioTranscription, SessionConfig, TurnDetection};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default VAD activation threshold.
pub const DEFAULT_VAD_THRESHOLD: f32 = 0.5;

/// Default trailing silence before the VAD reports a speech stop.
pub const DEFAULT_SILENCE_DURATION_MS: u32 = 700;

/// Default transcription model for caller audio.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Default system instructions for a policy-assistant call.
pub const DEFAULT_INSTRUCTIONS: &str = "You are an Indian Government Policy Voice Assistant.\n\
STRICT RULES (DO NOT BREAK):\n\
1. Speak in simple Hinglish.\n\
2. Answer in ONLY 2 to 3 short sentences.\n\
3. Do NOT give extra details or explanations.\n\
4. Answer ONLY from official policy context.\n\
5. ALWAYS end with exactly: 'Kya aapka koi aur sawal hai?'\n\
6. Do NOT greet again after first message.";

// =============================================================================
// Models
// =============================================================================

/// Supported realtime models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RealtimeModel {
    /// GPT-4o Realtime Preview 2024-12-17
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview-2024-12-17")]
    Gpt4oRealtimePreview20241217,
    /// GPT-4o Realtime Preview (rolling alias)
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Mini Realtime Preview 2024-12-17
    #[serde(rename = "gpt-4o-mini-realtime-preview-2024-12-17")]
    Gpt4oMiniRealtimePreview20241217,
}

impl RealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oMiniRealtimePreview20241217 => "gpt-4o-mini-realtime-preview-2024-12-17",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4o-realtime-preview-2024-12-17" => Self::Gpt4oRealtimePreview20241217,
            "gpt-4o-realtime-preview" => Self::Gpt4oRealtimePreview,
            "gpt-4o-mini-realtime-preview-2024-12-17" => Self::Gpt4oMiniRealtimePreview20241217,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for RealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Available output voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl RealtimeVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ash" => Self::Ash,
            "ballad" => Self::Ballad,
            "coral" => Self::Coral,
            "echo" => Self::Echo,
            "sage" => Self::Sage,
            "shimmer" => Self::Shimmer,
            "verse" => Self::Verse,
            _ => Self::Alloy,
        }
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio formats accepted by the model endpoint.
///
/// Telephony media streams carry 8kHz u-law, so that is the default here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    /// G.711 u-law (8-bit, 8kHz)
    #[default]
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law (8-bit, 8kHz)
    #[serde(rename = "g711_alaw")]
    G711Alaw,
    /// PCM 16-bit signed little-endian, 24kHz
    #[serde(rename = "pcm16")]
    Pcm16,
}

impl AudioFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
            Self::Pcm16 => "pcm16",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "g711_alaw" | "alaw" => Self::G711Alaw,
            "pcm16" | "pcm" | "linear16" => Self::Pcm16,
            _ => Self::G711Ulaw,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

// =============================================================================
// Session settings
// =============================================================================

/// Everything needed to open and configure one model session.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    /// WebSocket endpoint, without the `model` query parameter.
    pub url: String,
    pub model: RealtimeModel,
    pub voice: RealtimeVoice,
    /// Used for both input and output audio.
    pub audio_format: AudioFormat,
    pub instructions: String,
    pub vad_threshold: f32,
    pub silence_duration_ms: u32,
    /// Caller-audio transcription model. `None` disables transcription.
    pub transcription_model: Option<String>,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            model: RealtimeModel::default(),
            voice: RealtimeVoice::default(),
            audio_format: AudioFormat::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            vad_threshold: DEFAULT_VAD_THRESHOLD,
            silence_duration_ms: DEFAULT_SILENCE_DURATION_MS,
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        }
    }
}

impl RealtimeSettings {
    /// Full WebSocket URL including the model query parameter.
    pub fn ws_url(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, separator, self.model.as_str())
    }

    /// The fixed session policy: audio in and out, telephony codec both ways,
    /// server-side VAD.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: vec![Modality::Audio, Modality::Text],
            instructions: self.instructions.clone(),
            voice: self.voice,
            input_audio_format: self.audio_format,
            output_audio_format: self.audio_format,
            input_audio_transcription: self
                .transcription_model
                .as_ref()
                .map(|model| InputAudioTranscription {
                    model: model.clone(),
                }),
            turn_detection: TurnDetection::ServerVad {
                threshold: self.vad_threshold,
                silence_duration_ms: self.silence_duration_ms,
            },
        }
    }
}
