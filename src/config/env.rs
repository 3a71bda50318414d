use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_RPS, ServerConfig,
    TlsConfig,
};
use crate::core::realtime::{AudioFormat, RealtimeModel, RealtimeSettings, RealtimeVoice};
use crate::core::relay::RelayPolicy;
use crate::core::retrieval::{
    DEFAULT_CHROMA_COLLECTION, DEFAULT_CHROMA_URL, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OPENAI_API_BASE,
};
use crate::core::telephony::TWILIO_API_BASE;

/// Read a variable, treating empty values as unset.
pub(super) fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable. Unset is `Ok(None)`, unparseable is an error.
pub(super) fn parse_var<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key}: '{raw}' ({e})")),
    }
}

fn tls_from_env() -> Result<Option<TlsConfig>, String> {
    match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string()),
    }
}

fn realtime_from_env() -> Result<RealtimeSettings, String> {
    let defaults = RealtimeSettings::default();
    Ok(RealtimeSettings {
        url: var("OPENAI_REALTIME_URL").unwrap_or(defaults.url),
        model: var("OPENAI_REALTIME_MODEL")
            .map(|m| RealtimeModel::from_str_or_default(&m))
            .unwrap_or(defaults.model),
        voice: var("OPENAI_REALTIME_VOICE")
            .map(|v| RealtimeVoice::from_str_or_default(&v))
            .unwrap_or(defaults.voice),
        audio_format: var("REALTIME_AUDIO_FORMAT")
            .map(|f| AudioFormat::from_str_or_default(&f))
            .unwrap_or(defaults.audio_format),
        instructions: var("REALTIME_INSTRUCTIONS").unwrap_or(defaults.instructions),
        vad_threshold: parse_var("VAD_THRESHOLD")?.unwrap_or(defaults.vad_threshold),
        silence_duration_ms: parse_var("VAD_SILENCE_DURATION_MS")?
            .unwrap_or(defaults.silence_duration_ms),
        transcription_model: match env::var("TRANSCRIPTION_MODEL") {
            Ok(model) if model.trim().is_empty() => None,
            Ok(model) => Some(model),
            Err(_) => defaults.transcription_model,
        },
    })
}

fn relay_from_env() -> Result<RelayPolicy, String> {
    let defaults = RelayPolicy::default();
    Ok(RelayPolicy {
        min_audio_bytes: parse_var("MIN_AUDIO_BYTES")?.unwrap_or(defaults.min_audio_bytes),
        top_k: parse_var("RETRIEVAL_TOP_K")?.unwrap_or(defaults.top_k),
        negotiation_delay: parse_var::<u64>("NEGOTIATION_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.negotiation_delay),
        retrieval_timeout: parse_var::<u64>("RETRIEVAL_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retrieval_timeout),
        greeting: var("GREETING_TEXT").unwrap_or(defaults.greeting),
        filler: var("FILLER_TEXT").unwrap_or(defaults.filler),
        closing_phrase: var("CLOSING_PHRASE").unwrap_or(defaults.closing_phrase),
        fallback: var("FALLBACK_TEXT").unwrap_or(defaults.fallback),
    })
}

/// Build the configuration from environment variables, falling back to defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, String> {
    Ok(ServerConfig {
        host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
        tls: tls_from_env()?,
        public_url: var("PUBLIC_URL"),

        openai_api_key: var("OPENAI_API_KEY"),
        realtime: realtime_from_env()?,
        relay: relay_from_env()?,

        chroma_url: var("CHROMA_URL").unwrap_or_else(|| DEFAULT_CHROMA_URL.to_string()),
        chroma_collection: var("CHROMA_COLLECTION")
            .unwrap_or_else(|| DEFAULT_CHROMA_COLLECTION.to_string()),
        embedding_model: var("EMBEDDING_MODEL")
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        openai_api_base: var("OPENAI_API_BASE")
            .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),

        twilio_account_sid: var("TWILIO_ACCOUNT_SID"),
        twilio_auth_token: var("TWILIO_AUTH_TOKEN"),
        twilio_from_number: var("TWILIO_FROM_NUMBER"),
        twilio_api_base: var("TWILIO_API_BASE").unwrap_or_else(|| TWILIO_API_BASE.to_string()),

        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_var("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: parse_var("RATE_LIMIT_BURST_SIZE")?.unwrap_or(DEFAULT_RATE_LIMIT_BURST),
        max_concurrent_calls: parse_var("MAX_CONCURRENT_CALLS")?,
    })
}
