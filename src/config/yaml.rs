use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///   public_url: "https://voice.example.com"
///   tls:
///     cert_path: "/etc/ssl/cert.pem"
///     key_path: "/etc/ssl/key.pem"
///
/// realtime:
///   api_key: "sk-..."
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   voice: "alloy"
///   audio_format: "g711_ulaw"
///   vad_threshold: 0.5
///   silence_duration_ms: 700
///   transcription_model: "whisper-1"
///
/// relay:
///   min_audio_bytes: 800
///   negotiation_delay_ms: 1000
///   greeting: "Namaste! ..."
///   closing_phrase: "Kya aapka koi aur sawal hai?"
///
/// retrieval:
///   chroma_url: "http://localhost:8000"
///   collection: "langchain"
///   top_k: 3
///   timeout_ms: 5000
///
/// twilio:
///   account_sid: "AC..."
///   auth_token: "..."
///   from_number: "+14155550100"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   max_concurrent_calls: 20
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub relay: Option<RelayYaml>,
    pub retrieval: Option<RetrievalYaml>,
    pub twilio: Option<TwilioYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Public base URL the telephony provider reaches this server on
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Realtime model settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub audio_format: Option<String>,
    pub instructions: Option<String>,
    pub vad_threshold: Option<f32>,
    pub silence_duration_ms: Option<u32>,
    /// Empty string disables caller transcription
    pub transcription_model: Option<String>,
}

/// Turn-taking settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub min_audio_bytes: Option<usize>,
    pub negotiation_delay_ms: Option<u64>,
    pub greeting: Option<String>,
    pub filler: Option<String>,
    pub closing_phrase: Option<String>,
    pub fallback: Option<String>,
}

/// Retrieval gateway settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RetrievalYaml {
    pub chroma_url: Option<String>,
    pub collection: Option<String>,
    pub embedding_model: Option<String>,
    pub openai_api_base: Option<String>,
    pub top_k: Option<usize>,
    pub timeout_ms: Option<u64>,
}

/// Telephony REST credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub api_base: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent media streams
    pub max_concurrent_calls: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
