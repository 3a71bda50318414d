//! Configuration module for the voice relay server
//!
//! Server configuration comes from .env files, YAML files and environment
//! variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML over the environment configuration
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use rag_voice_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::RealtimeSettings;
use crate::core::relay::RelayPolicy;
use crate::core::retrieval::{
    ChromaConfig, DEFAULT_CHROMA_COLLECTION, DEFAULT_CHROMA_URL, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OPENAI_API_BASE, EmbeddingConfig,
};
use crate::core::telephony::{CallError, TWILIO_API_BASE, TwilioCallClient};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// - Server settings (host, port, TLS, public URL)
/// - Realtime model session settings and API key
/// - Turn-taking policy
/// - Retrieval index location
/// - Telephony REST credentials for outbound calls
/// - Security settings (CORS, rate limiting, call limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
    /// Public base URL, e.g. `https://voice.example.com`. Used for the
    /// media-stream URL in TwiML and for the outbound call callback.
    pub public_url: Option<String>,

    /// OpenAI API key for the realtime model and embeddings
    pub openai_api_key: Option<String>,
    pub realtime: RealtimeSettings,
    pub relay: RelayPolicy,

    // Retrieval
    pub chroma_url: String,
    pub chroma_collection: String,
    pub embedding_model: String,
    pub openai_api_base: String,

    // Telephony REST
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub twilio_api_base: String,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
    /// Maximum concurrent media streams
    /// Default: None (unlimited)
    pub max_concurrent_calls: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            public_url: None,
            openai_api_key: None,
            realtime: RealtimeSettings::default(),
            relay: RelayPolicy::default(),
            chroma_url: DEFAULT_CHROMA_URL.to_string(),
            chroma_collection: DEFAULT_CHROMA_COLLECTION.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            twilio_api_base: TWILIO_API_BASE.to_string(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst_size: DEFAULT_RATE_LIMIT_BURST,
            max_concurrent_calls: None,
        }
    }
}

/// Zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    ///
    /// The .env file is loaded in main.rs before this is called, so its
    /// values are visible here unless real environment variables override them.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        validation::validate_tls(&self.tls)?;
        validation::validate_public_url(&self.public_url)?;
        validation::validate_turn_settings(self)?;
        Ok(())
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// The OpenAI API key, or an error naming the missing variable.
    pub fn require_openai_api_key(&self) -> Result<&str, String> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| "OPENAI_API_KEY is not configured".to_string())
    }

    /// Host (and port, if any) of the public URL.
    pub fn public_host(&self) -> Option<String> {
        let url = url::Url::parse(self.public_url.as_deref()?).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Callback URL the telephony provider fetches once a call is answered.
    pub fn voice_webhook_url(&self) -> Option<String> {
        self.public_url
            .as_deref()
            .map(|base| format!("{}/voice", base.trim_end_matches('/')))
    }

    /// Retrieval settings for the Chroma gateway.
    pub fn chroma_config(&self) -> ChromaConfig {
        ChromaConfig {
            url: self.chroma_url.clone(),
            collection: self.chroma_collection.clone(),
            embedding: EmbeddingConfig {
                api_base: self.openai_api_base.clone(),
                api_key: self.openai_api_key.clone().unwrap_or_default(),
                model: self.embedding_model.clone(),
            },
        }
    }

    /// Telephony REST client built from the configured credentials.
    pub fn twilio_client(&self) -> Result<TwilioCallClient, CallError> {
        TwilioCallClient::new(
            self.twilio_api_base.clone(),
            self.twilio_account_sid.clone().unwrap_or_default(),
            self.twilio_auth_token.clone().unwrap_or_default(),
        )
    }
}
