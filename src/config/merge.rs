use std::path::PathBuf;
use std::time::Duration;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};
use crate::core::realtime::{AudioFormat, RealtimeModel, RealtimeVoice};

/// Environment (with defaults) as the base, YAML values on top.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, String> {
    let mut config = env::load_from_env()?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), String> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(public_url) = server.public_url {
            config.public_url = Some(public_url);
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) if tls.enabled.is_none() => {}
                    _ => {
                        return Err(
                            "server.tls requires both cert_path and key_path".to_string()
                        );
                    }
                }
            }
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(key) = realtime.api_key {
            config.openai_api_key = Some(key);
        }
        let settings = &mut config.realtime;
        if let Some(url) = realtime.url {
            settings.url = url;
        }
        if let Some(model) = realtime.model {
            settings.model = RealtimeModel::from_str_or_default(&model);
        }
        if let Some(voice) = realtime.voice {
            settings.voice = RealtimeVoice::from_str_or_default(&voice);
        }
        if let Some(format) = realtime.audio_format {
            settings.audio_format = AudioFormat::from_str_or_default(&format);
        }
        if let Some(instructions) = realtime.instructions {
            settings.instructions = instructions;
        }
        if let Some(threshold) = realtime.vad_threshold {
            settings.vad_threshold = threshold;
        }
        if let Some(silence) = realtime.silence_duration_ms {
            settings.silence_duration_ms = silence;
        }
        if let Some(model) = realtime.transcription_model {
            settings.transcription_model = (!model.trim().is_empty()).then_some(model);
        }
    }

    if let Some(relay) = yaml.relay {
        let policy = &mut config.relay;
        if let Some(min) = relay.min_audio_bytes {
            policy.min_audio_bytes = min;
        }
        if let Some(delay) = relay.negotiation_delay_ms {
            policy.negotiation_delay = Duration::from_millis(delay);
        }
        if let Some(greeting) = relay.greeting {
            policy.greeting = greeting;
        }
        if let Some(filler) = relay.filler {
            policy.filler = filler;
        }
        if let Some(closing) = relay.closing_phrase {
            policy.closing_phrase = closing;
        }
        if let Some(fallback) = relay.fallback {
            policy.fallback = fallback;
        }
    }

    if let Some(retrieval) = yaml.retrieval {
        if let Some(url) = retrieval.chroma_url {
            config.chroma_url = url;
        }
        if let Some(collection) = retrieval.collection {
            config.chroma_collection = collection;
        }
        if let Some(model) = retrieval.embedding_model {
            config.embedding_model = model;
        }
        if let Some(base) = retrieval.openai_api_base {
            config.openai_api_base = base;
        }
        if let Some(top_k) = retrieval.top_k {
            config.relay.top_k = top_k;
        }
        if let Some(timeout) = retrieval.timeout_ms {
            config.relay.retrieval_timeout = Duration::from_millis(timeout);
        }
    }

    if let Some(twilio) = yaml.twilio {
        if let Some(sid) = twilio.account_sid {
            config.twilio_account_sid = Some(sid);
        }
        if let Some(token) = twilio.auth_token {
            config.twilio_auth_token = Some(token);
        }
        if let Some(from) = twilio.from_number {
            config.twilio_from_number = Some(from);
        }
        if let Some(base) = twilio.api_base {
            config.twilio_api_base = base;
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_concurrent_calls {
            config.max_concurrent_calls = Some(max);
        }
    }

    Ok(())
}
