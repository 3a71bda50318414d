use super::{ServerConfig, TlsConfig};

pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), String> {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate not found: {}",
            tls.cert_path.display()
        ));
    }
    if !tls.key_path.exists() {
        return Err(format!("TLS key not found: {}", tls.key_path.display()));
    }
    Ok(())
}

pub(super) fn validate_public_url(public_url: &Option<String>) -> Result<(), String> {
    let Some(raw) = public_url else {
        return Ok(());
    };
    let url = url::Url::parse(raw).map_err(|e| format!("Invalid PUBLIC_URL '{raw}': {e}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("PUBLIC_URL must be http or https, got '{other}'")),
    }
    if url.host_str().is_none() {
        return Err(format!("PUBLIC_URL '{raw}' has no host"));
    }
    Ok(())
}

pub(super) fn validate_turn_settings(config: &ServerConfig) -> Result<(), String> {
    if config.port == 0 {
        return Err("PORT must be non-zero".to_string());
    }
    if config.relay.top_k == 0 {
        return Err("RETRIEVAL_TOP_K must be at least 1".to_string());
    }
    if config.relay.retrieval_timeout.is_zero() {
        return Err("RETRIEVAL_TIMEOUT_MS must be greater than 0".to_string());
    }
    let threshold = config.realtime.vad_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("VAD_THRESHOLD must be within [0.0, 1.0], got {threshold}"));
    }
    if config.relay.greeting.trim().is_empty() {
        return Err("GREETING_TEXT must not be empty".to_string());
    }
    if config.max_concurrent_calls == Some(0) {
        return Err("MAX_CONCURRENT_CALLS must be at least 1 when set".to_string());
    }
    Ok(())
}
