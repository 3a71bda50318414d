//! Voice webhook
//!
//! The telephony provider requests `POST /voice` when a call is answered and
//! expects TwiML back. The document connects the call audio to this server's
//! `/media-stream` WebSocket.

use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::info;

use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Path of the media-stream WebSocket.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// TwiML that opens a bidirectional media stream to `host`.
pub fn stream_twiml(host: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Connect><Stream url=\"wss://{host}{MEDIA_STREAM_PATH}\"/></Connect></Response>"
    )
}

/// `POST /voice`
///
/// The stream host is the configured public URL's host, falling back to the
/// request's `Host` header.
pub async fn voice_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let host = state
        .config
        .public_host()
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|h| !h.is_empty() && !h.contains(['"', '<', '>', '&']))
                .map(str::to_owned)
        })
        .ok_or_else(|| AppError::BadRequest("cannot determine stream host".to_string()))?;

    info!(%host, "Answering voice webhook");

    Ok(([(header::CONTENT_TYPE, "application/xml")], stream_twiml(&host)))
}
