//! Media-stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream_handler;
use crate::handlers::voice::MEDIA_STREAM_PATH;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media-stream router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for one call's audio
///
/// # Protocol
///
/// The telephony provider sends JSON text frames tagged by `event`:
/// - `connected`, then `start` carrying `streamSid`
/// - `media` with a base64 G.711 u-law `payload`
/// - `mark` and `stop`
///
/// The server answers with `media` frames carrying the model's audio:
///
/// ```json
/// {"event": "media", "streamSid": "MZ...", "media": {"payload": "..."}}
/// ```
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
