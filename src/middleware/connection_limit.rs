//! Concurrent-call limit for the media-stream WebSocket
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use rag_voice_relay::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media-stream", get(media_stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::errors::app_error::AppError;
use crate::state::{AppState, CallLimitError};

/// Middleware that enforces `max_concurrent_calls`.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) take a
/// slot. When none is free the request is answered with 503. Otherwise the
/// [`CallSlot`](crate::state::CallSlot) is inserted as a request extension;
/// the slot stays taken until the handler drops it.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_call() {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(CallLimitError::AtCapacity) => {
            tracing::warn!(
                active_calls = state.active_calls(),
                "Rejecting media stream: call limit reached"
            );
            AppError::AtCapacity.into_response()
        }
    }
}
