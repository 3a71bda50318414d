//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `voice` - TwiML webhook that points the telephony provider at the media stream
//! - `media_stream` - Media-stream WebSocket that relays one call to the realtime model

pub mod api;
pub mod media_stream;
pub mod voice;

// Re-export commonly used handlers for convenient access
pub use media_stream::media_stream_handler;
pub use voice::voice_webhook;
