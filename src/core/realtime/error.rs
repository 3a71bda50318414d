use thiserror::Error;

/// Errors that can occur on the model transport.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the model endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid endpoint or credentials
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The connection task has already stopped
    #[error("Not connected")]
    NotConnected,
}

/// Result type for model transport operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::WebSocketError(err.to_string())
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationError(err.to_string())
    }
}
