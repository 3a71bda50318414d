use thiserror::Error;

use crate::core::codec::CodecError;
use crate::core::retrieval::RetrievalError;

/// The two sides of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Caller,
    Model,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Caller => write!(f, "caller"),
            Transport::Model => write!(f, "model"),
        }
    }
}

/// Errors raised while relaying one call.
///
/// Only `TransportClosed` ends a call. The others are contained where they
/// occur: a malformed frame is dropped, a model error event is logged, and a
/// retrieval failure degrades the turn to a generic answer.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("{0} transport closed")]
    TransportClosed(Transport),

    #[error("Model protocol error: {0}")]
    ModelProtocolError(String),

    #[error("Retrieval failed: {0}")]
    RetrievalFailure(#[from] RetrievalError),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl From<CodecError> for RelayError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MalformedFrame(msg) => RelayError::MalformedFrame(msg),
        }
    }
}
