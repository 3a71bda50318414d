//! Audio frame codec for the telephony and model transports.
//!
//! Both transports carry narrowband G.711 audio as standard base64 text. The
//! codec turns wire text into raw bytes and back, and provides the cheap
//! length estimate used by the turn guard without decoding anything.

use base64::prelude::*;
use bytes::Bytes;
use thiserror::Error;

/// Errors produced by the frame codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The wire text is not valid base64.
    #[error("Malformed audio frame: {0}")]
    MalformedFrame(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// One decoded unit of audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw G.711 payload.
    pub payload: Bytes,
    /// Length estimated from the wire text (see [`estimated_raw_len`]).
    pub estimated_len: usize,
}

impl AudioFrame {
    /// Decode a wire frame, keeping the pre-decode length estimate.
    pub fn from_wire(wire: &str) -> CodecResult<Self> {
        let payload = decode(wire)?;
        Ok(Self {
            payload,
            estimated_len: estimated_raw_len(wire),
        })
    }

    /// Re-encode the payload for the wire.
    pub fn to_wire(&self) -> String {
        encode(&self.payload)
    }
}

/// Decode a base64 wire frame to its raw payload.
pub fn decode(wire: &str) -> CodecResult<Bytes> {
    BASE64_STANDARD
        .decode(wire.trim())
        .map(Bytes::from)
        .map_err(|e| CodecError::MalformedFrame(e.to_string()))
}

/// Encode a raw payload as base64 wire text.
#[inline]
pub fn encode(raw: &[u8]) -> String {
    BASE64_STANDARD.encode(raw)
}

/// Raw byte count implied by a wire frame: 3 bytes per 4 characters, floored.
///
/// Surrounding whitespace is ignored, as in [`decode`]. Padding characters are counted, so the value may exceed the true decoded
/// length by up to two bytes. It is a heuristic for the minimum-duration guard
/// only.
#[inline]
pub fn estimated_raw_len(wire: &str) -> usize {
    wire.trim().len() * 3 / 4
}
