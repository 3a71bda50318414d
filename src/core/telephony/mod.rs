//! Telephony side of a call: media-stream wire format and the outbound call trigger.

mod call;
mod messages;

pub use call::{CallError, CallResult, PlacedCall, TWILIO_API_BASE, TwilioCallClient, is_e164};
pub use messages::{CallerEvent, CallerOutbound, MediaPayload, StreamStart};
