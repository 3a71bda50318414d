pub mod codec;
pub mod realtime;
pub mod relay;
pub mod retrieval;
pub mod telephony;

// Re-export commonly used types for convenience
pub use codec::{AudioFrame, CodecError, CodecResult};

pub use realtime::{
    ClientEvent, ModelEvent, RealtimeConnection, RealtimeError, RealtimeResult, RealtimeSettings,
    RealtimeTask,
};

pub use relay::{
    CallRelay, CallSession, CallStats, CallSummary, CallTransports, EndReason, RelayError,
    RelayPolicy, RelayResult, SessionController, SharedSession, Transport, TurnOutcome, TurnPhase,
};

pub use retrieval::{
    ChromaConfig, ChromaRetrieval, RetrievalError, RetrievalGateway, RetrievalResult,
    RetrievedContext,
};

pub use telephony::{CallError, CallerEvent, CallerOutbound, TwilioCallClient};
