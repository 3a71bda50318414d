//! Call relay between the telephony media stream and the realtime model.
//!
//! A call runs two forwarding loops over one [`CallSession`]:
//!
//! - caller -> model: `start` records the stream id, `media` frames are
//!   decoded, counted and appended to the model's input buffer
//! - model -> caller: audio deltas are re-encoded and sent back in arrival
//!   order, transcripts are remembered, and speech stops go through the
//!   [`SessionController`] which may retrieve context and request an answer
//!
//! The call ends as soon as either loop ends. Dropping the other loop cancels
//! any read or retrieval it was waiting on.

mod controller;
mod error;
mod policy;
mod session;

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, trace, warn};

pub use controller::{SessionController, TurnOutcome};
pub use error::{RelayError, RelayResult, Transport};
pub use policy::{
    DEFAULT_CLOSING_PHRASE, DEFAULT_FALLBACK, DEFAULT_FILLER, DEFAULT_GREETING,
    DEFAULT_MIN_AUDIO_BYTES, DEFAULT_NEGOTIATION_DELAY_MS, DEFAULT_RETRIEVAL_TIMEOUT_MS,
    DEFAULT_TOP_K, RelayPolicy,
};
pub use session::{CallSession, CallStats, SharedSession, TurnPhase, TurnStart};

use crate::core::codec::{self, AudioFrame};
use crate::core::realtime::{ClientEvent, ModelEvent, SessionConfig};
use crate::core::retrieval::RetrievalGateway;
use crate::core::telephony::{CallerEvent, CallerOutbound};

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The caller socket closed.
    CallerClosed,
    /// The caller sent `stop`.
    CallerStopped,
    /// The model socket closed.
    ModelClosed,
    /// A send failed because the peer was gone.
    SendFailed(Transport),
}

impl From<RelayError> for EndReason {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::TransportClosed(transport) => EndReason::SendFailed(transport),
            // Only transport errors escape the loops.
            _ => EndReason::SendFailed(Transport::Model),
        }
    }
}

/// Reported when a call ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSummary {
    pub call_id: String,
    pub stream_sid: Option<String>,
    pub end_reason: EndReason,
    pub stats: CallStats,
}

/// The four channel ends of one call.
///
/// `caller_inbound` yields text frames from the telephony socket and ends when
/// that socket closes.
pub struct CallTransports<S> {
    pub caller_inbound: S,
    pub caller_outbound: mpsc::Sender<CallerOutbound>,
    pub model_outbound: mpsc::Sender<ClientEvent>,
    pub model_inbound: mpsc::UnboundedReceiver<ModelEvent>,
}

/// Relays exactly one call.
pub struct CallRelay {
    call_id: String,
    session: SharedSession,
    policy: Arc<RelayPolicy>,
    session_config: SessionConfig,
    retrieval: Arc<dyn RetrievalGateway>,
}

impl CallRelay {
    pub fn new(
        policy: Arc<RelayPolicy>,
        session_config: SessionConfig,
        retrieval: Arc<dyn RetrievalGateway>,
    ) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            session: CallSession::shared(),
            policy,
            session_config,
            retrieval,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Handle to this call's session, for inspection.
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    /// Run the call to completion.
    pub async fn run<S>(self, transports: CallTransports<S>) -> CallSummary
    where
        S: Stream<Item = String> + Unpin + Send,
    {
        let span = info_span!("call", call_id = %self.call_id);
        self.run_inner(transports).instrument(span).await
    }

    async fn run_inner<S>(self, transports: CallTransports<S>) -> CallSummary
    where
        S: Stream<Item = String> + Unpin + Send,
    {
        let CallTransports {
            caller_inbound,
            caller_outbound,
            model_outbound,
            model_inbound,
        } = transports;

        let controller = SessionController::new(
            self.session.clone(),
            model_outbound.clone(),
            self.retrieval.clone(),
            self.policy.clone(),
        );

        info!("Call started");

        let end_reason = match controller.negotiate(self.session_config).await {
            Err(err) => EndReason::from(err),
            Ok(()) => {
                let session = &self.session;
                let delay = self.policy.negotiation_delay;

                let model_side = async {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = controller.greet().await {
                        return EndReason::from(err);
                    }
                    model_to_caller(model_inbound, &controller, session, &caller_outbound).await
                };

                tokio::select! {
                    reason = caller_to_model(caller_inbound, session, &model_outbound) => reason,
                    reason = model_side => reason,
                }
            }
        };

        let (stream_sid, call_sid, stats) = {
            let session = self.session.lock();
            (
                session.stream_sid().map(str::to_owned),
                session.call_sid().map(str::to_owned),
                session.stats(),
            )
        };

        info!(
            ?end_reason,
            stream_sid = stream_sid.as_deref().unwrap_or("-"),
            call_sid = call_sid.as_deref().unwrap_or("-"),
            turns_answered = stats.turns_answered,
            turns_discarded = stats.turns_discarded,
            retrieval_failures = stats.retrieval_failures,
            "Call ended"
        );

        CallSummary {
            call_id: self.call_id,
            stream_sid,
            end_reason,
            stats,
        }
    }
}

async fn caller_to_model<S>(
    mut inbound: S,
    session: &SharedSession,
    model_tx: &mpsc::Sender<ClientEvent>,
) -> EndReason
where
    S: Stream<Item = String> + Unpin,
{
    while let Some(text) = inbound.next().await {
        let event = match serde_json::from_str::<CallerEvent>(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring unparseable caller frame: {}", e);
                continue;
            }
        };

        match event {
            CallerEvent::Start { start } => {
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = start.call_sid.as_deref().unwrap_or("-"),
                    "Stream started"
                );
                session.lock().start_stream(start.stream_sid, start.call_sid);
            }
            CallerEvent::Media { media } => {
                let frame = match AudioFrame::from_wire(&media.payload) {
                    Ok(frame) => frame,
                    Err(e) => {
                        let err = RelayError::from(e);
                        warn!(error = %err, "Dropping caller frame");
                        session.lock().stats.malformed_frames += 1;
                        continue;
                    }
                };

                session.lock().record_audio(frame.estimated_len);
                if model_tx
                    .send(ClientEvent::audio_append(&frame.payload))
                    .await
                    .is_err()
                {
                    return EndReason::SendFailed(Transport::Model);
                }
            }
            CallerEvent::Stop {} => {
                info!("Caller stopped the stream");
                return EndReason::CallerStopped;
            }
            CallerEvent::Connected {} | CallerEvent::Mark {} | CallerEvent::Other => {
                trace!("Ignoring caller event");
            }
        }
    }

    debug!("Caller stream ended");
    EndReason::CallerClosed
}

async fn model_to_caller(
    mut inbound: mpsc::UnboundedReceiver<ModelEvent>,
    controller: &SessionController,
    session: &SharedSession,
    caller_tx: &mpsc::Sender<CallerOutbound>,
) -> EndReason {
    while let Some(event) = inbound.recv().await {
        match event {
            ModelEvent::SessionReady => debug!("Model session ready"),
            ModelEvent::TranscriptFinal(text) => {
                info!(utterance = %text, "Caller transcript");
                session.lock().set_utterance(text);
            }
            ModelEvent::AudioDelta(audio) => {
                let stream_sid = session.lock().stream_sid().map(str::to_owned);
                let Some(stream_sid) = stream_sid else {
                    trace!("No stream yet, dropping audio delta");
                    continue;
                };
                let frame = CallerOutbound::media(stream_sid, codec::encode(&audio));
                if caller_tx.send(frame).await.is_err() {
                    return EndReason::SendFailed(Transport::Caller);
                }
                session.lock().stats.deltas_to_caller += 1;
            }
            ModelEvent::SpeechStopped => match controller.on_speech_stopped().await {
                Ok(outcome) => debug!(?outcome, "Turn handled"),
                Err(err) => return EndReason::from(err),
            },
            ModelEvent::Error(api_error) => {
                let err = RelayError::ModelProtocolError(api_error.to_string());
                warn!(error = %err, "Model reported an error");
            }
        }
    }

    debug!("Model stream ended");
    EndReason::ModelClosed
}
