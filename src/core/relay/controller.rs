//! Session controller: negotiation, the one-time greeting and turn completion.
//!
//! ```text
//! negotiating -> greeting-sent -> listening <-> responding
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::{RelayError, RelayResult, Transport};
use super::policy::RelayPolicy;
use super::session::{SharedSession, TurnPhase, TurnStart};
use crate::core::realtime::{ClientEvent, SessionConfig};
use crate::core::retrieval::{RetrievalError, RetrievalGateway, RetrievedContext};

/// What a speech stop turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Guard rejected the turn; the gateway was not called.
    Discarded { audio_bytes: usize },
    /// Answered with retrieved context.
    Answered { passages: usize },
    /// Retrieval failed; a generic answer was requested instead.
    Fallback,
}

pub struct SessionController {
    session: SharedSession,
    model_tx: mpsc::Sender<ClientEvent>,
    retrieval: Arc<dyn RetrievalGateway>,
    policy: Arc<RelayPolicy>,
}

impl SessionController {
    pub fn new(
        session: SharedSession,
        model_tx: mpsc::Sender<ClientEvent>,
        retrieval: Arc<dyn RetrievalGateway>,
        policy: Arc<RelayPolicy>,
    ) -> Self {
        Self {
            session,
            model_tx,
            retrieval,
            policy,
        }
    }

    async fn send(&self, event: ClientEvent) -> RelayResult<()> {
        self.model_tx
            .send(event)
            .await
            .map_err(|_| RelayError::TransportClosed(Transport::Model))
    }

    /// Send the session configuration.
    pub async fn negotiate(&self, session: SessionConfig) -> RelayResult<()> {
        self.session.lock().set_phase(TurnPhase::Negotiating);
        self.send(ClientEvent::SessionUpdate { session }).await?;
        debug!("Session configuration sent");
        Ok(())
    }

    /// Send the greeting unless this call has already been greeted.
    ///
    /// Returns whether a greeting was sent.
    pub async fn greet(&self) -> RelayResult<bool> {
        {
            let mut session = self.session.lock();
            if !session.mark_greeted() {
                return Ok(false);
            }
            session.set_phase(TurnPhase::GreetingSent);
        }

        self.send(ClientEvent::response_with(self.policy.greeting.clone()))
            .await?;
        self.session.lock().set_phase(TurnPhase::Listening);
        info!("Greeting sent");
        Ok(true)
    }

    /// Handle a speech stop from the model's VAD.
    ///
    /// Only a closed model transport is returned as an error; retrieval
    /// failures are answered with the fallback instruction.
    pub async fn on_speech_stopped(&self) -> RelayResult<TurnOutcome> {
        let start = self.session.lock().begin_turn(self.policy.min_audio_bytes);

        let utterance = match start {
            TurnStart::Discard {
                audio_bytes,
                had_utterance,
            } => {
                debug!(audio_bytes, had_utterance, "Discarding turn");
                return Ok(TurnOutcome::Discarded { audio_bytes });
            }
            TurnStart::Respond {
                utterance,
                audio_bytes,
            } => {
                info!(utterance = %utterance, audio_bytes, "Turn complete, retrieving context");
                utterance
            }
        };

        let retrieved = self.retrieve(&utterance).await;
        let result = self.respond(&utterance, retrieved).await;

        self.session.lock().finish_turn();
        result
    }

    async fn retrieve(&self, utterance: &str) -> RelayResult<RetrievedContext> {
        let timeout = self.policy.retrieval_timeout;
        match tokio::time::timeout(timeout, self.retrieval.search(utterance, self.policy.top_k))
            .await
        {
            Ok(Ok(context)) => Ok(context),
            Ok(Err(e)) => Err(RelayError::RetrievalFailure(e)),
            Err(_) => Err(RelayError::RetrievalFailure(RetrievalError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ))),
        }
    }

    async fn respond(
        &self,
        utterance: &str,
        retrieved: RelayResult<RetrievedContext>,
    ) -> RelayResult<TurnOutcome> {
        match retrieved {
            Ok(context) => {
                debug!(
                    gateway = self.retrieval.name(),
                    passages = context.len(),
                    best_distance = ?context.best_distance(),
                    "Context retrieved"
                );
                let instructions = self
                    .policy
                    .answer_instructions(&context.context_block(), utterance);

                self.send(ClientEvent::InputAudioBufferCommit).await?;
                self.send(ClientEvent::response_with(instructions)).await?;
                self.send(ClientEvent::response_with(self.policy.filler.clone()))
                    .await?;

                self.session.lock().stats.turns_answered += 1;
                Ok(TurnOutcome::Answered {
                    passages: context.len(),
                })
            }
            Err(err) => {
                warn!(gateway = self.retrieval.name(), error = %err, "Answering without context");
                self.session.lock().stats.retrieval_failures += 1;

                self.send(ClientEvent::InputAudioBufferCommit).await?;
                self.send(ClientEvent::response_with(self.policy.fallback_instructions()))
                    .await?;
                Ok(TurnOutcome::Fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::RealtimeSettings;
    use crate::core::relay::session::CallSession;
    use crate::core::retrieval::RetrievalResult;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct FakeGateway {
        calls: Mutex<Vec<(String, usize)>>,
        fail: bool,
    }

    impl FakeGateway {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl RetrievalGateway for FakeGateway {
        async fn search(&self, query: &str, top_k: usize) -> RetrievalResult<RetrievedContext> {
            self.calls.lock().push((query.to_string(), top_k));
            if self.fail {
                return Err(RetrievalError::Search("index offline".into()));
            }
            Ok(RetrievedContext::from_texts(["PM-KISAN gives 6000 rupees a year."]))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn setup(
        gateway: Arc<FakeGateway>,
    ) -> (SessionController, SharedSession, mpsc::Receiver<ClientEvent>) {
        let session = CallSession::shared();
        let (tx, rx) = mpsc::channel(32);
        let controller = SessionController::new(
            session.clone(),
            tx,
            gateway,
            Arc::new(RelayPolicy::default()),
        );
        (controller, session, rx)
    }

    #[tokio::test]
    async fn test_negotiate_sends_session_update() {
        let (controller, session, mut rx) = setup(FakeGateway::new(false));
        controller
            .negotiate(RealtimeSettings::default().session_config())
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(ClientEvent::SessionUpdate { .. })));
        assert_eq!(session.lock().phase(), TurnPhase::Negotiating);
    }

    #[tokio::test]
    async fn test_greet_only_once() {
        let (controller, session, mut rx) = setup(FakeGateway::new(false));

        assert!(controller.greet().await.unwrap());
        assert!(!controller.greet().await.unwrap());

        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::response_with(
                crate::core::relay::policy::DEFAULT_GREETING
            ))
        );
        assert!(rx.try_recv().is_err());
        assert!(session.lock().has_greeted());
        assert_eq!(session.lock().phase(), TurnPhase::Listening);
    }

    #[tokio::test]
    async fn test_short_turn_skips_gateway() {
        let gateway = FakeGateway::new(false);
        let (controller, session, mut rx) = setup(gateway.clone());
        {
            let mut s = session.lock();
            s.record_audio(400);
            s.set_utterance("what is the scheme".into());
        }

        let outcome = controller.on_speech_stopped().await.unwrap();
        assert_eq!(outcome, TurnOutcome::Discarded { audio_bytes: 400 });
        assert!(gateway.calls.lock().is_empty());
        assert!(rx.try_recv().is_err());
        assert_eq!(session.lock().audio_bytes(), 0);
    }

    #[tokio::test]
    async fn test_answered_turn_sends_commit_answer_and_filler() {
        let gateway = FakeGateway::new(false);
        let (controller, session, mut rx) = setup(gateway.clone());
        {
            let mut s = session.lock();
            s.record_audio(1200);
            s.set_utterance("what is the scheme".into());
        }

        let outcome = controller.on_speech_stopped().await.unwrap();
        assert_eq!(outcome, TurnOutcome::Answered { passages: 1 });
        assert_eq!(
            gateway.calls.lock().as_slice(),
            &[("what is the scheme".to_string(), 3)]
        );

        assert_eq!(rx.recv().await, Some(ClientEvent::InputAudioBufferCommit));
        match rx.recv().await {
            Some(ClientEvent::ResponseCreate { response }) => {
                assert!(response.instructions.contains("PM-KISAN gives 6000 rupees a year."));
                assert!(response.instructions.contains("what is the scheme"));
                assert!(response.instructions.contains("Kya aapka koi aur sawal hai?"));
            }
            other => panic!("Expected response.create, got {other:?}"),
        }
        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::response_with("Main sun raha hoon."))
        );

        let s = session.lock();
        assert_eq!(s.audio_bytes(), 0);
        assert_eq!(s.last_utterance(), None);
        assert_eq!(s.phase(), TurnPhase::Listening);
        assert_eq!(s.stats().turns_answered, 1);
    }

    #[tokio::test]
    async fn test_failed_retrieval_falls_back() {
        let gateway = FakeGateway::new(true);
        let (controller, session, mut rx) = setup(gateway.clone());
        {
            let mut s = session.lock();
            s.record_audio(1200);
            s.set_utterance("what is the scheme".into());
        }

        let outcome = controller.on_speech_stopped().await.unwrap();
        assert_eq!(outcome, TurnOutcome::Fallback);
        assert_eq!(gateway.calls.lock().len(), 1);
        assert_eq!(rx.recv().await, Some(ClientEvent::InputAudioBufferCommit));
        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::response_with(
                RelayPolicy::default().fallback_instructions()
            ))
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(session.lock().phase(), TurnPhase::Listening);
        assert_eq!(session.lock().stats().retrieval_failures, 1);
    }

    struct SlowGateway;

    #[async_trait]
    impl RetrievalGateway for SlowGateway {
        async fn search(&self, _query: &str, _top_k: usize) -> RetrievalResult<RetrievedContext> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RetrievedContext::default())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieval_timeout_falls_back() {
        let session = CallSession::shared();
        let (tx, mut rx) = mpsc::channel(32);
        let controller = SessionController::new(
            session.clone(),
            tx,
            Arc::new(SlowGateway),
            Arc::new(RelayPolicy::default()),
        );
        {
            let mut s = session.lock();
            s.record_audio(900);
            s.set_utterance("kisan yojana".into());
        }

        let outcome = controller.on_speech_stopped().await.unwrap();
        assert_eq!(outcome, TurnOutcome::Fallback);
        assert_eq!(rx.recv().await, Some(ClientEvent::InputAudioBufferCommit));
        assert_eq!(session.lock().phase(), TurnPhase::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieval_timeout_reports_configured_millis() {
        let (tx, _rx) = mpsc::channel(32);
        let policy = RelayPolicy {
            retrieval_timeout: Duration::from_millis(250),
            ..RelayPolicy::default()
        };
        let controller = SessionController::new(
            CallSession::shared(),
            tx,
            Arc::new(SlowGateway),
            Arc::new(policy),
        );

        let result = controller.retrieve("kisan yojana").await;
        assert!(matches!(
            result,
            Err(RelayError::RetrievalFailure(RetrievalError::Timeout(250)))
        ));
    }

    #[tokio::test]
    async fn test_closed_model_transport_is_reported() {
        let (controller, session, rx) = setup(FakeGateway::new(false));
        drop(rx);
        {
            let mut s = session.lock();
            s.record_audio(1200);
            s.set_utterance("hello".into());
        }

        let result = controller.on_speech_stopped().await;
        assert!(matches!(
            result,
            Err(RelayError::TransportClosed(Transport::Model))
        ));
        assert_eq!(session.lock().phase(), TurnPhase::Listening);
    }
}
