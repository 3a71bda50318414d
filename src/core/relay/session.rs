//! Per-call state shared by the two forwarding loops.

use std::sync::Arc;

use parking_lot::Mutex;

/// Where the call is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Negotiating,
    GreetingSent,
    Listening,
    Responding,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnPhase::Negotiating => "negotiating",
            TurnPhase::GreetingSent => "greeting-sent",
            TurnPhase::Listening => "listening",
            TurnPhase::Responding => "responding",
        };
        f.write_str(s)
    }
}

/// Result of checking a speech stop against the turn guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStart {
    /// Too little audio or no transcript. The counter has been reset.
    Discard { audio_bytes: usize, had_utterance: bool },
    /// The turn goes ahead with this utterance. Counter and utterance are consumed.
    Respond { utterance: String, audio_bytes: usize },
}

/// Counters reported when the call ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub frames_to_model: u64,
    pub deltas_to_caller: u64,
    pub malformed_frames: u64,
    pub turns_answered: u64,
    pub turns_discarded: u64,
    pub retrieval_failures: u64,
}

/// One live telephony stream.
///
/// The caller loop writes the stream id and the audio counter. Turn fields are
/// changed only through the controller.
#[derive(Debug, Default)]
pub struct CallSession {
    stream_sid: Option<String>,
    call_sid: Option<String>,
    audio_bytes: usize,
    last_utterance: Option<String>,
    has_greeted: bool,
    phase: TurnPhase,
    pub(crate) stats: CallStats,
}

pub type SharedSession = Arc<Mutex<CallSession>>;

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.call_sid.as_deref()
    }

    pub fn audio_bytes(&self) -> usize {
        self.audio_bytes
    }

    pub fn last_utterance(&self) -> Option<&str> {
        self.last_utterance.as_deref()
    }

    pub fn has_greeted(&self) -> bool {
        self.has_greeted
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn stats(&self) -> CallStats {
        self.stats
    }

    pub(crate) fn start_stream(&mut self, stream_sid: String, call_sid: Option<String>) {
        self.stream_sid = Some(stream_sid);
        self.call_sid = call_sid;
    }

    pub(crate) fn record_audio(&mut self, estimated_len: usize) {
        self.audio_bytes = self.audio_bytes.saturating_add(estimated_len);
        self.stats.frames_to_model += 1;
    }

    /// Only the most recent transcript before a speech stop is answered.
    pub(crate) fn set_utterance(&mut self, text: String) {
        self.last_utterance = Some(text);
    }

    pub(crate) fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
    }

    /// Marks the greeting as sent. Returns false if it already was.
    pub(crate) fn mark_greeted(&mut self) -> bool {
        if self.has_greeted {
            return false;
        }
        self.has_greeted = true;
        true
    }

    /// Apply the minimum-duration guard to a speech stop.
    ///
    /// The audio counter goes back to 0 here and again in [`finish_turn`], so
    /// audio that arrives while a turn is being answered is not carried over.
    ///
    /// [`finish_turn`]: CallSession::finish_turn
    pub(crate) fn begin_turn(&mut self, min_audio_bytes: usize) -> TurnStart {
        let audio_bytes = std::mem::take(&mut self.audio_bytes);
        let has_text = self
            .last_utterance
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());

        if audio_bytes < min_audio_bytes || !has_text {
            self.stats.turns_discarded += 1;
            return TurnStart::Discard {
                audio_bytes,
                had_utterance: has_text,
            };
        }

        let utterance = self.last_utterance.take().unwrap_or_default();
        self.phase = TurnPhase::Responding;
        TurnStart::Respond {
            utterance,
            audio_bytes,
        }
    }

    pub(crate) fn finish_turn(&mut self) {
        self.audio_bytes = 0;
        self.last_utterance = None;
        self.phase = TurnPhase::Listening;
    }
}
