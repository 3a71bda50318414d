//! Retrieval gateway double

use async_trait::async_trait;
use parking_lot::Mutex;
use rag_voice_relay::core::retrieval::{
    RetrievalError, RetrievalGateway, RetrievalResult, RetrievedContext,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

pub const SCHEME_PASSAGE: &str =
    "PM-KISAN provides income support of 6000 rupees per year to farmer families.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Return [`SCHEME_PASSAGE`].
    Answer,
    /// Fail with a search error.
    Fail,
    /// Never return.
    Hang,
    /// Return [`SCHEME_PASSAGE`] once [`RecordingGateway::release`] is called.
    Gated,
}

/// Records every search and answers according to its [`Behavior`].
pub struct RecordingGateway {
    behavior: Behavior,
    calls: Mutex<Vec<(String, usize)>>,
    entered: Notify,
    released: Notify,
    cancelled: Arc<AtomicBool>,
}

impl RecordingGateway {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
            entered: Notify::new(),
            released: Notify::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().clone()
    }

    /// Resolves once a search has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let a gated search answer.
    pub fn release(&self) {
        self.released.notify_one();
    }

    /// Whether a hanging search was dropped before completing.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct CancelFlag(Arc<AtomicBool>);

impl Drop for CancelFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RetrievalGateway for RecordingGateway {
    async fn search(&self, query: &str, top_k: usize) -> RetrievalResult<RetrievedContext> {
        self.calls.lock().push((query.to_string(), top_k));
        self.entered.notify_one();

        match self.behavior {
            Behavior::Answer => Ok(RetrievedContext::from_texts([SCHEME_PASSAGE])),
            Behavior::Fail => Err(RetrievalError::Search("index offline".to_string())),
            Behavior::Gated => {
                self.released.notified().await;
                Ok(RetrievedContext::from_texts([SCHEME_PASSAGE]))
            }
            Behavior::Hang => {
                let _flag = CancelFlag(self.cancelled.clone());
                std::future::pending::<()>().await;
                Ok(RetrievedContext::default())
            }
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
