use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ServerConfig;
use crate::core::relay::RelayPolicy;
use crate::core::retrieval::{ChromaRetrieval, RetrievalGateway, RetrievalResult};

/// Error returned when no call slot is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLimitError {
    AtCapacity,
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub policy: Arc<RelayPolicy>,
    pub retrieval: Arc<dyn RetrievalGateway>,
    active_calls: Arc<AtomicUsize>,
}

impl AppState {
    /// Build the state with the Chroma retrieval gateway.
    pub fn new(config: ServerConfig) -> RetrievalResult<Arc<Self>> {
        let retrieval = ChromaRetrieval::new(config.chroma_config())?;
        Ok(Self::with_retrieval(config, Arc::new(retrieval)))
    }

    /// Build the state around an existing retrieval gateway.
    pub fn with_retrieval(config: ServerConfig, retrieval: Arc<dyn RetrievalGateway>) -> Arc<Self> {
        let policy = Arc::new(config.relay.clone());
        Arc::new(Self {
            config,
            policy,
            retrieval,
            active_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of media streams currently running.
    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::Acquire)
    }

    /// Reserve a call slot. The slot is released when the last clone of the
    /// returned [`CallSlot`] is dropped.
    pub fn try_acquire_call(&self) -> Result<CallSlot, CallLimitError> {
        let max = self.config.max_concurrent_calls;
        self.active_calls
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match max {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            })
            .map_err(|_| CallLimitError::AtCapacity)?;

        Ok(CallSlot {
            _guard: Arc::new(SlotGuard {
                counter: self.active_calls.clone(),
            }),
        })
    }
}

/// A reserved call slot, carried from the connection-limit middleware into
/// the media-stream task through request extensions.
#[derive(Clone)]
pub struct CallSlot {
    _guard: Arc<SlotGuard>,
}

impl std::fmt::Debug for CallSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallSlot")
    }
}

struct SlotGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
