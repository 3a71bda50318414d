//! Retrieval gateway for retrieval-augmented answers.
//!
//! The relay only sees the [`RetrievalGateway`] trait. The production
//! implementation embeds the utterance with the OpenAI embeddings API and runs
//! a similarity search against a Chroma collection.
//!
//! # Example
//!
//! ```ignore
//! let gateway: Arc<dyn RetrievalGateway> = Arc::new(ChromaRetrieval::new(config)?);
//! let context = gateway.search("what is the scheme", 3).await?;
//! println!("{}", context.context_block());
//! ```

mod chroma;
mod embeddings;

use async_trait::async_trait;
use thiserror::Error;

pub use chroma::{ChromaConfig, ChromaRetrieval, DEFAULT_CHROMA_COLLECTION, DEFAULT_CHROMA_URL};
pub use embeddings::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_API_BASE, EmbeddingConfig, OpenAIEmbedder,
};

/// Errors from the retrieval gateway.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    Search(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Retrieval timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid retrieval configuration: {0}")]
    Configuration(String),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    /// Distance reported by the index, lower is closer.
    pub distance: Option<f32>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            distance: None,
        }
    }
}

/// Passages returned for one utterance, most relevant first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub passages: Vec<Passage>,
}

impl RetrievedContext {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            passages: texts.into_iter().map(Passage::new).collect(),
        }
    }

    /// Passages joined by blank lines, in retrieval order.
    pub fn context_block(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Distance of the closest passage, when the index reported one.
    pub fn best_distance(&self) -> Option<f32> {
        self.passages
            .iter()
            .filter_map(|p| p.distance)
            .reduce(f32::min)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Similarity search over the document index.
#[async_trait]
pub trait RetrievalGateway: Send + Sync + 'static {
    /// Return up to `top_k` passages relevant to `query`, most relevant first.
    async fn search(&self, query: &str, top_k: usize) -> RetrievalResult<RetrievedContext>;

    /// Gateway name for logging.
    fn name(&self) -> &str;
}
