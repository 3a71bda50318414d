//! Chroma-backed retrieval gateway.
//!
//! Uses the Chroma REST API:
//! - `GET  /api/v1/collections/{name}` resolves the collection id (cached)
//! - `POST /api/v1/collections/{id}/query` runs the similarity search

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use super::embeddings::{EmbeddingConfig, OpenAIEmbedder};
use super::{Passage, RetrievalError, RetrievalGateway, RetrievalResult, RetrievedContext};

/// Default Chroma server.
pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";

/// Collection name the ingestion job writes to by default.
pub const DEFAULT_CHROMA_COLLECTION: &str = "langchain";

/// Chroma retrieval configuration
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub url: String,
    pub collection: String,
    pub embedding: EmbeddingConfig,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHROMA_URL.to_string(),
            collection: DEFAULT_CHROMA_COLLECTION.to_string(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Collection {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

/// Embeds the query, then asks Chroma for the nearest passages.
pub struct ChromaRetrieval {
    client: Client,
    config: ChromaConfig,
    embedder: OpenAIEmbedder,
    collection_id: OnceCell<String>,
}

impl ChromaRetrieval {
    pub fn new(config: ChromaConfig) -> RetrievalResult<Self> {
        if config.embedding.api_key.is_empty() {
            return Err(RetrievalError::Configuration(
                "embedding API key is empty".to_string(),
            ));
        }
        let client = Client::new();
        let embedder = OpenAIEmbedder::new(client.clone(), config.embedding.clone());
        Ok(Self {
            client,
            config,
            embedder,
            collection_id: OnceCell::new(),
        })
    }

    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn collection_id(&self) -> RetrievalResult<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections/{}", self.base(), self.config.collection);
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| RetrievalError::Search(format!("request failed: {}", e)))?;

                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Err(RetrievalError::CollectionNotFound(
                        self.config.collection.clone(),
                    ));
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    // Chroma reports a missing collection as a 500 with a ValueError body
                    if text.contains("does not exist") {
                        return Err(RetrievalError::CollectionNotFound(
                            self.config.collection.clone(),
                        ));
                    }
                    return Err(RetrievalError::Search(format!("{} - {}", status, text)));
                }

                let collection: Collection = response.json().await.map_err(|e| {
                    RetrievalError::Search(format!("failed to parse collection: {}", e))
                })?;
                debug!(collection = %self.config.collection, id = %collection.id, "Resolved collection");
                Ok(collection.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl RetrievalGateway for ChromaRetrieval {
    async fn search(&self, query: &str, top_k: usize) -> RetrievalResult<RetrievedContext> {
        let embedding = self.embedder.embed(query).await?;
        let collection_id = self.collection_id().await?;

        let url = format!("{}/api/v1/collections/{}/query", self.base(), collection_id);
        let request = QueryRequest {
            query_embeddings: [embedding.as_slice()],
            n_results: top_k,
            include: ["documents", "distances"],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Search(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Search(format!("{} - {}", status, text)));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Search(format!("failed to parse response: {}", e)))?;

        let documents = result
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let distances = result
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let passages = documents
            .into_iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                doc.map(|text| Passage {
                    text,
                    distance: distances.get(i).copied().flatten(),
                })
            })
            .take(top_k)
            .collect();

        Ok(RetrievedContext { passages })
    }

    fn name(&self) -> &str {
        "chroma"
    }
}
