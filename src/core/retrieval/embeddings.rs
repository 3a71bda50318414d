//! OpenAI embeddings client.
//!
//! Queries must be embedded with the same model the index was built with.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{RetrievalError, RetrievalResult};

/// Default embeddings model, matching the ingestion job.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default OpenAI REST API base.
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// API base, without a trailing slash
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// OpenAI embedder
pub struct OpenAIEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl OpenAIEmbedder {
    pub fn new(client: Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));
        let request = EmbedRequest {
            model: &self.config.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("{} - {}", status, text)));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("failed to parse response: {}", e)))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RetrievalError::Embedding("no embedding returned".to_string()))
    }
}
