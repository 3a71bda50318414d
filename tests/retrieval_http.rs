//! Chroma retrieval gateway against mocked embeddings and Chroma APIs

use rag_voice_relay::core::retrieval::{
    ChromaConfig, ChromaRetrieval, EmbeddingConfig, RetrievalError, RetrievalGateway,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> ChromaRetrieval {
    ChromaRetrieval::new(ChromaConfig {
        url: server.uri(),
        collection: "policies".to_string(),
        embedding: EmbeddingConfig {
            api_base: format!("{}/v1", server.uri()),
            api_key: "sk-test".to_string(),
            model: "text-embedding-ada-002".to_string(),
        },
    })
    .unwrap()
}

async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-ada-002",
            "input": "what is the scheme"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
            "model": "text-embedding-ada-002"
        })))
        .mount(server)
        .await;
}

async fn mount_collection(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/collections/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "col-123",
            "name": "policies",
            "metadata": null
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_returns_passages_in_rank_order() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    mount_collection(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/collections/col-123/query"))
        .and(body_partial_json(json!({
            "query_embeddings": [[0.1, 0.2, 0.3]],
            "n_results": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ids": [["a", "b", "c"]],
            "documents": [["PM-KISAN pays 6000 rupees.", null, "Ayushman Bharat covers 5 lakh."]],
            "distances": [[0.12, 0.3, 0.45]],
            "metadatas": null,
            "embeddings": null
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let context = gateway.search("what is the scheme", 3).await.unwrap();

    assert_eq!(context.len(), 2);
    assert_eq!(context.passages[0].text, "PM-KISAN pays 6000 rupees.");
    assert_eq!(context.passages[0].distance, Some(0.12));
    assert_eq!(context.passages[1].distance, Some(0.45));
    assert_eq!(
        context.context_block(),
        "PM-KISAN pays 6000 rupees.\n\nAyushman Bharat covers 5 lakh."
    );

    // The collection id is resolved once.
    gateway.search("what is the scheme", 3).await.unwrap();
}

#[tokio::test]
async fn test_missing_collection() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/collections/policies"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("{\"error\":\"ValueError('Collection policies does not exist.')\"}"),
        )
        .mount(&server)
        .await;

    let result = gateway_for(&server).search("what is the scheme", 3).await;
    assert!(matches!(result, Err(RetrievalError::CollectionNotFound(name)) if name == "policies"));
}

#[tokio::test]
async fn test_embedding_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let result = gateway_for(&server).search("what is the scheme", 3).await;
    match result {
        Err(RetrievalError::Embedding(message)) => assert!(message.contains("401")),
        other => panic!("Expected embedding error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_query_failure() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    mount_collection(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/collections/col-123/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let result = gateway_for(&server).search("what is the scheme", 3).await;
    assert!(matches!(result, Err(RetrievalError::Search(_))));
}
