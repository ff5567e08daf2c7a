// HTTP endpoint tests driven through the router with tower's oneshot

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use hearsay::config::RoutingConfig;
use hearsay::http::{create_router, AppState, ChatResponse};
use hearsay::router::seed::{self, SeedRow};
use hearsay::router::{
    Embedder, HashEmbedder, IntentRouter, MemoryIndex, VectorIndex, NO_MATCH_FALLBACK,
};

async fn test_app() -> axum::Router {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(384));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

    let rows = vec![
        SeedRow {
            question: "hello".to_string(),
            answer: "Hello! How can I help you today?".to_string(),
            action: String::new(),
        },
        SeedRow {
            question: "what's the veloute".to_string(),
            answer: String::new(),
            action: "show_veloute".to_string(),
        },
    ];
    seed::seed_index(index.as_ref(), embedder.as_ref(), "chatbot", &rows)
        .await
        .unwrap();

    let cfg = RoutingConfig {
        space: "chatbot".to_string(),
        distance_threshold: 0.55,
        embedding_dim: 384,
        seed_file: "unused.csv".to_string(),
    };
    let router = Arc::new(IntentRouter::new(embedder, index, &cfg));
    create_router(AppState::new(router))
}

fn chat_request(content: &str, space: &str) -> Request<Body> {
    let body = serde_json::json!({ "content": content, "space": space });
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> ChatResponse {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_chat_returns_cached_answer() {
    let app = test_app().await;

    let response = app.oneshot(chat_request("hello", "chatbot")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = response_json(response).await;
    assert_eq!(chat.answer, "Hello! How can I help you today?");
    assert_eq!(chat.action, "");
}

#[tokio::test]
async fn test_chat_returns_action_with_empty_answer() {
    let app = test_app().await;

    let response = app
        .oneshot(chat_request("what's the veloute", "chatbot"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = response_json(response).await;
    assert_eq!(chat.answer, "");
    assert_eq!(chat.action, "show_veloute");
}

#[tokio::test]
async fn test_chat_unknown_space_falls_back() {
    let app = test_app().await;

    let response = app
        .oneshot(chat_request("hello", "no_such_space"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chat = response_json(response).await;
    assert_eq!(chat.answer, NO_MATCH_FALLBACK);
    assert_eq!(chat.action, "");
}

#[tokio::test]
async fn test_chat_rejects_malformed_body() {
    let app = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"content\": 42}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
