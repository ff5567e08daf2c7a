// Intent routing tests: threshold rule, fallbacks, lazy reseeding

use anyhow::Result;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use hearsay::config::RoutingConfig;
use hearsay::router::seed::{self, SeedRow};
use hearsay::router::{
    Embedder, HashEmbedder, IndexedEntry, IntentRouter, MemoryIndex, RoutingResult, VectorIndex,
    ERROR_FALLBACK, NO_MATCH_FALLBACK,
};

/// Embedder stub returning pre-assigned vectors per text
struct FixedEmbedder {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedEmbedder {
    fn new(dim: usize, assignments: &[(&str, Vec<f32>)]) -> Self {
        Self {
            dim,
            vectors: assignments
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
        }
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dim]))
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

fn routing_config(space: &str, threshold: f32, seed_file: &str) -> RoutingConfig {
    RoutingConfig {
        space: space.to_string(),
        distance_threshold: threshold,
        embedding_dim: 384,
        seed_file: seed_file.to_string(),
    }
}

fn chatbot_entry(content: &str, embedding: Vec<f32>, answer: &str, action: &str) -> IndexedEntry {
    IndexedEntry {
        content: content.to_string(),
        embedding,
        space: "chatbot".to_string(),
        model_name: "fixed".to_string(),
        metadata: serde_json::json!({
            "use_cases": {"chatbot": {"answer": answer, "action": action}}
        }),
        cache: true,
    }
}

#[tokio::test]
async fn test_round_trip_retrieval_yields_action() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(384));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

    let rows = vec![
        SeedRow {
            question: "what's the veloute".to_string(),
            answer: String::new(),
            action: "show_veloute".to_string(),
        },
        SeedRow {
            question: "hello".to_string(),
            answer: "Hello! How can I help you today?".to_string(),
            action: String::new(),
        },
    ];
    seed::seed_index(index.as_ref(), embedder.as_ref(), "chatbot", &rows)
        .await
        .unwrap();

    let router = IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &routing_config("chatbot", 0.55, "unused.csv"),
    );

    // Exact seed question embeds identically, so distance is zero
    let result = router.route("what's the veloute", "chatbot").await.unwrap();
    assert_eq!(result, RoutingResult::Action("show_veloute".to_string()));

    // Empty action means the answer is spoken instead
    let result = router.route("hello", "chatbot").await.unwrap();
    assert_eq!(
        result,
        RoutingResult::Answer("Hello! How can I help you today?".to_string())
    );
}

#[tokio::test]
async fn test_threshold_boundary_is_strict() {
    // Entry at the origin; query vectors crafted for exact squared-L2
    // distances: 0.5^2 = 0.25 exactly in f32
    let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder::new(
        4,
        &[
            ("at threshold", vec![0.5, 0.0, 0.0, 0.0]),
            ("below threshold", vec![0.4, 0.0, 0.0, 0.0]),
        ],
    ));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
    index.ensure_schema(4).await.unwrap();
    index
        .upsert(vec![chatbot_entry("origin", vec![0.0; 4], "matched", "")])
        .await
        .unwrap();

    let router = IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &routing_config("chatbot", 0.25, "unused.csv"),
    );

    // Distance exactly equal to the threshold does not match
    let result = router.route("at threshold", "chatbot").await.unwrap();
    assert_eq!(
        result,
        RoutingResult::NoMatch {
            reply: NO_MATCH_FALLBACK.to_string()
        }
    );

    // Distance 0.16 is strictly below 0.25 and matches
    let result = router.route("below threshold", "chatbot").await.unwrap();
    assert_eq!(result, RoutingResult::Answer("matched".to_string()));
}

#[tokio::test]
async fn test_unrelated_space_yields_no_match_fallback() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(384));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

    let rows = vec![SeedRow {
        question: "hello".to_string(),
        answer: "hi".to_string(),
        action: String::new(),
    }];
    seed::seed_index(index.as_ref(), embedder.as_ref(), "chatbot", &rows)
        .await
        .unwrap();

    let router = IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &routing_config("chatbot", 0.55, "unused.csv"),
    );

    // The space exists in config but holds no entries; never an error
    let result = router.route("hello", "smalltalk").await.unwrap();
    assert_eq!(
        result,
        RoutingResult::NoMatch {
            reply: NO_MATCH_FALLBACK.to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_metadata_yields_error_fallback() {
    let embedder: Arc<dyn Embedder> =
        Arc::new(FixedEmbedder::new(4, &[("query", vec![0.0; 4])]));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
    index.ensure_schema(4).await.unwrap();

    // use_cases.chatbot is missing entirely
    index
        .upsert(vec![IndexedEntry {
            content: "broken".to_string(),
            embedding: vec![0.0; 4],
            space: "chatbot".to_string(),
            model_name: "fixed".to_string(),
            metadata: serde_json::json!({"use_cases": {}}),
            cache: true,
        }])
        .await
        .unwrap();

    let router = IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &routing_config("chatbot", 0.55, "unused.csv"),
    );

    let result = router.route("query", "chatbot").await.unwrap();
    assert_eq!(
        result,
        RoutingResult::NoMatch {
            reply: ERROR_FALLBACK.to_string()
        }
    );
}

#[tokio::test]
async fn test_empty_index_is_lazily_seeded() {
    let mut seed_file = NamedTempFile::new().unwrap();
    writeln!(seed_file, "question,answer,action").unwrap();
    writeln!(seed_file, "what's the veloute,,show_veloute").unwrap();
    seed_file.flush().unwrap();

    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(384));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

    let router = IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &routing_config("chatbot", 0.55, seed_file.path().to_str().unwrap()),
    );

    // Nothing was seeded; routing creates the schema and seeds on demand
    let result = router.route("what's the veloute", "chatbot").await.unwrap();
    assert_eq!(result, RoutingResult::Action("show_veloute".to_string()));
    assert_eq!(index.count("chatbot").await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_seed_file_surfaces_routing_error() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(384));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());

    let router = IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &routing_config("chatbot", 0.55, "/nonexistent/seed.csv"),
    );

    // The reseed attempt itself fails, which is a routing-service error
    assert!(router.route("anything", "chatbot").await.is_err());
}

#[tokio::test]
async fn test_upsert_rejects_dimension_mismatch() {
    let index = MemoryIndex::new();
    index.ensure_schema(4).await.unwrap();

    let result = index
        .upsert(vec![chatbot_entry("bad", vec![0.0; 3], "x", "")])
        .await;
    assert!(result.is_err());
}
