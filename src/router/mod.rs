//! Semantic routing: embeddings, vector index, and the threshold decision rule

pub mod embed;
pub mod index;
pub mod intent;
pub mod seed;

pub use embed::{Embedder, HashEmbedder};
pub use index::{IndexedEntry, MemoryIndex, SearchHit, VectorIndex};
pub use intent::{IntentRouter, RoutingResult, ERROR_FALLBACK, NO_MATCH_FALLBACK};
pub use seed::SeedRow;
