use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// One record in the vector index
///
/// Created at seed time or by later writes; never mutated in place, always
/// replaced wholesale. `metadata` stays schemaless JSON because entries can
/// be written by external tools, and routing must tolerate malformed shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub content: String,
    pub embedding: Vec<f32>,
    /// Conversational space this entry belongs to
    pub space: String,
    pub model_name: String,
    /// Expected shape: {"use_cases":{"chatbot":{"answer":..,"action":..}}}
    pub metadata: serde_json::Value,
    pub cache: bool,
}

/// A ranked search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: IndexedEntry,
    pub distance: f32,
}

/// Vector index collaborator contract
///
/// Backed in production by a vector database; `MemoryIndex` below is the
/// in-process implementation used for tests and single-node deployments.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection for `dim`-length vectors if it does not exist
    async fn ensure_schema(&self, dim: usize) -> Result<()>;

    /// Insert entries; embedding lengths must match the schema dimension
    async fn upsert(&self, entries: Vec<IndexedEntry>) -> Result<()>;

    /// Nearest-neighbor search scoped to one space, ascending by distance
    async fn search(&self, vector: &[f32], space: &str, k: usize) -> Result<Vec<SearchHit>>;

    /// Number of entries stored for a space
    async fn count(&self, space: &str) -> Result<usize>;
}

/// Brute-force in-memory index using squared Euclidean distance
pub struct MemoryIndex {
    inner: RwLock<IndexState>,
}

#[derive(Default)]
struct IndexState {
    dim: Option<usize>,
    spaces: HashMap<String, Vec<IndexedEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexState::default()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_schema(&self, dim: usize) -> Result<()> {
        let mut state = self.inner.write().await;
        match state.dim {
            Some(existing) if existing != dim => {
                bail!(
                    "index schema already exists with dimension {}, requested {}",
                    existing,
                    dim
                );
            }
            Some(_) => {}
            None => {
                state.dim = Some(dim);
                info!("Created index schema with dimension {}", dim);
            }
        }
        Ok(())
    }

    async fn upsert(&self, entries: Vec<IndexedEntry>) -> Result<()> {
        let mut state = self.inner.write().await;
        let dim = match state.dim {
            Some(d) => d,
            None => bail!("index schema does not exist"),
        };

        for entry in entries {
            if entry.embedding.len() != dim {
                bail!(
                    "embedding length {} does not match index dimension {}",
                    entry.embedding.len(),
                    dim
                );
            }
            state.spaces.entry(entry.space.clone()).or_default().push(entry);
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], space: &str, k: usize) -> Result<Vec<SearchHit>> {
        let state = self.inner.read().await;

        let Some(entries) = state.spaces.get(space) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                distance: squared_l2(&entry.embedding, vector),
                entry: entry.clone(),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self, space: &str) -> Result<usize> {
        let state = self.inner.read().await;
        Ok(state.spaces.get(space).map_or(0, Vec::len))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
