use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::embed::Embedder;
use super::index::{SearchHit, VectorIndex};
use super::seed;
use crate::config::RoutingConfig;

/// Fallback spoken when nothing in the index is close enough
pub const NO_MATCH_FALLBACK: &str = "I'm not sure how to help with that";

/// Fallback spoken when a matched entry carries unusable metadata
pub const ERROR_FALLBACK: &str = "Error processing request";

/// Outcome of routing one utterance; produced exactly once per pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingResult {
    /// A cached answer to speak back
    Answer(String),
    /// An action identifier to dispatch
    Action(String),
    /// No semantic match; `reply` carries the fallback to speak
    NoMatch { reply: String },
}

/// Embeds text, queries the vector index, and applies the distance-threshold
/// decision rule
pub struct IntentRouter {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    /// Strict `<` comparison; a distance equal to the threshold does not match
    threshold: f32,
    seed_file: PathBuf,
    seed_space: String,
}

impl IntentRouter {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        cfg: &RoutingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            threshold: cfg.distance_threshold,
            seed_file: PathBuf::from(&cfg.seed_file),
            seed_space: cfg.space.clone(),
        }
    }

    /// Route a transcript to an answer, an action, or the fallback
    ///
    /// Only infrastructure failures (index unreachable after a reseed
    /// attempt) surface as errors; every soft condition maps to `NoMatch`.
    pub async fn route(&self, text: &str, space: &str) -> Result<RoutingResult> {
        let vector = self
            .embedder
            .embed(text)
            .context("failed to embed query text")?;

        let hits = self.search_with_reseed(&vector, space).await?;

        let Some(hit) = hits.first() else {
            debug!("No entries found in space '{}'", space);
            return Ok(RoutingResult::NoMatch {
                reply: NO_MATCH_FALLBACK.to_string(),
            });
        };

        debug!(
            "Nearest entry '{}' at distance {:.4} (threshold {})",
            hit.entry.content, hit.distance, self.threshold
        );

        if hit.distance < self.threshold {
            Ok(Self::extract(hit))
        } else {
            Ok(RoutingResult::NoMatch {
                reply: NO_MATCH_FALLBACK.to_string(),
            })
        }
    }

    /// Query the index, lazily (re)seeding it once if it is missing or empty
    async fn search_with_reseed(&self, vector: &[f32], space: &str) -> Result<Vec<SearchHit>> {
        match self.index.search(vector, space, 1).await {
            Ok(hits) if !hits.is_empty() => return Ok(hits),
            Ok(_) => {
                if self.index.count(&self.seed_space).await.unwrap_or(0) > 0 {
                    // Seeded already; this space is genuinely empty
                    return Ok(Vec::new());
                }
                info!("Index is empty, seeding from {:?}", self.seed_file);
            }
            Err(e) => {
                warn!("Index query failed, reseeding and retrying once: {}", e);
            }
        }

        seed::seed_from_file(
            self.index.as_ref(),
            self.embedder.as_ref(),
            &self.seed_space,
            &self.seed_file,
        )
        .await
        .context("failed to seed the vector index")?;

        self.index
            .search(vector, space, 1)
            .await
            .context("index query failed after reseeding")
    }

    /// Pull `use_cases.chatbot.{answer, action}` out of a matched entry
    fn extract(hit: &SearchHit) -> RoutingResult {
        let chatbot = hit.entry.metadata.pointer("/use_cases/chatbot");

        let (answer, action) = match chatbot {
            Some(obj) => (
                obj.get("answer").and_then(|v| v.as_str()),
                obj.get("action").and_then(|v| v.as_str()),
            ),
            None => (None, None),
        };

        match (answer, action) {
            (Some(answer), Some(action)) => {
                if action.is_empty() {
                    RoutingResult::Answer(answer.to_string())
                } else {
                    RoutingResult::Action(action.to_string())
                }
            }
            _ => {
                warn!(
                    "Matched entry '{}' has malformed metadata",
                    hit.entry.content
                );
                RoutingResult::NoMatch {
                    reply: ERROR_FALLBACK.to_string(),
                }
            }
        }
    }
}
