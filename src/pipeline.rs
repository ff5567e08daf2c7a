//! Pipeline composition: mic → segmenter → decoder → wake match → router →
//! answer or action
//!
//! Utterance processing is strictly sequential: one utterance is fully
//! processed before the next capture begins, and the segmenter owns the
//! input device exclusively for the duration of each capture. Action
//! handlers are the single point of controlled concurrency.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::audio::{FrameSource, Segmenter, Utterance};
use crate::dispatch::ActionDispatcher;
use crate::router::{IntentRouter, RoutingResult};
use crate::wake::PhraseTable;

/// Decoded text for one utterance
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    /// Probability that the utterance contained no speech (0.0 to 1.0)
    pub no_speech_prob: f32,
}

/// Speech-recognition collaborator
#[async_trait::async_trait]
pub trait Decoder: Send + Sync {
    async fn decode(&self, utterance: &Utterance) -> Result<Transcript>;
}

/// Response playback collaborator
#[async_trait::async_trait]
pub trait Speaker: Send + Sync {
    async fn say(&self, text: &str, persona: Option<&str>) -> Result<()>;
}

// Successive capture failures tolerated before the loop gives up on the
// device and terminates
const MAX_CAPTURE_FAILURES: u32 = 5;
const CAPTURE_RETRY_DELAY: Duration = Duration::from_secs(1);
const DISPATCH_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The audio interaction loop
pub struct AssistantPipeline {
    segmenter: Segmenter,
    source: Box<dyn FrameSource>,
    decoder: Arc<dyn Decoder>,
    phrases: PhraseTable,
    router: Arc<IntentRouter>,
    dispatcher: Arc<ActionDispatcher>,
    speaker: Arc<dyn Speaker>,
    space: String,
    no_speech_threshold: f32,
}

impl AssistantPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        segmenter: Segmenter,
        source: Box<dyn FrameSource>,
        decoder: Arc<dyn Decoder>,
        phrases: PhraseTable,
        router: Arc<IntentRouter>,
        dispatcher: Arc<ActionDispatcher>,
        speaker: Arc<dyn Speaker>,
        space: String,
        no_speech_threshold: f32,
    ) -> Self {
        Self {
            segmenter,
            source,
            decoder,
            phrases,
            router,
            dispatcher,
            speaker,
            space,
            no_speech_threshold,
        }
    }

    /// Run the capture loop until shutdown is signalled
    ///
    /// Returns an error only for unrecoverable infrastructure failures; the
    /// loop absorbs per-utterance failures and keeps listening.
    pub async fn run(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        if self.phrases.is_empty() {
            bail!("no wake phrases configured, the pipeline would never route");
        }

        info!("Assistant pipeline started");
        let mut capture_failures = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let utterance = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.segmenter.capture(self.source.as_mut()) => match result {
                    Ok(utterance) => {
                        capture_failures = 0;
                        utterance
                    }
                    Err(e) => {
                        capture_failures += 1;
                        warn!(
                            "Capture failed ({}/{}): {:#}",
                            capture_failures, MAX_CAPTURE_FAILURES, e
                        );
                        if capture_failures >= MAX_CAPTURE_FAILURES {
                            self.dispatcher.shutdown(DISPATCH_SHUTDOWN_GRACE).await;
                            return Err(e).context("audio device unavailable, giving up");
                        }
                        tokio::time::sleep(CAPTURE_RETRY_DELAY).await;
                        continue;
                    }
                },
            };

            if let Err(e) = self.process(&utterance).await {
                // Routing-service errors are infrastructure failures
                error!("Routing failed: {:#}", e);
                self.dispatcher.shutdown(DISPATCH_SHUTDOWN_GRACE).await;
                return Err(e);
            }
        }

        info!("Assistant pipeline stopping");
        // The select! arm may have cancelled a capture mid-flight, leaving
        // the device acquired
        if let Err(e) = self.source.stop().await {
            warn!("Failed to stop audio source: {}", e);
        }
        self.dispatcher.shutdown(DISPATCH_SHUTDOWN_GRACE).await;
        Ok(())
    }

    /// One strictly sequential pass: decode → match → route → dispatch
    async fn process(&self, utterance: &Utterance) -> Result<()> {
        let transcript = match self.decoder.decode(utterance).await {
            Ok(t) => t,
            Err(e) => {
                // Skip this utterance, resume capture
                warn!("Decode failed, skipping utterance: {:#}", e);
                return Ok(());
            }
        };

        if transcript.no_speech_prob > self.no_speech_threshold {
            debug!(
                "Discarding utterance, no-speech probability {:.2}",
                transcript.no_speech_prob
            );
            return Ok(());
        }

        let Some(wake) = self.phrases.matches(&transcript.text) else {
            debug!("No wake phrase in '{}', treating as ambient", transcript.text);
            return Ok(());
        };

        info!("Wake phrase matched, persona '{}': {}", wake.persona, wake.residual);

        let result = self.router.route(&wake.residual, &self.space).await?;

        match result {
            RoutingResult::Answer(text) => {
                if let Err(e) = self.speaker.say(&text, Some(&wake.persona)).await {
                    warn!("Failed to speak answer: {:#}", e);
                }
            }
            RoutingResult::Action(id) => {
                self.dispatcher.dispatch(&id).await;
            }
            RoutingResult::NoMatch { reply } => {
                if let Err(e) = self.speaker.say(&reply, Some(&wake.persona)).await {
                    warn!("Failed to speak fallback: {:#}", e);
                }
            }
        }

        Ok(())
    }
}
