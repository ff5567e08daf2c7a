use anyhow::{Context, Result};
use base64::Engine;
use std::time::Duration;

use super::messages::{SpeechMessage, TranscriptMessage, UtteranceMessage};
use super::MessageBus;
use crate::audio::Utterance;
use crate::config::BusConfig;
use crate::pipeline::{Decoder, Speaker, Transcript};

/// Decoder that delegates to a speech-to-text service over NATS
/// request/reply
pub struct BusDecoder {
    client: async_nats::Client,
    subject: String,
    timeout: Duration,
}

impl BusDecoder {
    pub fn new(client: async_nats::Client, cfg: &BusConfig) -> Self {
        Self {
            client,
            subject: cfg.stt_subject.clone(),
            timeout: Duration::from_millis(cfg.stt_timeout_ms),
        }
    }
}

#[async_trait::async_trait]
impl Decoder for BusDecoder {
    async fn decode(&self, utterance: &Utterance) -> Result<Transcript> {
        let request = UtteranceMessage {
            id: uuid::Uuid::new_v4().to_string(),
            pcm: base64::engine::general_purpose::STANDARD.encode(&utterance.pcm),
            sample_rate: utterance.sample_rate,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_vec(&request)?;

        let reply = tokio::time::timeout(
            self.timeout,
            self.client.request(self.subject.clone(), payload.into()),
        )
        .await
        .context("decode request timed out")?
        .context("decode request failed")?;

        let message: TranscriptMessage = serde_json::from_slice(&reply.payload)
            .context("failed to parse transcript reply")?;

        Ok(Transcript {
            text: message.text,
            no_speech_prob: message.no_speech_prob,
        })
    }
}

/// Speaker that forwards answers to the text-to-speech service over the bus
pub struct BusSpeaker {
    bus: std::sync::Arc<dyn MessageBus>,
    subject: String,
}

impl BusSpeaker {
    pub fn new(bus: std::sync::Arc<dyn MessageBus>, cfg: &BusConfig) -> Self {
        Self {
            bus,
            subject: cfg.tts_subject.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Speaker for BusSpeaker {
    async fn say(&self, text: &str, persona: Option<&str>) -> Result<()> {
        let message = SpeechMessage {
            text: text.to_string(),
            persona: persona.map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.bus
            .publish(&self.subject, serde_json::to_vec(&message)?)
            .await
    }
}
