use serde::{Deserialize, Serialize};

/// Utterance sent to the speech-to-text service for decoding
#[derive(Debug, Serialize, Deserialize)]
pub struct UtteranceMessage {
    pub id: String,
    /// Base64-encoded PCM bytes (i16 little-endian, mono)
    pub pcm: String,
    pub sample_rate: u32,
    /// RFC3339 timestamp
    pub timestamp: String,
}

/// Transcript returned by the speech-to-text service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub text: String,
    /// Probability that the utterance contained no speech (0.0 to 1.0)
    pub no_speech_prob: f32,
    pub timestamp: String,
}

/// Action forwarded over the bus for external handlers
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: String,
    pub timestamp: String,
}

/// Answer forwarded to the text-to-speech service for playback
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeechMessage {
    pub text: String,
    /// Assistant identity bound by the wake phrase, if any
    #[serde(default)]
    pub persona: Option<String>,
    pub timestamp: String,
}
