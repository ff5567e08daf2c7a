use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub routing: RoutingConfig,
    pub bus: BusConfig,
    pub wake: WakeConfig,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (the decoder expects 16kHz)
    pub sample_rate: u32,
    /// Samples per VAD frame
    pub frame_size: usize,
    /// Trailing silence that completes an utterance, in milliseconds
    pub silence_timeout_ms: u64,
    /// Hard cap on a single utterance, in milliseconds
    pub max_utterance_ms: u64,
    /// Speech-probability threshold for the silero detector (0.0 to 1.0)
    pub vad_threshold: f32,
    /// Energy-detector aggressiveness (0 = permissive .. 3 = strict), used
    /// by builds without the `vad-silero` feature
    pub vad_level: u8,
    /// Transcripts with a no-speech probability above this are discarded
    pub no_speech_threshold: f32,
    /// Optional directory for archiving captured utterances as WAV
    #[serde(default)]
    pub archive_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Conversational space queried by the audio pipeline
    pub space: String,
    /// Nearest-neighbor distances strictly below this count as a match
    pub distance_threshold: f32,
    /// Embedding vector length, fixed between index and query time
    pub embedding_dim: usize,
    /// CSV seed corpus used to (re)initialize the index
    pub seed_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    pub url: String,
    /// Connection attempts before giving up
    pub connect_attempts: u32,
    /// Delay between connection attempts, in milliseconds
    pub backoff_ms: u64,
    /// Request/reply subject of the speech-to-text service
    pub stt_subject: String,
    pub stt_timeout_ms: u64,
    /// Subject spoken answers are forwarded to for playback
    pub tts_subject: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WakeConfig {
    /// Checked in order; the first matching phrase wins
    pub phrases: Vec<WakePhrase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WakePhrase {
    pub phrase: String,
    pub persona: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    pub id: String,
    pub kind: ActionKind,
    /// Media path, file path, or bus subject depending on kind
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Play a media file with the local player
    Media,
    /// Open a local file for display
    File,
    /// Forward the action id over the pub/sub bus
    Bus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsConfig {
    /// Operator-declared subscription units, loaded without recompiling
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    pub plugin: String,
    pub topic: String,
    /// Action dispatched for every inbound message on the topic
    #[serde(default)]
    pub action: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

