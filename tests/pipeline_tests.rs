// End-to-end pipeline tests with scripted audio and stubbed collaborators

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

use hearsay::audio::{
    AudioFrame, EnergyVad, FrameSource, ScriptedSource, Segmenter, SegmenterConfig, Utterance,
};
use hearsay::config::{RoutingConfig, WakePhrase};
use hearsay::dispatch::{ActionDispatcher, ActionHandler};
use hearsay::pipeline::{AssistantPipeline, Decoder, Speaker, Transcript};
use hearsay::router::seed::{self, SeedRow};
use hearsay::router::{Embedder, HashEmbedder, IntentRouter, MemoryIndex, VectorIndex};
use hearsay::wake::PhraseTable;

struct StubDecoder {
    text: String,
    no_speech_prob: f32,
}

#[async_trait::async_trait]
impl Decoder for StubDecoder {
    async fn decode(&self, _utterance: &Utterance) -> Result<Transcript> {
        Ok(Transcript {
            text: self.text.clone(),
            no_speech_prob: self.no_speech_prob,
        })
    }
}

/// Speaker that records everything it is asked to say
struct StubSpeaker {
    said: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

#[async_trait::async_trait]
impl Speaker for StubSpeaker {
    async fn say(&self, text: &str, persona: Option<&str>) -> Result<()> {
        self.said
            .lock()
            .await
            .push((text.to_string(), persona.map(str::to_string)));
        Ok(())
    }
}

struct Recorder {
    tx: mpsc::Sender<String>,
}

#[async_trait::async_trait]
impl ActionHandler for Recorder {
    async fn run(&self) -> Result<()> {
        self.tx.send("show_veloute".to_string()).await.ok();
        Ok(())
    }
}

/// One utterance worth of frames: speech followed by the full silence timeout
fn one_utterance_frames() -> Vec<AudioFrame> {
    let mut frames: Vec<AudioFrame> = (0..5)
        .map(|i| AudioFrame {
            samples: vec![1000i16; 160],
            sample_rate: 16000,
            timestamp_ms: i * 10,
        })
        .collect();
    frames.extend((5..105).map(|i| AudioFrame {
        samples: vec![0i16; 160],
        sample_rate: 16000,
        timestamp_ms: i * 10,
    }));
    frames
}

async fn seeded_router() -> Arc<IntentRouter> {
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

    let cfg = RoutingConfig {
        space: "chatbot".to_string(),
        distance_threshold: 0.55,
        embedding_dim: 384,
        seed_file: "unused.csv".to_string(),
    };
    Arc::new(IntentRouter::new(embedder, index, &cfg))
}

fn build_pipeline(
    source: Box<dyn FrameSource>,
    decoder: Arc<dyn Decoder>,
    router: Arc<IntentRouter>,
    dispatcher: Arc<ActionDispatcher>,
    speaker: Arc<dyn Speaker>,
) -> AssistantPipeline {
    let segmenter = Segmenter::new(
        SegmenterConfig {
            silence_timeout_ms: 1000,
            max_utterance_ms: 30_000,
            archive_dir: None,
        },
        Box::new(EnergyVad::with_threshold(100.0)),
    );

    let phrases = PhraseTable::new(vec![
        WakePhrase {
            phrase: "mini max".to_string(),
            persona: "Mini Max".to_string(),
        },
        WakePhrase {
            phrase: "alfred".to_string(),
            persona: "Alfred".to_string(),
        },
    ]);

    AssistantPipeline::new(
        segmenter,
        source,
        decoder,
        phrases,
        router,
        dispatcher,
        speaker,
        "chatbot".to_string(),
        0.5,
    )
}

#[tokio::test]
async fn test_action_route_reaches_dispatcher() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut dispatcher = ActionDispatcher::new();
    dispatcher.register("show_veloute", Arc::new(Recorder { tx }));

    let said = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = build_pipeline(
        Box::new(ScriptedSource::new(one_utterance_frames())),
        Arc::new(StubDecoder {
            text: "mini max what's the veloute".to_string(),
            no_speech_prob: 0.1,
        }),
        seeded_router().await,
        Arc::new(dispatcher),
        Arc::new(StubSpeaker { said: Arc::clone(&said) }),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { pipeline.run(&mut shutdown_rx).await });

    let action = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("action should be dispatched")
        .unwrap();
    assert_eq!(action, "show_veloute");

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    // An action route never speaks
    assert!(said.lock().await.is_empty());
}

#[tokio::test]
async fn test_answer_route_is_spoken_with_persona() {
    let said = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = build_pipeline(
        Box::new(ScriptedSource::new(one_utterance_frames())),
        Arc::new(StubDecoder {
            text: "alfred hello".to_string(),
            no_speech_prob: 0.1,
        }),
        seeded_router().await,
        Arc::new(ActionDispatcher::new()),
        Arc::new(StubSpeaker { said: Arc::clone(&said) }),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { pipeline.run(&mut shutdown_rx).await });

    // Poll until the answer lands
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if !said.lock().await.is_empty() {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "answer never spoken");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let said = said.lock().await;
    assert_eq!(said[0].0, "Hello! How can I help you today?");
    assert_eq!(said[0].1.as_deref(), Some("Alfred"));
}

#[tokio::test]
async fn test_high_no_speech_probability_is_discarded() {
    let said = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = build_pipeline(
        Box::new(ScriptedSource::new(one_utterance_frames())),
        Arc::new(StubDecoder {
            text: "mini max hello".to_string(),
            no_speech_prob: 0.9,
        }),
        seeded_router().await,
        Arc::new(ActionDispatcher::new()),
        Arc::new(StubSpeaker { said: Arc::clone(&said) }),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { pipeline.run(&mut shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert!(said.lock().await.is_empty());
}

/// Endless silence source that records whether `stop` was invoked
struct TrackedSource {
    stopped: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl FrameSource for TrackedSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            let mut index = 0u64;
            loop {
                let frame = AudioFrame {
                    samples: vec![0i16; 160],
                    sample_rate: 16000,
                    timestamp_ms: index * 10,
                };
                index += 1;
                if tx.send(frame).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "tracked"
    }
}

#[tokio::test]
async fn test_shutdown_mid_capture_releases_the_source() {
    let stopped = Arc::new(AtomicBool::new(false));
    let said = Arc::new(Mutex::new(Vec::new()));

    // Silence-only frames keep the capture in flight indefinitely, so the
    // shutdown signal lands mid-capture
    let mut pipeline = build_pipeline(
        Box::new(TrackedSource {
            stopped: Arc::clone(&stopped),
        }),
        Arc::new(StubDecoder {
            text: String::new(),
            no_speech_prob: 0.1,
        }),
        seeded_router().await,
        Arc::new(ActionDispatcher::new()),
        Arc::new(StubSpeaker { said }),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { pipeline.run(&mut shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert!(
        stopped.load(Ordering::SeqCst),
        "the audio source must be released on shutdown"
    );
}

#[test]
fn test_pipeline_moves_across_tasks() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AssistantPipeline>();
}

#[tokio::test]
async fn test_transcript_without_wake_phrase_is_ambient() {
    let said = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = build_pipeline(
        Box::new(ScriptedSource::new(one_utterance_frames())),
        Arc::new(StubDecoder {
            text: "people talking in the background".to_string(),
            no_speech_prob: 0.1,
        }),
        seeded_router().await,
        Arc::new(ActionDispatcher::new()),
        Arc::new(StubSpeaker { said: Arc::clone(&said) }),
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { pipeline.run(&mut shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert!(said.lock().await.is_empty());
}
