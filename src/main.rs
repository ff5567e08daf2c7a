use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use hearsay::audio::{Segmenter, SegmenterConfig, SpeechDetector};
use hearsay::bus::{BusDecoder, BusSpeaker, MessageBus, NatsBus};
use hearsay::config::Config;
use hearsay::dispatch::ActionDispatcher;
use hearsay::http::{create_router, AppState};
use hearsay::pipeline::AssistantPipeline;
use hearsay::plugins::PluginRegistry;
use hearsay::router::{seed, Embedder, HashEmbedder, IntentRouter, MemoryIndex, VectorIndex};
use hearsay::wake::PhraseTable;

#[derive(Parser)]
#[command(name = "hearsay", version, about = "Voice-driven assistant core")]
struct Cli {
    /// Config file (extension resolved by the config loader)
    #[arg(short, long, default_value = "config/hearsay")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the audio interaction pipeline
    Listen,
    /// Serve the HTTP routing endpoint
    Serve,
    /// Run the pub/sub worker and register plugins
    Bus,
    /// Validate the seed corpus and report what would be indexed
    Seed,
    /// Run all services
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load config '{}'", cli.config))?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let shutdown = shutdown_signal();

    match cli.command {
        Command::Listen => run_listen(cfg, shutdown).await,
        Command::Serve => run_serve(cfg, shutdown).await,
        Command::Bus => run_bus(cfg, shutdown).await,
        Command::Seed => run_seed(cfg).await,
        Command::Start => run_start(cfg, shutdown).await,
    }
}

/// Flip a watch channel when the process receives a termination signal
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        let _ = tx.send(true);
    });

    rx
}

/// One context object holds the model and index handles; components receive
/// it by reference, nothing is process-global
fn build_routing(cfg: &Config) -> (Arc<dyn Embedder>, Arc<dyn VectorIndex>, Arc<IntentRouter>) {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(cfg.routing.embedding_dim));
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new());
    let router = Arc::new(IntentRouter::new(
        Arc::clone(&embedder),
        Arc::clone(&index),
        &cfg.routing,
    ));
    (embedder, index, router)
}

async fn run_listen(cfg: Config, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let (_, _, router) = build_routing(&cfg);
    let bus = Arc::new(NatsBus::connect(&cfg.bus).await?);
    let bus_dyn: Arc<dyn MessageBus> = Arc::clone(&bus) as Arc<dyn MessageBus>;

    let decoder = Arc::new(BusDecoder::new(bus.client(), &cfg.bus));
    let speaker = Arc::new(BusSpeaker::new(Arc::clone(&bus_dyn), &cfg.bus));
    let dispatcher = Arc::new(ActionDispatcher::from_config(&cfg.actions, Some(bus_dyn)));

    let segmenter = Segmenter::new(SegmenterConfig::from(&cfg.audio), make_detector(&cfg)?);

    let source = make_source(&cfg)?;

    let mut pipeline = AssistantPipeline::new(
        segmenter,
        source,
        decoder,
        PhraseTable::from_config(&cfg.wake),
        router,
        dispatcher,
        speaker,
        cfg.routing.space.clone(),
        cfg.audio.no_speech_threshold,
    );

    pipeline.run(&mut shutdown).await
}

#[cfg(feature = "audio-io")]
fn make_source(cfg: &Config) -> Result<Box<dyn hearsay::audio::FrameSource>> {
    Ok(Box::new(hearsay::audio::MicSource::new(
        cfg.audio.frame_size,
    )))
}

#[cfg(not(feature = "audio-io"))]
fn make_source(_cfg: &Config) -> Result<Box<dyn hearsay::audio::FrameSource>> {
    anyhow::bail!("built without the audio-io feature, no microphone support")
}

#[cfg(feature = "vad-silero")]
fn make_detector(cfg: &Config) -> Result<Box<dyn SpeechDetector>> {
    Ok(Box::new(hearsay::audio::SileroVad::new(
        cfg.audio.sample_rate,
        cfg.audio.vad_threshold,
    )?))
}

#[cfg(not(feature = "vad-silero"))]
fn make_detector(cfg: &Config) -> Result<Box<dyn SpeechDetector>> {
    Ok(Box::new(hearsay::audio::EnergyVad::new(cfg.audio.vad_level)))
}

async fn run_serve(cfg: Config, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let (embedder, index, router) = build_routing(&cfg);

    // Seed up front so the first request does not pay for it
    let seeded = seed::seed_from_file(
        index.as_ref(),
        embedder.as_ref(),
        &cfg.routing.space,
        std::path::Path::new(&cfg.routing.seed_file),
    )
    .await?;
    info!("Index ready with {} entries", seeded);

    let app = create_router(AppState::new(router));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .context("HTTP server failed")
}

async fn run_bus(cfg: Config, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let bus: Arc<dyn MessageBus> = Arc::new(NatsBus::connect(&cfg.bus).await?);
    let dispatcher = Arc::new(ActionDispatcher::from_config(&cfg.actions, Some(Arc::clone(&bus))));

    let registrars = PluginRegistry::discover(&cfg.plugins, Some(Arc::clone(&dispatcher)));
    let report = PluginRegistry::register_all(bus.as_ref(), &registrars).await;

    info!(
        "Bus worker running with {} subscription(s)",
        report.registered.len()
    );

    // Message delivery happens on the subscription tasks; park until shutdown
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }

    dispatcher.shutdown(std::time::Duration::from_secs(5)).await;
    info!("Bus worker stopped");
    Ok(())
}

async fn run_seed(cfg: Config) -> Result<()> {
    let (embedder, index, _) = build_routing(&cfg);

    let count = seed::seed_from_file(
        index.as_ref(),
        embedder.as_ref(),
        &cfg.routing.space,
        std::path::Path::new(&cfg.routing.seed_file),
    )
    .await?;

    info!(
        "Seed corpus OK: {} entries for space '{}' ({} dims, model '{}')",
        count,
        cfg.routing.space,
        embedder.dim(),
        embedder.model_name()
    );
    Ok(())
}

async fn run_start(cfg: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let listen = tokio::spawn(run_listen(cfg.clone(), shutdown.clone()));
    let bus = tokio::spawn(run_bus(cfg.clone(), shutdown.clone()));
    let serve = tokio::spawn(run_serve(cfg, shutdown));

    let (listen, bus, serve) = tokio::join!(listen, bus, serve);
    for (name, result) in [("listen", listen), ("bus", bus), ("serve", serve)] {
        match result {
            Ok(Ok(())) => info!("Service '{}' stopped cleanly", name),
            Ok(Err(e)) => error!("Service '{}' failed: {:#}", name, e),
            Err(e) => error!("Service '{}' panicked: {}", name, e),
        }
    }
    Ok(())
}
