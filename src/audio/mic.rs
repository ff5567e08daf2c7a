use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::frame::{AudioFrame, FrameSource};

/// Microphone frame source backed by cpal
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread for the
/// lifetime of a capture; frames are handed to the async side over an mpsc
/// channel. The device is held exclusively from `start` until `stop`.
pub struct MicSource {
    frame_size: usize,
    running: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicSource {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl FrameSource for MicSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.running.load(Ordering::SeqCst) {
            return Err(anyhow!("microphone already capturing"));
        }

        let (tx, rx) = mpsc::channel::<AudioFrame>(64);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let frame_size = self.frame_size;
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let worker = std::thread::spawn(move || {
            let stream = match build_input_stream(frame_size, tx) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!("Failed to start input stream: {}", e);
                return;
            }

            while running.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            drop(stream);
            debug!("Microphone stream released");
        });

        // Surface device-acquisition failure to the caller; it is fatal to
        // this capture only and the capture loop may retry.
        let sample_rate = ready_rx
            .recv()
            .context("microphone worker exited before reporting readiness")??;

        info!("Microphone capture started at {} Hz", sample_rate);

        self.worker = Some(worker);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Microphone worker panicked");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn build_input_stream(
    frame_size: usize,
    tx: mpsc::Sender<AudioFrame>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device available"))?;

    info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let config: cpal::StreamConfig = device
        .default_input_config()
        .context("failed to get input config")?
        .into();

    let sample_rate = config.sample_rate.0;
    let channels = config.channels as usize;

    let mut pending: Vec<i16> = Vec::with_capacity(frame_size);
    let mut emitted_samples: u64 = 0;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix to mono and convert to i16 PCM
                for frame in data.chunks(channels) {
                    let mono = frame.iter().sum::<f32>() / channels as f32;
                    let sample = (mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    pending.push(sample);

                    if pending.len() == frame_size {
                        let samples = std::mem::replace(
                            &mut pending,
                            Vec::with_capacity(frame_size),
                        );
                        let timestamp_ms = emitted_samples * 1000 / sample_rate as u64;
                        emitted_samples += frame_size as u64;

                        let frame = AudioFrame {
                            samples,
                            sample_rate,
                            timestamp_ms,
                        };
                        if let Err(e) = tx.try_send(frame) {
                            debug!("Dropping audio frame, consumer is behind: {}", e);
                        }
                    }
                }
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .context("failed to build input stream")?;

    Ok((stream, sample_rate))
}
