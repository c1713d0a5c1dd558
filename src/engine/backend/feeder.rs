//! Feeder backend: drives the pipeline from a [`BlockSource`] on a plain
//! thread, standing in for the audio callback during replay and simulation.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::AudioBackend;
use crate::audio::CapturePipeline;
use crate::engine::{ShutdownReason, ShutdownSignal};
use crate::error::AudioError;

/// Result of filling a block from a [`BlockSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRead {
    /// Block contains `frames_written` samples; `finished` marks the last one.
    Data {
        frames_written: usize,
        finished: bool,
    },
    /// No more samples available.
    Finished,
}

/// Source of mono blocks at a fixed sample rate.
pub trait BlockSource: Send {
    fn sample_rate(&self) -> u32;
    fn describe(&self) -> String;
    fn read_into(&mut self, buffer: &mut [f32]) -> BlockRead;
}

/// How fast blocks are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One block per block-duration, like a sound card
    Realtime,
    /// As fast as the pipeline can take them
    Unpaced,
}

pub struct FeederBackend {
    source: Option<Box<dyn BlockSource>>,
    description: String,
    sample_rate: u32,
    block_frames: usize,
    pacing: Pacing,
    handle: Option<JoinHandle<()>>,
}

impl FeederBackend {
    pub fn new(source: Box<dyn BlockSource>, block_frames: usize, pacing: Pacing) -> Self {
        Self {
            description: source.describe(),
            sample_rate: source.sample_rate(),
            source: Some(source),
            block_frames: block_frames.max(1),
            pacing,
            handle: None,
        }
    }
}

impl AudioBackend for FeederBackend {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, pipeline: CapturePipeline, shutdown: ShutdownSignal) -> Result<(), AudioError> {
        if self.handle.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        let source = self.source.take().ok_or_else(|| AudioError::StreamFailure {
            reason: "block source already consumed".to_string(),
        })?;

        let period = Duration::from_secs_f64(self.block_frames as f64 / self.sample_rate.max(1) as f64);
        let pacing = self.pacing;
        let block_frames = self.block_frames;

        let handle = std::thread::Builder::new()
            .name("firemix-feeder".to_string())
            .spawn(move || feed(source, pipeline, shutdown, block_frames, pacing, period))
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("failed to spawn feeder thread: {}", e),
            })?;

        tracing::info!(
            "Listening at {:.1} kHz on {}",
            self.sample_rate as f32 / 1000.0,
            self.description
        );
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let handle = self.handle.take().ok_or(AudioError::NotRunning)?;
        handle.join().map_err(|_| AudioError::StreamFailure {
            reason: "feeder thread panicked".to_string(),
        })
    }
}

fn feed(
    mut source: Box<dyn BlockSource>,
    mut pipeline: CapturePipeline,
    shutdown: ShutdownSignal,
    block_frames: usize,
    pacing: Pacing,
    period: Duration,
) {
    let mut buffer = vec![0.0f32; block_frames];
    let mut next_block = Instant::now();

    while !shutdown.is_triggered() {
        match source.read_into(&mut buffer) {
            BlockRead::Data {
                frames_written,
                finished,
            } => {
                pipeline.process_block(&buffer[..frames_written.min(block_frames)]);
                if finished {
                    shutdown.trigger(ShutdownReason::EndOfInput);
                    break;
                }
            }
            BlockRead::Finished => {
                shutdown.trigger(ShutdownReason::EndOfInput);
                break;
            }
        }

        if pacing == Pacing::Realtime {
            next_block += period;
            let now = Instant::now();
            if next_block > now {
                std::thread::sleep(next_block - now);
            }
        }
    }
    // Pipeline (and every primitive it owns) is dropped with this thread
}
