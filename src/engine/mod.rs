//! Engine: wires a backend, the capture pipeline and the UDP sender.
//!
//! Startup loads everything that can fail (bucket map, socket, device)
//! before the first block is processed. After that nothing on the audio
//! path returns an error; the engine runs until its [`ShutdownSignal`]
//! fires for one of the [`ShutdownReason`]s.

pub mod backend;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::audio::CapturePipeline;
use crate::config::AppConfig;
use crate::emitter::{EventEmitter, EventQueue};
use crate::error::{log_audio_error, AudioError, StartupError};
use crate::telemetry::{CounterSnapshot, PipelineCounters};
use crate::transport::{spawn_sender, UdpSender};

pub use backend::AudioBackend;
pub use shutdown::{ShutdownReason, ShutdownSignal};

/// A running capture-analysis-send pipeline
pub struct Engine {
    backend: Box<dyn AudioBackend>,
    sender: Option<JoinHandle<()>>,
    shutdown: ShutdownSignal,
    counters: Arc<PipelineCounters>,
    destination: SocketAddr,
}

impl Engine {
    /// Validate `config`, bring up the sender and start `backend`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: &AppConfig, mut backend: Box<dyn AudioBackend>) -> Result<Self, StartupError> {
        config.validate()?;

        let sample_rate = backend.sample_rate();
        let map = config
            .spectrum
            .bucket_map
            .load(config.analysis.window_size, sample_rate)?;
        tracing::info!(
            revision = map.revision(),
            buckets = map.len(),
            "bucket map loaded"
        );
        let bucket_count = map.len();

        let sender = UdpSender::connect(&config.network).await?;
        let destination = sender.destination();

        let counters = PipelineCounters::new();
        let shutdown = ShutdownSignal::new();
        let (emitter_channels, sender_channels) =
            EventQueue::new(config.network.queue_capacity, bucket_count).split_for_threads();

        let pipeline = CapturePipeline::from_config(
            config,
            sample_rate,
            map,
            EventEmitter::new(emitter_channels, Arc::clone(&counters)),
            shutdown.clone(),
            Arc::clone(&counters),
        );

        let sender_task = spawn_sender(
            sender,
            sender_channels,
            shutdown.clone(),
            Arc::clone(&counters),
            Duration::from_secs(config.telemetry.report_interval_secs),
        );

        if let Err(err) = backend.start(pipeline, shutdown.clone()) {
            log_audio_error(&err, "Engine::start");
            shutdown.trigger(ShutdownReason::Requested);
            let _ = sender_task.await;
            return Err(err.into());
        }

        tracing::info!(
            input = %backend.describe(),
            %destination,
            window = config.analysis.window_size,
            hop = config.analysis.hop_size,
            "engine started"
        );

        Ok(Self {
            backend,
            sender: Some(sender_task),
            shutdown,
            counters,
            destination,
        })
    }

    /// Handle for waiting on or triggering shutdown
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Stop input and wait for the sender to finish.
    ///
    /// `reason` is ignored if shutdown was already triggered, e.g. by end of
    /// input or a lost device. Returns the final counter totals.
    pub async fn stop(mut self, reason: ShutdownReason) -> Result<CounterSnapshot, AudioError> {
        self.shutdown.trigger(reason);
        let stopped = self.backend.stop();

        if let Some(task) = self.sender.take() {
            if let Err(err) = task.await {
                tracing::warn!("sender task ended abnormally: {}", err);
            }
        }

        tracing::info!(
            reason = %self.shutdown.reason().map(|r| r.to_string()).unwrap_or_default(),
            "engine stopped"
        );
        stopped.map(|_| self.counters.snapshot())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Dropped without stop(): let the sender task exit on its own
        self.shutdown.trigger(ShutdownReason::Requested);
    }
}
