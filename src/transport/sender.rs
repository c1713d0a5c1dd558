// UDP sender task
//
// Drains the event queue on the tokio runtime, encodes each event into one
// datagram and sends it best-effort. Failed sends are counted and dropped,
// never retried. Spectrum buffers go back to the pool after sending.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rtrb::PopError;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::wire;
use crate::config::NetworkConfig;
use crate::emitter::{QueuedEvent, SenderChannels};
use crate::engine::ShutdownSignal;
use crate::error::{log_transport_error, TransportError};
use crate::telemetry::{PipelineCounters, StatsReporter};

/// How long the sender sleeps when the queue is empty
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Minimum time between two logged send failures
const FAILURE_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Unconnected UDP socket plus a reusable encode buffer
pub struct UdpSender {
    socket: UdpSocket,
    destination: SocketAddr,
    payload: Vec<u8>,
}

impl UdpSender {
    /// Resolve the configured destination and bind an ephemeral local port
    pub async fn connect(config: &NetworkConfig) -> Result<Self, TransportError> {
        let target = config.destination();
        let destination = tokio::net::lookup_host(target.as_str())
            .await
            .map_err(|err| TransportError::ResolveFailed {
                destination: target.clone(),
                reason: err.to_string(),
            })?
            .next()
            .ok_or_else(|| TransportError::ResolveFailed {
                destination: target.clone(),
                reason: "no addresses".to_string(),
            })?;

        let local = if destination.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|err| TransportError::BindFailed {
                reason: err.to_string(),
            })?;

        Ok(Self {
            socket,
            destination,
            payload: Vec::with_capacity(wire::MAX_DATAGRAM_LEN.min(4096)),
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(|err| TransportError::BindFailed {
                reason: err.to_string(),
            })
    }

    /// Encode and send one event; returns the datagram length
    pub async fn send(&mut self, event: &QueuedEvent) -> Result<usize, TransportError> {
        wire::encode(event, &mut self.payload)?;
        self.socket
            .send_to(&self.payload, self.destination)
            .await
            .map_err(|err| TransportError::SendFailed {
                reason: err.to_string(),
            })
    }
}

/// Logs the first send failure, then at most one summary per interval
struct FailureLog {
    interval: Duration,
    last_logged: Option<Instant>,
    suppressed: u64,
}

impl FailureLog {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_logged: None,
            suppressed: 0,
        }
    }

    fn record(&mut self, err: &TransportError, now: Instant) {
        let due = self
            .last_logged
            .map_or(true, |at| now.duration_since(at) >= self.interval);
        if !due {
            self.suppressed += 1;
            return;
        }
        if self.suppressed > 0 {
            tracing::warn!(
                suppressed = self.suppressed,
                "further send failures since last report"
            );
        }
        log_transport_error(err, "send");
        self.last_logged = Some(now);
        self.suppressed = 0;
    }
}

struct SenderTask {
    sender: UdpSender,
    channels: SenderChannels,
    shutdown: ShutdownSignal,
    counters: Arc<PipelineCounters>,
    reporter: StatsReporter,
    failures: FailureLog,
}

impl SenderTask {
    async fn run(mut self) {
        tracing::debug!(destination = %self.sender.destination(), "sender task started");

        loop {
            self.reporter.poll(Instant::now());

            if self.shutdown.is_triggered() {
                let drain = self
                    .shutdown
                    .reason()
                    .is_some_and(|reason| reason.drains_queue());
                if drain {
                    while let Ok(event) = self.channels.event_consumer.pop() {
                        self.deliver(event).await;
                    }
                }
                break;
            }

            match self.channels.event_consumer.pop() {
                Ok(event) => self.deliver(event).await,
                Err(PopError::Empty) => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                        _ = self.shutdown.wait() => {}
                    }
                }
            }
        }

        self.reporter.report_final();
        tracing::debug!("sender task stopped");
    }

    async fn deliver(&mut self, event: QueuedEvent) {
        match self.sender.send(&event).await {
            Ok(_) => self.counters.record_sent(),
            Err(err) => {
                self.counters.record_send_failure();
                self.failures.record(&err, Instant::now());
            }
        }
        if let QueuedEvent::Spectrum(buffer) = event {
            // Pool has room for every buffer ever allocated
            let _ = self.channels.pool_producer.push(buffer);
        }
    }
}

/// Spawn the sender on the current tokio runtime.
///
/// The task exits once `shutdown` is triggered; queued events are discarded
/// unless the reason is end of input.
pub fn spawn_sender(
    sender: UdpSender,
    channels: SenderChannels,
    shutdown: ShutdownSignal,
    counters: Arc<PipelineCounters>,
    report_interval: Duration,
) -> JoinHandle<()> {
    let task = SenderTask {
        sender,
        channels,
        shutdown,
        reporter: StatsReporter::new(Arc::clone(&counters), report_interval),
        counters,
        failures: FailureLog::new(FAILURE_LOG_INTERVAL),
    };
    tokio::spawn(task.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PitchEstimate;
    use crate::emitter::EventQueue;
    use crate::engine::ShutdownReason;
    use crate::transport::wire::{decode, Datagram};

    fn init_test_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime")
    }

    async fn listener() -> (UdpSocket, NetworkConfig) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port,
            queue_capacity: 16,
        };
        (socket, config)
    }

    async fn recv(socket: &UdpSocket) -> Datagram {
        let mut buf = vec![0u8; 2048];
        let len = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf))
            .await
            .expect("datagram expected")
            .unwrap();
        decode(&buf[..len]).unwrap()
    }

    #[test]
    fn test_send_single_event() {
        init_test_runtime().block_on(async {
            let (socket, config) = listener().await;
            let mut sender = UdpSender::connect(&config).await.unwrap();
            assert_eq!(sender.destination(), socket.local_addr().unwrap());

            let sent = sender.send(&QueuedEvent::Onset).await.unwrap();
            assert_eq!(sent, 1);
            assert_eq!(recv(&socket).await, Datagram::Onset);
        });
    }

    #[test]
    fn test_sender_task_drains_queue_and_recycles_buffers() {
        init_test_runtime().block_on(async {
            let (socket, config) = listener().await;
            let sender = UdpSender::connect(&config).await.unwrap();
            let counters = PipelineCounters::new();
            let shutdown = ShutdownSignal::new();
            let (mut emitter, sender_channels) = EventQueue::new(4, 2).split_for_threads();
            let spare = 4 + 2;

            let task = spawn_sender(
                sender,
                sender_channels,
                shutdown.clone(),
                Arc::clone(&counters),
                Duration::ZERO,
            );

            let mut buffer = emitter.pool_consumer.pop().unwrap();
            buffer.extend_from_slice(&[1.0, 2.0]);
            emitter
                .event_producer
                .push(QueuedEvent::Spectrum(buffer))
                .unwrap();
            emitter
                .event_producer
                .push(QueuedEvent::Pitch(PitchEstimate {
                    frequency: 110.0,
                    confidence: 0.5,
                }))
                .unwrap();

            assert_eq!(
                recv(&socket).await,
                Datagram::Spectrum {
                    values: vec![1.0, 2.0]
                }
            );
            assert!(matches!(recv(&socket).await, Datagram::Pitch { .. }));

            shutdown.trigger(ShutdownReason::Requested);
            tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .expect("sender should stop")
                .unwrap();

            let mut returned = 0;
            while emitter.pool_consumer.pop().is_ok() {
                returned += 1;
            }
            assert_eq!(returned, spare);
            assert_eq!(counters.snapshot().datagrams_sent, 2);
        });
    }

    #[test]
    fn test_end_of_input_flushes_queue() {
        init_test_runtime().block_on(async {
            let (socket, config) = listener().await;
            let sender = UdpSender::connect(&config).await.unwrap();
            let shutdown = ShutdownSignal::new();
            let (mut emitter, sender_channels) = EventQueue::new(8, 1).split_for_threads();

            for _ in 0..3 {
                emitter.event_producer.push(QueuedEvent::Onset).unwrap();
            }
            shutdown.trigger(ShutdownReason::EndOfInput);

            let task = spawn_sender(
                sender,
                sender_channels,
                shutdown,
                PipelineCounters::new(),
                Duration::ZERO,
            );
            task.await.unwrap();

            for _ in 0..3 {
                assert_eq!(recv(&socket).await, Datagram::Onset);
            }
        });
    }

    #[test]
    fn test_failure_log_rate_limits() {
        let mut log = FailureLog::new(Duration::from_secs(5));
        let err = TransportError::SendFailed {
            reason: "unreachable".to_string(),
        };
        let start = Instant::now();
        log.record(&err, start);
        log.record(&err, start + Duration::from_secs(1));
        log.record(&err, start + Duration::from_secs(2));
        assert_eq!(log.suppressed, 2);

        log.record(&err, start + Duration::from_secs(6));
        assert_eq!(log.suppressed, 0);
    }
}
