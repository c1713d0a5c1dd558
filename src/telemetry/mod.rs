//! Pipeline counters and the periodic stats reporter.
//!
//! The audio callback only ever does relaxed `fetch_add`s on these counters.
//! Reading, diffing and logging happens on the sender task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::emitter::EventKind;

/// Shared lock-free counters for every stage of the pipeline.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    blocks: AtomicU64,
    samples: AtomicU64,
    short_blocks: AtomicU64,
    windows: AtomicU64,
    interrupted_blocks: AtomicU64,
    spectra: AtomicU64,
    onsets: AtomicU64,
    pitches: AtomicU64,
    primitive_failures: AtomicU64,
    events_dropped: AtomicU64,
    datagrams_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_block(&self, samples: usize, short: bool) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(samples as u64, Ordering::Relaxed);
        if short {
            self.short_blocks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_window(&self) {
        self.windows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interrupt(&self) {
        self.interrupted_blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event that made it into the sender queue
    pub fn record_event(&self, kind: EventKind) {
        let counter = match kind {
            EventKind::Onset => &self.onsets,
            EventKind::Spectrum => &self.spectra,
            EventKind::Pitch => &self.pitches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_primitive_failure(&self) {
        self.primitive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            short_blocks: self.short_blocks.load(Ordering::Relaxed),
            windows: self.windows.load(Ordering::Relaxed),
            interrupted_blocks: self.interrupted_blocks.load(Ordering::Relaxed),
            spectra: self.spectra.load(Ordering::Relaxed),
            onsets: self.onsets.load(Ordering::Relaxed),
            pitches: self.pitches.load(Ordering::Relaxed),
            primitive_failures: self.primitive_failures.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub blocks: u64,
    pub samples: u64,
    pub short_blocks: u64,
    pub windows: u64,
    pub interrupted_blocks: u64,
    pub spectra: u64,
    pub onsets: u64,
    pub pitches: u64,
    pub primitive_failures: u64,
    pub events_dropped: u64,
    pub datagrams_sent: u64,
    pub send_failures: u64,
}

impl CounterSnapshot {
    /// Counts accumulated since `earlier`.
    pub fn since(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            blocks: self.blocks.saturating_sub(earlier.blocks),
            samples: self.samples.saturating_sub(earlier.samples),
            short_blocks: self.short_blocks.saturating_sub(earlier.short_blocks),
            windows: self.windows.saturating_sub(earlier.windows),
            interrupted_blocks: self
                .interrupted_blocks
                .saturating_sub(earlier.interrupted_blocks),
            spectra: self.spectra.saturating_sub(earlier.spectra),
            onsets: self.onsets.saturating_sub(earlier.onsets),
            pitches: self.pitches.saturating_sub(earlier.pitches),
            primitive_failures: self
                .primitive_failures
                .saturating_sub(earlier.primitive_failures),
            events_dropped: self.events_dropped.saturating_sub(earlier.events_dropped),
            datagrams_sent: self.datagrams_sent.saturating_sub(earlier.datagrams_sent),
            send_failures: self.send_failures.saturating_sub(earlier.send_failures),
        }
    }
}

/// Logs counter deltas at a fixed interval.
///
/// Failures that the real-time path swallows (primitive errors, queue
/// overflow, send errors) surface here as warnings.
pub struct StatsReporter {
    counters: Arc<PipelineCounters>,
    interval: Option<Duration>,
    last: CounterSnapshot,
    last_report: Instant,
}

impl StatsReporter {
    /// A zero interval disables periodic reports.
    pub fn new(counters: Arc<PipelineCounters>, interval: Duration) -> Self {
        let last = counters.snapshot();
        Self {
            counters,
            interval: (!interval.is_zero()).then_some(interval),
            last,
            last_report: Instant::now(),
        }
    }

    /// Report if the interval has elapsed. Returns the delta that was logged.
    pub fn poll(&mut self, now: Instant) -> Option<CounterSnapshot> {
        let interval = self.interval?;
        if now.duration_since(self.last_report) < interval {
            return None;
        }
        self.last_report = now;
        Some(self.report())
    }

    /// Log totals for the whole run.
    pub fn report_final(&mut self) -> CounterSnapshot {
        let total = self.counters.snapshot();
        tracing::info!(
            blocks = total.blocks,
            windows = total.windows,
            spectra = total.spectra,
            onsets = total.onsets,
            pitches = total.pitches,
            sent = total.datagrams_sent,
            dropped = total.events_dropped,
            primitive_failures = total.primitive_failures,
            send_failures = total.send_failures,
            "pipeline totals"
        );
        self.last = total;
        total
    }

    fn report(&mut self) -> CounterSnapshot {
        let current = self.counters.snapshot();
        let delta = current.since(&self.last);
        self.last = current;

        if delta.primitive_failures > 0 {
            tracing::warn!(
                count = delta.primitive_failures,
                "analysis primitives failed; affected windows produced no events"
            );
        }
        if delta.events_dropped > 0 {
            tracing::warn!(count = delta.events_dropped, "events dropped, sender queue full");
        }
        if delta.send_failures > 0 {
            tracing::warn!(count = delta.send_failures, "datagrams failed to send");
        }
        tracing::debug!(
            blocks = delta.blocks,
            short_blocks = delta.short_blocks,
            windows = delta.windows,
            interrupted = delta.interrupted_blocks,
            spectra = delta.spectra,
            onsets = delta.onsets,
            pitches = delta.pitches,
            sent = delta.datagrams_sent,
            "pipeline stats"
        );
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = PipelineCounters::new();
        counters.record_block(512, true);
        counters.record_block(1024, false);
        counters.record_window();
        counters.record_event(EventKind::Spectrum);
        counters.record_event(EventKind::Onset);
        counters.record_drop();

        let snap = counters.snapshot();
        assert_eq!(snap.blocks, 2);
        assert_eq!(snap.samples, 1536);
        assert_eq!(snap.short_blocks, 1);
        assert_eq!(snap.windows, 1);
        assert_eq!(snap.spectra, 1);
        assert_eq!(snap.onsets, 1);
        assert_eq!(snap.pitches, 0);
        assert_eq!(snap.events_dropped, 1);
    }

    #[test]
    fn test_snapshot_delta() {
        let counters = PipelineCounters::new();
        counters.record_sent();
        let first = counters.snapshot();
        counters.record_sent();
        counters.record_sent();
        counters.record_send_failure();

        let delta = counters.snapshot().since(&first);
        assert_eq!(delta.datagrams_sent, 2);
        assert_eq!(delta.send_failures, 1);
    }

    #[test]
    fn test_reporter_respects_interval() {
        let counters = PipelineCounters::new();
        let mut reporter = StatsReporter::new(Arc::clone(&counters), Duration::from_secs(5));
        let start = reporter.last_report;

        counters.record_window();
        assert!(reporter.poll(start + Duration::from_secs(1)).is_none());

        let delta = reporter.poll(start + Duration::from_secs(6)).unwrap();
        assert_eq!(delta.windows, 1);

        counters.record_window();
        assert!(reporter.poll(start + Duration::from_secs(7)).is_none());
    }

    #[test]
    fn test_reporter_disabled_with_zero_interval() {
        let counters = PipelineCounters::new();
        let mut reporter = StatsReporter::new(counters, Duration::ZERO);
        assert!(reporter
            .poll(Instant::now() + Duration::from_secs(3600))
            .is_none());
    }
}
