//! Event emission from the audio thread
//!
//! The orchestrator hands borrowed events to an [`EventSink`]. The production
//! sink, [`EventEmitter`], copies them into owned [`QueuedEvent`]s and pushes
//! them onto the lock-free queue drained by the UDP sender. It never blocks
//! and never allocates: when the queue is full the event is dropped and
//! counted.

mod event_queue;

use std::sync::Arc;

use rtrb::PushError;

use crate::analysis::PitchEstimate;
use crate::telemetry::PipelineCounters;

pub use event_queue::{EmitterChannels, EventQueue, EventQueueChannels, SenderChannels};

/// Event produced by analysis of one window, borrowing the orchestrator's
/// scratch buffers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalysisEvent<'a> {
    Onset,
    Spectrum(&'a [f32]),
    Pitch(PitchEstimate),
}

impl AnalysisEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            AnalysisEvent::Onset => EventKind::Onset,
            AnalysisEvent::Spectrum(_) => EventKind::Spectrum,
            AnalysisEvent::Pitch(_) => EventKind::Pitch,
        }
    }
}

/// Owned event waiting in the sender queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedEvent {
    Onset,
    /// Reduced spectrum in a pooled buffer
    Spectrum(Vec<f32>),
    Pitch(PitchEstimate),
}

impl QueuedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            QueuedEvent::Onset => EventKind::Onset,
            QueuedEvent::Spectrum(_) => EventKind::Spectrum,
            QueuedEvent::Pitch(_) => EventKind::Pitch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Onset,
    Spectrum,
    Pitch,
}

/// Destination for analysis events.
///
/// Implementations called from the audio thread must not block. Returns
/// whether the event was accepted.
pub trait EventSink {
    fn emit(&mut self, event: AnalysisEvent<'_>) -> bool;
}

/// Collects events in memory; used by offline tools and tests
impl EventSink for Vec<QueuedEvent> {
    fn emit(&mut self, event: AnalysisEvent<'_>) -> bool {
        self.push(match event {
            AnalysisEvent::Onset => QueuedEvent::Onset,
            AnalysisEvent::Spectrum(values) => QueuedEvent::Spectrum(values.to_vec()),
            AnalysisEvent::Pitch(estimate) => QueuedEvent::Pitch(estimate),
        });
        true
    }
}

/// Real-time sink feeding the sender queue
pub struct EventEmitter {
    channels: EmitterChannels,
    /// Buffer taken from the pool whose event was rejected by a full queue
    stash: Option<Vec<f32>>,
    counters: Arc<PipelineCounters>,
}

impl EventEmitter {
    pub fn new(channels: EmitterChannels, counters: Arc<PipelineCounters>) -> Self {
        Self {
            channels,
            stash: None,
            counters,
        }
    }

    fn take_buffer(&mut self) -> Option<Vec<f32>> {
        self.stash
            .take()
            .or_else(|| self.channels.pool_consumer.pop().ok())
    }
}

impl EventSink for EventEmitter {
    fn emit(&mut self, event: AnalysisEvent<'_>) -> bool {
        let kind = event.kind();
        let queued = match event {
            AnalysisEvent::Onset => QueuedEvent::Onset,
            AnalysisEvent::Pitch(estimate) => QueuedEvent::Pitch(estimate),
            AnalysisEvent::Spectrum(values) => {
                let Some(mut buffer) = self.take_buffer() else {
                    self.counters.record_drop();
                    return false;
                };
                buffer.clear();
                buffer.extend_from_slice(values);
                QueuedEvent::Spectrum(buffer)
            }
        };

        match self.channels.event_producer.push(queued) {
            Ok(()) => {
                self.counters.record_event(kind);
                true
            }
            Err(PushError::Full(rejected)) => {
                if let QueuedEvent::Spectrum(buffer) = rejected {
                    self.stash = Some(buffer);
                }
                self.counters.record_drop();
                false
            }
        }
    }
}
