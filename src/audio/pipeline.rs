// CapturePipeline - everything that runs inside the audio callback
//
// One owned object moved into the callback (or feeder thread): accumulator,
// orchestrator and sink. No locks, no allocation, no logging per block.

use std::sync::Arc;

use super::accumulator::{FrameAccumulator, PushSummary};
use crate::analysis::AnalysisOrchestrator;
use crate::config::AppConfig;
use crate::emitter::{EventEmitter, EventSink};
use crate::engine::ShutdownSignal;
use crate::spectrum::{BucketMap, SpectralReducer};
use crate::telemetry::PipelineCounters;

pub struct CapturePipeline<S: EventSink = EventEmitter> {
    accumulator: FrameAccumulator,
    orchestrator: AnalysisOrchestrator,
    sink: S,
    shutdown: ShutdownSignal,
    counters: Arc<PipelineCounters>,
}

impl<S: EventSink> CapturePipeline<S> {
    pub fn new(
        accumulator: FrameAccumulator,
        orchestrator: AnalysisOrchestrator,
        sink: S,
        shutdown: ShutdownSignal,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            accumulator,
            orchestrator,
            sink,
            shutdown,
            counters,
        }
    }

    /// Assemble the standard pipeline for a validated configuration
    pub fn from_config(
        config: &AppConfig,
        sample_rate: u32,
        map: BucketMap,
        sink: S,
        shutdown: ShutdownSignal,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        let accumulator = FrameAccumulator::new(
            config.analysis.window_size,
            config.analysis.hop_size,
            config.audio.block_capacity,
            config.audio.pad_short_blocks,
        );
        let orchestrator = AnalysisOrchestrator::from_config(
            &config.analysis,
            sample_rate,
            SpectralReducer::new(map),
            Arc::clone(&counters),
        );
        Self::new(accumulator, orchestrator, sink, shutdown, counters)
    }

    /// Feed one mono hardware block.
    ///
    /// Once shutdown has been triggered blocks are ignored, so a window that
    /// was half accumulated is simply discarded.
    pub fn process_block(&mut self, block: &[f32]) -> PushSummary {
        if self.shutdown.is_triggered() {
            return PushSummary::default();
        }

        let Self {
            accumulator,
            orchestrator,
            sink,
            counters,
            ..
        } = self;

        counters.record_block(block.len(), block.len() < accumulator.block_capacity());
        let summary = accumulator.push(block, |window| orchestrator.process_window(window, sink));
        if summary.interrupted {
            counters.record_interrupt();
        }
        summary
    }

    pub fn accumulator(&self) -> &FrameAccumulator {
        &self.accumulator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OnsetPolicy;
    use crate::emitter::QueuedEvent;
    use crate::engine::ShutdownReason;
    use crate::spectrum::LogSpacedLayout;

    fn small_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.analysis.window_size = 256;
        config.analysis.hop_size = 256;
        config.analysis.spectrum_interval_samples = 256;
        config.audio.block_capacity = 256;
        config
    }

    fn pipeline(config: &AppConfig) -> CapturePipeline<Vec<QueuedEvent>> {
        let map = LogSpacedLayout {
            bucket_count: 32,
            ..LogSpacedLayout::default()
        }
        .generate(config.analysis.window_size, 44_100)
        .unwrap();
        CapturePipeline::from_config(
            config,
            44_100,
            map,
            Vec::new(),
            ShutdownSignal::new(),
            PipelineCounters::new(),
        )
    }

    fn count(events: &[QueuedEvent], kind: crate::emitter::EventKind) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_one_spectrum_and_pitch_per_window() {
        let config = small_config();
        let mut pipeline = pipeline(&config);

        for _ in 0..4 {
            pipeline.process_block(&[0.0; 256]);
        }

        let events = pipeline.sink();
        assert_eq!(count(events, crate::emitter::EventKind::Spectrum), 4);
        assert_eq!(count(events, crate::emitter::EventKind::Pitch), 4);
        assert_eq!(count(events, crate::emitter::EventKind::Onset), 0);
        for event in events {
            if let QueuedEvent::Spectrum(values) = event {
                assert_eq!(values.len(), 32);
            }
        }
    }

    #[test]
    fn test_onset_discards_rest_of_block() {
        let mut config = small_config();
        config.analysis.onset_policy = OnsetPolicy::DiscardBlockRemainder;
        config.analysis.pitch.enabled = false;
        config.audio.block_capacity = 1024;
        let mut pipeline = pipeline(&config);

        pipeline.process_block(&[0.0; 1024]);
        pipeline.process_block(&[0.0; 1024]);

        // Loud click in the first window of the next block
        let mut block = vec![0.0; 1024];
        for sample in &mut block[100..140] {
            *sample = 0.9;
        }
        let summary = pipeline.process_block(&block);

        assert!(summary.interrupted);
        assert_eq!(summary.windows, 1);
        assert_eq!(summary.consumed, 256);
        assert_eq!(pipeline.accumulator().cursor(), 0);
        assert_eq!(pipeline.sink().last(), Some(&QueuedEvent::Onset));
    }

    #[test]
    fn test_onset_continue_policy_keeps_consuming() {
        let mut config = small_config();
        config.analysis.onset_policy = OnsetPolicy::Continue;
        config.analysis.pitch.enabled = false;
        config.audio.block_capacity = 1024;
        let mut pipeline = pipeline(&config);

        pipeline.process_block(&[0.0; 1024]);
        let mut block = vec![0.0; 1024];
        for sample in &mut block[100..140] {
            *sample = 0.9;
        }
        let summary = pipeline.process_block(&block);

        assert!(!summary.interrupted);
        assert_eq!(summary.windows, 4);
        assert_eq!(count(pipeline.sink(), crate::emitter::EventKind::Onset), 1);
    }

    #[test]
    fn test_blocks_ignored_after_shutdown() {
        let config = small_config();
        let mut pipeline = pipeline(&config);
        pipeline.process_block(&[0.0; 128]);

        pipeline
            .shutdown_signal()
            .trigger(ShutdownReason::DeviceLost("gone".to_string()));
        let summary = pipeline.process_block(&[0.0; 256]);

        assert_eq!(summary, PushSummary::default());
        assert!(pipeline.sink().is_empty());
        assert_eq!(pipeline.accumulator().cursor(), 128);
    }
}
