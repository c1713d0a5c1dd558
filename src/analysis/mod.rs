// Analysis module - per-window analysis on the audio thread
//
// The orchestrator runs once per completed window:
// 1. FFT -> magnitude spectrum
// 2. If the rate limiter says a spectrum is due, reduce it and emit
// 3. Pitch estimate (YIN), emitted whenever it is finite
// 4. Onset detection on the same spectrum; an onset may end the block
//
// Primitive failures never propagate: the window simply produces fewer
// events and a counter is bumped for the stats reporter.

pub mod fft;
pub mod onset;
pub mod pitch;
pub mod rate_limiter;


use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, OnsetPolicy};
use crate::emitter::{AnalysisEvent, EventSink};
use crate::error::AnalysisError;
use crate::spectrum::SpectralReducer;
use crate::telemetry::PipelineCounters;

pub use fft::FftProcessor;
pub use onset::OnsetDetector;
pub use pitch::YinPitchDetector;
pub use rate_limiter::RateLimiter;

/// What the accumulator should do after a window has been analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Continue,
    /// Drop the rest of the current hardware block
    Interrupt,
}

/// Magnitude spectrum of one window (`W/2 + 1` bins)
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    magnitudes: Vec<f32>,
}

impl SpectrumFrame {
    pub fn new(window_size: usize) -> Self {
        Self {
            magnitudes: vec![0.0; window_size / 2 + 1],
        }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn magnitudes_mut(&mut self) -> &mut [f32] {
        &mut self.magnitudes
    }

    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }
}

/// Fundamental frequency estimate for one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Hz; 0 when the window is unvoiced
    pub frequency: f32,
    /// 0..=1
    pub confidence: f32,
}

impl PitchEstimate {
    pub fn is_finite(&self) -> bool {
        self.frequency.is_finite() && self.confidence.is_finite()
    }
}

/// Window -> magnitude spectrum
pub trait SpectralTransform: Send {
    fn transform(&mut self, window: &[f32], spectrum: &mut SpectrumFrame) -> Result<(), AnalysisError>;
}

/// Stateful onset decision over successive windows
pub trait OnsetDetection: Send {
    fn detect(&mut self, window: &[f32], spectrum: &SpectrumFrame) -> Result<bool, AnalysisError>;
}

/// Fundamental frequency estimation over a single window
pub trait PitchEstimation: Send {
    fn estimate(&mut self, window: &[f32]) -> Result<PitchEstimate, AnalysisError>;
}

/// Sizes and policies the orchestrator needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    pub window_size: usize,
    pub hop_size: usize,
    pub spectrum_interval_samples: u64,
    pub onset_policy: OnsetPolicy,
}

impl From<&AnalysisConfig> for OrchestratorSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            window_size: config.window_size,
            hop_size: config.hop_size,
            spectrum_interval_samples: config.spectrum_interval_samples,
            onset_policy: config.onset_policy,
        }
    }
}

/// Runs the analysis primitives over each completed window and emits events
pub struct AnalysisOrchestrator {
    settings: OrchestratorSettings,
    transform: Box<dyn SpectralTransform>,
    reducer: SpectralReducer,
    onset: Option<Box<dyn OnsetDetection>>,
    pitch: Option<Box<dyn PitchEstimation>>,
    limiter: RateLimiter,
    spectrum: SpectrumFrame,
    reduced: Vec<f32>,
    counters: Arc<PipelineCounters>,
}

impl AnalysisOrchestrator {
    /// Orchestrator with only the spectral path; attach onset and pitch
    /// with [`with_onset`](Self::with_onset) and [`with_pitch`](Self::with_pitch)
    pub fn new(
        settings: OrchestratorSettings,
        transform: Box<dyn SpectralTransform>,
        reducer: SpectralReducer,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        let reduced = vec![0.0; reducer.output_len()];
        Self {
            limiter: RateLimiter::new(settings.spectrum_interval_samples),
            spectrum: SpectrumFrame::new(settings.window_size),
            settings,
            transform,
            reducer,
            onset: None,
            pitch: None,
            reduced,
            counters,
        }
    }

    /// Build the standard FFT / spectral flux / YIN pipeline from configuration
    pub fn from_config(
        config: &AnalysisConfig,
        sample_rate: u32,
        reducer: SpectralReducer,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        let settings = OrchestratorSettings::from(config);
        let transform = Box::new(FftProcessor::new(config.window_size, config.hann_window));
        let mut orchestrator = Self::new(settings, transform, reducer, counters);

        if config.onset.enabled {
            orchestrator = orchestrator.with_onset(Box::new(OnsetDetector::with_config(
                config.window_size,
                config.hop_size,
                sample_rate,
                &config.onset,
            )));
        }
        if config.pitch.enabled {
            let yin = YinPitchDetector::new(config.window_size, sample_rate, &config.pitch);
            if yin.lowest_frequency() > config.pitch.min_frequency_hz {
                tracing::info!(
                    requested_hz = config.pitch.min_frequency_hz,
                    lowest_hz = yin.lowest_frequency(),
                    "window too short for the requested lowest pitch"
                );
            }
            orchestrator = orchestrator.with_pitch(Box::new(yin));
        }
        orchestrator
    }

    pub fn with_onset(mut self, detector: Box<dyn OnsetDetection>) -> Self {
        self.onset = Some(detector);
        self
    }

    pub fn with_pitch(mut self, estimator: Box<dyn PitchEstimation>) -> Self {
        self.pitch = Some(estimator);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Length of every emitted spectrum
    pub fn bucket_count(&self) -> usize {
        self.reduced.len()
    }

    /// Analyze one window and push whatever events it produces into `sink`.
    pub fn process_window<S>(&mut self, window: &[f32], sink: &mut S) -> WindowOutcome
    where
        S: EventSink + ?Sized,
    {
        self.counters.record_window();

        let spectrum_ready = match self.transform.transform(window, &mut self.spectrum) {
            Ok(()) => true,
            Err(_) => {
                self.counters.record_primitive_failure();
                false
            }
        };

        if self.limiter.advance(self.settings.hop_size as u64) && spectrum_ready {
            match self.reducer.reduce(self.spectrum.magnitudes(), &mut self.reduced) {
                Ok(()) => {
                    sink.emit(AnalysisEvent::Spectrum(&self.reduced));
                    self.limiter.reset();
                }
                Err(_) => self.counters.record_primitive_failure(),
            }
        }

        if let Some(pitch) = self.pitch.as_mut() {
            match pitch.estimate(window) {
                Ok(estimate) if estimate.is_finite() => {
                    sink.emit(AnalysisEvent::Pitch(estimate));
                }
                _ => self.counters.record_primitive_failure(),
            }
        }

        if !spectrum_ready {
            return WindowOutcome::Continue;
        }

        if let Some(onset) = self.onset.as_mut() {
            match onset.detect(window, &self.spectrum) {
                Ok(true) => {
                    sink.emit(AnalysisEvent::Onset);
                    if self.settings.onset_policy == OnsetPolicy::DiscardBlockRemainder {
                        return WindowOutcome::Interrupt;
                    }
                }
                Ok(false) => {}
                Err(_) => self.counters.record_primitive_failure(),
            }
        }

        WindowOutcome::Continue
    }
}
