// OnsetDetector - spectral flux onset detection, one window at a time
//
// Algorithm:
// 1. Take the magnitude spectrum the orchestrator already computed
// 2. Spectral flux: flux_t = Σ max(0, |X_t[k]| - |X_(t-1)[k]|), normalized by W/2
// 3. Adaptive threshold: median(last N flux values) * multiplier + offset
// 4. Fire on the rising edge of flux crossing the threshold, provided the
//    window is above the silence gate and the minimum interval has passed
//
// Causal: unlike an offline peak picker it never looks at future windows,
// so an onset is reported on the window in which it happens.

use super::{OnsetDetection, SpectrumFrame};
use crate::config::OnsetDetectionConfig;
use crate::error::AnalysisError;

/// Spectral flux onset detector with a median-based adaptive threshold
pub struct OnsetDetector {
    prev_spectrum: Vec<f32>,
    /// Ring of past flux values
    history: Vec<f32>,
    history_pos: usize,
    history_filled: usize,
    /// Scratch for the median, sized once
    sorted: Vec<f32>,
    threshold_offset: f32,
    threshold_multiplier: f32,
    flux_norm: f32,
    silence_db: f32,
    hop_size: u64,
    min_interval_samples: u64,
    samples_since_onset: u64,
    was_above: bool,
    last_flux: f32,
    frames_processed: u64,
}

impl OnsetDetector {
    /// Create a detector for windows of `window_size` samples arriving every
    /// `hop_size` samples at `sample_rate`
    pub fn with_config(
        window_size: usize,
        hop_size: usize,
        sample_rate: u32,
        config: &OnsetDetectionConfig,
    ) -> Self {
        let history_len = config.history_len.max(1);
        let min_interval_samples =
            (config.min_interval_ms.max(0.0) * sample_rate as f32 / 1000.0).round() as u64;

        Self {
            prev_spectrum: vec![0.0; window_size / 2 + 1],
            history: vec![0.0; history_len],
            history_pos: 0,
            history_filled: 0,
            sorted: vec![0.0; history_len],
            threshold_offset: config.threshold_offset,
            threshold_multiplier: config.threshold_multiplier,
            flux_norm: (window_size / 2).max(1) as f32,
            silence_db: config.silence_db,
            hop_size: hop_size.max(1) as u64,
            min_interval_samples,
            // Let the very first qualifying window fire
            samples_since_onset: min_interval_samples,
            was_above: false,
            last_flux: 0.0,
            frames_processed: 0,
        }
    }

    /// Flux of the most recent window
    pub fn last_spectral_flux(&self) -> f32 {
        self.last_flux
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Spectral flux as the sum of positive bin differences, normalized
    fn compute_spectral_flux(&self, spectrum: &[f32]) -> f32 {
        let flux: f32 = spectrum
            .iter()
            .zip(self.prev_spectrum.iter())
            .map(|(curr, prev)| (curr - prev).max(0.0))
            .sum();
        flux / self.flux_norm
    }

    /// threshold = median(history) * multiplier + offset
    fn adaptive_threshold(&mut self) -> f32 {
        let n = self.history_filled;
        if n == 0 {
            return self.threshold_offset;
        }

        let scratch = &mut self.sorted[..n];
        scratch.copy_from_slice(&self.history[..n]);
        scratch.sort_unstable_by(|a, b| a.total_cmp(b));

        let median = if n % 2 == 0 {
            (scratch[n / 2 - 1] + scratch[n / 2]) / 2.0
        } else {
            scratch[n / 2]
        };

        median * self.threshold_multiplier + self.threshold_offset
    }

    fn push_history(&mut self, flux: f32) {
        self.history[self.history_pos] = flux;
        self.history_pos = (self.history_pos + 1) % self.history.len();
        self.history_filled = (self.history_filled + 1).min(self.history.len());
    }
}

/// Window level in dBFS from its RMS
fn level_db(window: &[f32]) -> f32 {
    if window.is_empty() {
        return f32::NEG_INFINITY;
    }
    let energy: f32 = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
    20.0 * energy.sqrt().max(1e-10).log10()
}

impl OnsetDetection for OnsetDetector {
    fn detect(&mut self, window: &[f32], spectrum: &SpectrumFrame) -> Result<bool, AnalysisError> {
        let magnitudes = spectrum.magnitudes();
        if magnitudes.len() != self.prev_spectrum.len() {
            return Err(AnalysisError::BufferLength {
                what: "magnitude spectrum",
                expected: self.prev_spectrum.len(),
                actual: magnitudes.len(),
            });
        }

        let flux = self.compute_spectral_flux(magnitudes);
        if !flux.is_finite() {
            return Err(AnalysisError::NonFinite { primitive: "onset" });
        }

        let threshold = self.adaptive_threshold();
        let above = flux > threshold;
        self.samples_since_onset = self.samples_since_onset.saturating_add(self.hop_size);

        let onset = self.frames_processed > 0
            && above
            && !self.was_above
            && level_db(window) > self.silence_db
            && self.samples_since_onset >= self.min_interval_samples;

        self.was_above = above;
        self.last_flux = flux;
        self.push_history(flux);
        self.prev_spectrum.copy_from_slice(magnitudes);
        self.frames_processed += 1;

        if onset {
            self.samples_since_onset = 0;
        }
        Ok(onset)
    }
}
