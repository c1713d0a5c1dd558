// YIN fundamental frequency estimator
//
// de Cheveigné & Kawahara, "YIN, a fundamental frequency estimator for
// speech and music" (2002): squared difference function, cumulative mean
// normalization, absolute threshold, parabolic interpolation.

use super::{PitchEstimate, PitchEstimation};
use crate::config::PitchConfig;
use crate::error::AnalysisError;

/// YIN pitch detector over fixed-size windows
///
/// Lags are searched in `[sample_rate / max_hz, sample_rate / min_hz]`,
/// capped at half the window. When no lag dips under the tolerance the
/// window is unvoiced: frequency 0 with a confidence from the best lag.
pub struct YinPitchDetector {
    sample_rate: f32,
    window_size: usize,
    half: usize,
    tolerance: f32,
    min_lag: usize,
    max_lag: usize,
    /// Cumulative mean normalized difference, indexed by lag
    yin: Vec<f32>,
}

impl YinPitchDetector {
    pub fn new(window_size: usize, sample_rate: u32, config: &PitchConfig) -> Self {
        let half = (window_size / 2).max(2);
        let sr = sample_rate as f32;
        let max_lag = ((sr / config.min_frequency_hz).ceil() as usize).clamp(2, half);
        let min_lag = ((sr / config.max_frequency_hz).floor() as usize).clamp(2, max_lag);

        Self {
            sample_rate: sr,
            window_size,
            half,
            tolerance: config.tolerance,
            min_lag,
            max_lag,
            yin: vec![1.0; half + 1],
        }
    }

    /// Lowest frequency this detector can report given the window length
    pub fn lowest_frequency(&self) -> f32 {
        self.sample_rate / self.max_lag as f32
    }

    fn difference(&mut self, window: &[f32]) {
        let half = self.half;
        self.yin[0] = 1.0;
        let mut running = 0.0f32;

        for tau in 1..=self.max_lag {
            let d: f32 = window[..half]
                .iter()
                .zip(&window[tau..tau + half])
                .map(|(a, b)| {
                    let delta = a - b;
                    delta * delta
                })
                .sum();
            running += d;
            self.yin[tau] = if running > 0.0 {
                d * tau as f32 / running
            } else {
                1.0
            };
        }
    }

    fn absolute_threshold(&self) -> Option<usize> {
        let mut tau = self.min_lag;
        while tau <= self.max_lag {
            if self.yin[tau] < self.tolerance {
                while tau < self.max_lag && self.yin[tau + 1] < self.yin[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }
        None
    }

    fn parabolic_interpolation(&self, tau: usize) -> f32 {
        if tau <= self.min_lag || tau >= self.max_lag {
            return tau as f32;
        }
        let s0 = self.yin[tau - 1];
        let s1 = self.yin[tau];
        let s2 = self.yin[tau + 1];
        let denom = s0 - 2.0 * s1 + s2;
        if denom.abs() < f32::EPSILON {
            return tau as f32;
        }
        tau as f32 + (s0 - s2) / (2.0 * denom)
    }
}

impl PitchEstimation for YinPitchDetector {
    fn estimate(&mut self, window: &[f32]) -> Result<PitchEstimate, AnalysisError> {
        if window.len() != self.window_size {
            return Err(AnalysisError::WindowLength {
                expected: self.window_size,
                actual: window.len(),
            });
        }
        if window.iter().any(|s| !s.is_finite()) {
            return Err(AnalysisError::NonFinite { primitive: "pitch" });
        }

        self.difference(window);

        let estimate = match self.absolute_threshold() {
            Some(tau) => PitchEstimate {
                frequency: self.sample_rate / self.parabolic_interpolation(tau),
                confidence: (1.0 - self.yin[tau]).clamp(0.0, 1.0),
            },
            None => {
                let best = self.yin[self.min_lag..=self.max_lag]
                    .iter()
                    .copied()
                    .fold(1.0f32, f32::min);
                PitchEstimate {
                    frequency: 0.0,
                    confidence: (1.0 - best).clamp(0.0, 1.0),
                }
            }
        };

        if estimate.is_finite() {
            Ok(estimate)
        } else {
            Err(AnalysisError::NonFinite { primitive: "pitch" })
        }
    }
}
