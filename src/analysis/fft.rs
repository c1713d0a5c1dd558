// FFT module - magnitude spectrum of one analysis window
//
// The plan, the complex buffer and the scratch space are all created up
// front so `transform` never allocates on the audio thread.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::{SpectralTransform, SpectrumFrame};
use crate::error::AnalysisError;

/// Pre-compute a Hann window of `size` samples
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (size as f32 - 1.0)).cos())
        })
        .collect()
}

/// FFT processor that computes `W/2 + 1` magnitude bins per window
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    window_size: usize,
    /// Analysis window applied before the transform (all ones when disabled)
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `window_size` - FFT length W
    /// * `hann` - apply a Hann window to reduce spectral leakage
    pub fn new(window_size: usize, hann: bool) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window = if hann {
            hann_window(window_size)
        } else {
            vec![1.0; window_size]
        };

        Self {
            fft,
            window_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); window_size],
            scratch,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl SpectralTransform for FftProcessor {
    fn transform(&mut self, window: &[f32], spectrum: &mut SpectrumFrame) -> Result<(), AnalysisError> {
        if window.len() != self.window_size {
            return Err(AnalysisError::WindowLength {
                expected: self.window_size,
                actual: window.len(),
            });
        }
        let bins = self.window_size / 2 + 1;
        if spectrum.bin_count() != bins {
            return Err(AnalysisError::BufferLength {
                what: "magnitude spectrum",
                expected: bins,
                actual: spectrum.bin_count(),
            });
        }

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(window).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Only positive frequencies; the input is real
        let mut finite = true;
        for (magnitude, c) in spectrum.magnitudes_mut().iter_mut().zip(&self.buffer) {
            *magnitude = c.norm();
            finite &= magnitude.is_finite();
        }

        if finite {
            Ok(())
        } else {
            Err(AnalysisError::NonFinite { primitive: "fft" })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine_at_bin(bin: usize, size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / size as f32).sin())
            .collect()
    }

    fn peak_bin(spectrum: &SpectrumFrame) -> usize {
        spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let mut fft = FftProcessor::new(256, true);
        let mut spectrum = SpectrumFrame::new(256);
        fft.transform(&sine_at_bin(10, 256), &mut spectrum).unwrap();

        assert_eq!(spectrum.bin_count(), 129);
        assert_eq!(peak_bin(&spectrum), 10);
    }

    #[test]
    fn test_rectangular_window_magnitude() {
        let mut fft = FftProcessor::new(64, false);
        let mut spectrum = SpectrumFrame::new(64);
        fft.transform(&vec![1.0; 64], &mut spectrum).unwrap();

        // DC of a constant signal is the sum of its samples
        assert!((spectrum.magnitudes()[0] - 64.0).abs() < 1e-3);
        assert!(spectrum.magnitudes()[1..].iter().all(|m| *m < 1e-3));
    }

    #[test]
    fn test_silence_gives_zero_spectrum() {
        let mut fft = FftProcessor::new(128, true);
        let mut spectrum = SpectrumFrame::new(128);
        fft.transform(&[0.0; 128], &mut spectrum).unwrap();
        assert!(spectrum.magnitudes().iter().all(|m| *m == 0.0));
    }

    #[test]
    fn test_wrong_window_length() {
        let mut fft = FftProcessor::new(128, true);
        let mut spectrum = SpectrumFrame::new(128);
        let err = fft.transform(&[0.0; 100], &mut spectrum).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::WindowLength {
                expected: 128,
                actual: 100
            }
        );
    }

    #[test]
    fn test_non_finite_input_is_error() {
        let mut fft = FftProcessor::new(64, true);
        let mut spectrum = SpectrumFrame::new(64);
        let mut window = vec![0.1; 64];
        window[20] = f32::NAN;
        assert_eq!(
            fft.transform(&window, &mut spectrum),
            Err(AnalysisError::NonFinite { primitive: "fft" })
        );
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(5);
        assert_eq!(window.len(), 5);
        assert!(window[0].abs() < 1e-6);
        assert!((window[2] - 1.0).abs() < 1e-6);
        assert!(window[4].abs() < 1e-6);
    }
}
