// Spectral reduction: magnitude spectrum -> bucketed spectrum

use crate::error::AnalysisError;
use crate::spectrum::BucketMap;

/// Collapses a `W/2 + 1` bin magnitude spectrum into one value per bucket.
///
/// Pure and allocation-free per call; the output slice is owned by the
/// caller and sized once from [`BucketMap::len`].
#[derive(Debug, Clone)]
pub struct SpectralReducer {
    map: BucketMap,
}

impl SpectralReducer {
    pub fn new(map: BucketMap) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &BucketMap {
        &self.map
    }

    /// Number of values written by each [`reduce`](Self::reduce)
    pub fn output_len(&self) -> usize {
        self.map.len()
    }

    /// Expected magnitude spectrum length
    pub fn input_len(&self) -> usize {
        self.map.window_size() / 2 + 1
    }

    pub fn reduce(&self, magnitudes: &[f32], out: &mut [f32]) -> Result<(), AnalysisError> {
        reduce(&self.map, magnitudes, out)
    }
}

/// Reduce `magnitudes` into `out` using `map`.
///
/// A bucket sharing its start bin with the next bucket linearly interpolates
/// between `start` and `start + 1`. Any other bucket sums bins
/// `start..=next`. Each value is then scaled by `gain / gain_divisor`.
pub fn reduce(map: &BucketMap, magnitudes: &[f32], out: &mut [f32]) -> Result<(), AnalysisError> {
    let bins = map.window_size() / 2 + 1;
    if magnitudes.len() != bins {
        return Err(AnalysisError::BufferLength {
            what: "magnitude spectrum",
            expected: bins,
            actual: magnitudes.len(),
        });
    }
    if out.len() != map.len() {
        return Err(AnalysisError::BufferLength {
            what: "reduced spectrum",
            expected: map.len(),
            actual: out.len(),
        });
    }

    let divisor = map.gain_divisor();
    for (i, (bucket, slot)) in map.buckets().iter().zip(out.iter_mut()).enumerate() {
        let start = bucket.start_bin;
        let next = map.next_bin(i);
        let value = if start == next {
            let f = bucket.fraction;
            magnitudes[start] * (1.0 - f) + magnitudes[start + 1] * f
        } else {
            magnitudes[start..=next].iter().sum::<f32>()
        };
        *slot = value * bucket.gain / divisor;
    }
    Ok(())
}
