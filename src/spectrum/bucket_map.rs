// Bucket map: how FFT bins collapse into the transmitted spectrum

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::BucketMapSource;
use crate::error::ConfigError;
use crate::transport::wire::MAX_SPECTRUM_BUCKETS;

/// One output bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// First FFT bin covered by this bucket
    pub start_bin: usize,
    /// Interpolation weight toward `start_bin + 1`, used only when this
    /// bucket shares its start bin with the next one
    #[serde(default)]
    pub fraction: f32,
    /// Per-bucket gain
    pub gain: f32,
}

/// Validated, immutable bucket layout for one window size
///
/// Invariants held by every instance:
/// - at least one bucket, no more than fit in one spectrum datagram
/// - start bins non-decreasing, all within `0..=window_size / 2`
/// - `end_bin` within `last start..=window_size / 2`
/// - a bucket whose start equals the next start has `start + 1` in range
/// - fractions in `[0, 1]`, gains finite, divisor finite and positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BucketMapDocument")]
pub struct BucketMap {
    revision: String,
    window_size: usize,
    /// Rate the bins were laid out for; older hand-tuned files omit it
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    gain_divisor: f32,
    end_bin: usize,
    buckets: Vec<Bucket>,
}

/// On-disk shape before validation
#[derive(Debug, Clone, Deserialize)]
struct BucketMapDocument {
    #[serde(default)]
    revision: String,
    window_size: usize,
    #[serde(default)]
    sample_rate: Option<u32>,
    gain_divisor: f32,
    end_bin: usize,
    buckets: Vec<Bucket>,
}

impl TryFrom<BucketMapDocument> for BucketMap {
    type Error = ConfigError;

    fn try_from(doc: BucketMapDocument) -> Result<Self, Self::Error> {
        BucketMap::new(
            doc.revision,
            doc.window_size,
            doc.gain_divisor,
            doc.end_bin,
            doc.buckets,
        )
        .map(|map| map.with_sample_rate(doc.sample_rate))
    }
}

impl BucketMap {
    pub fn new(
        revision: impl Into<String>,
        window_size: usize,
        gain_divisor: f32,
        end_bin: usize,
        buckets: Vec<Bucket>,
    ) -> Result<Self, ConfigError> {
        if window_size < 4 || window_size % 2 != 0 {
            return Err(ConfigError::bucket_map(format!(
                "window_size must be even and >= 4 (got {})",
                window_size
            )));
        }
        let max_bin = window_size / 2;

        if buckets.is_empty() {
            return Err(ConfigError::bucket_map("no buckets"));
        }
        if buckets.len() > MAX_SPECTRUM_BUCKETS {
            return Err(ConfigError::bucket_map(format!(
                "{} buckets exceed the {} that fit in one datagram",
                buckets.len(),
                MAX_SPECTRUM_BUCKETS
            )));
        }
        if !gain_divisor.is_finite() || gain_divisor <= 0.0 {
            return Err(ConfigError::bucket_map(format!(
                "gain_divisor must be finite and positive (got {})",
                gain_divisor
            )));
        }

        let mut previous_start = 0;
        for (i, bucket) in buckets.iter().enumerate() {
            if bucket.start_bin > max_bin {
                return Err(ConfigError::bucket_map(format!(
                    "bucket {} starts at bin {} beyond {}",
                    i, bucket.start_bin, max_bin
                )));
            }
            if bucket.start_bin < previous_start {
                return Err(ConfigError::bucket_map(format!(
                    "bucket {} start bin {} is below the previous start {}",
                    i, bucket.start_bin, previous_start
                )));
            }
            if !(0.0..=1.0).contains(&bucket.fraction) {
                return Err(ConfigError::bucket_map(format!(
                    "bucket {} fraction {} outside [0, 1]",
                    i, bucket.fraction
                )));
            }
            if !bucket.gain.is_finite() {
                return Err(ConfigError::bucket_map(format!(
                    "bucket {} gain is not finite",
                    i
                )));
            }
            previous_start = bucket.start_bin;
        }

        if end_bin < previous_start || end_bin > max_bin {
            return Err(ConfigError::bucket_map(format!(
                "end_bin {} must be within {}..={}",
                end_bin, previous_start, max_bin
            )));
        }

        let map = Self {
            revision: revision.into(),
            window_size,
            sample_rate: None,
            gain_divisor,
            end_bin,
            buckets,
        };

        for i in 0..map.buckets.len() {
            let start = map.buckets[i].start_bin;
            if start == map.next_bin(i) && start + 1 > max_bin {
                return Err(ConfigError::bucket_map(format!(
                    "bucket {} interpolates past the last bin {}",
                    i, max_bin
                )));
            }
        }

        Ok(map)
    }

    /// Load a bucket map from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|err| ConfigError::Parse {
            path: self.revision.clone(),
            reason: err.to_string(),
        })
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Record the sample rate the bins were laid out for
    pub fn with_sample_rate(mut self, sample_rate: Option<u32>) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Number of buckets, and length of every reduced spectrum
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn gain_divisor(&self) -> f32 {
        self.gain_divisor
    }

    pub fn end_bin(&self) -> usize {
        self.end_bin
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Start bin of the following bucket, or `end_bin` for the last one
    pub fn next_bin(&self, index: usize) -> usize {
        self.buckets
            .get(index + 1)
            .map(|b| b.start_bin)
            .unwrap_or(self.end_bin)
    }

    /// Reject a map built for a different window size
    pub fn ensure_window_size(&self, window_size: usize) -> Result<(), ConfigError> {
        if self.window_size != window_size {
            return Err(ConfigError::bucket_map(format!(
                "map '{}' was built for window {} but analysis uses {}",
                self.revision, self.window_size, window_size
            )));
        }
        Ok(())
    }

    /// Reject a map laid out for a different sample rate. A map that does
    /// not record its rate is accepted with a warning.
    pub fn ensure_sample_rate(&self, sample_rate: u32) -> Result<(), ConfigError> {
        match self.sample_rate {
            Some(rate) if rate != sample_rate => Err(ConfigError::bucket_map(format!(
                "map '{}' was laid out for {} Hz but input runs at {} Hz",
                self.revision, rate, sample_rate
            ))),
            Some(_) => Ok(()),
            None => {
                log::warn!(
                    "[Config] Bucket map '{}' has no sample_rate; assuming {} Hz",
                    self.revision,
                    sample_rate
                );
                Ok(())
            }
        }
    }
}

/// Parameters for a generated log-frequency bucket layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSpacedLayout {
    pub bucket_count: usize,
    pub min_hz: f32,
    pub max_hz: f32,
    pub gain_divisor: f32,
    /// Exponent of the high-frequency boost applied to bucket gains
    pub tilt: f32,
    pub revision: Option<String>,
}

impl Default for LogSpacedLayout {
    fn default() -> Self {
        Self {
            bucket_count: 256,
            min_hz: 40.0,
            max_hz: 16_000.0,
            gain_divisor: 10.0,
            tilt: 0.5,
            revision: None,
        }
    }
}

impl LogSpacedLayout {
    /// Build a validated map for the given window size and sample rate
    ///
    /// Bucket centres are spaced evenly in log frequency. Buckets that land
    /// inside one FFT bin interpolate between neighbours; wider ones sum
    /// their bins and have the gain divided by the number of bins covered.
    pub fn generate(&self, window_size: usize, sample_rate: u32) -> Result<BucketMap, ConfigError> {
        if self.bucket_count == 0 {
            return Err(ConfigError::invalid(
                "spectrum.bucket_map.bucket_count",
                "must be > 0",
            ));
        }
        if !(self.min_hz > 0.0 && self.min_hz < self.max_hz && self.max_hz.is_finite()) {
            return Err(ConfigError::invalid(
                "spectrum.bucket_map.min_hz",
                "must be positive and below max_hz",
            ));
        }
        if sample_rate == 0 || window_size < 4 || window_size % 2 != 0 {
            return Err(ConfigError::bucket_map(format!(
                "cannot lay out buckets for window {} at {} Hz",
                window_size, sample_rate
            )));
        }

        let max_bin = window_size / 2;
        let bin_hz = sample_rate as f32 / window_size as f32;
        let max_hz = self.max_hz.min(sample_rate as f32 / 2.0);
        let min_hz = self.min_hz.min(max_hz);
        let ratio = max_hz / min_hz;
        let count = self.bucket_count;

        let mut positions = Vec::with_capacity(count);
        for i in 0..count {
            let freq = min_hz * ratio.powf(i as f32 / count as f32);
            let pos = freq / bin_hz;
            let start = (pos.floor() as usize).min(max_bin - 1);
            let fraction = (pos - start as f32).clamp(0.0, 1.0);
            positions.push((freq, start, fraction));
        }

        let last_start = positions.last().map(|p| p.1).unwrap_or(0);
        let end_bin = ((max_hz / bin_hz).ceil() as usize)
            .min(max_bin)
            .max(last_start);

        let buckets = positions
            .iter()
            .enumerate()
            .map(|(i, &(freq, start, fraction))| {
                let next = positions.get(i + 1).map(|p| p.1).unwrap_or(end_bin);
                let covered = if start == next { 1 } else { next - start + 1 };
                let boost = (freq / min_hz).powf(self.tilt);
                Bucket {
                    start_bin: start,
                    fraction,
                    gain: self.gain_divisor * boost / covered as f32,
                }
            })
            .collect();

        let revision = self
            .revision
            .clone()
            .unwrap_or_else(|| format!("log{}-w{}-sr{}", count, window_size, sample_rate));

        BucketMap::new(revision, window_size, self.gain_divisor, end_bin, buckets)
            .map(|map| map.with_sample_rate(Some(sample_rate)))
    }
}

impl BucketMapSource {
    /// Resolve the configured source into a map for this window and rate
    pub fn load(&self, window_size: usize, sample_rate: u32) -> Result<BucketMap, ConfigError> {
        match self {
            BucketMapSource::File { path } => {
                let map = BucketMap::from_file(path)?;
                map.ensure_window_size(window_size)?;
                map.ensure_sample_rate(sample_rate)?;
                Ok(map)
            }
            BucketMapSource::LogSpaced(layout) => layout.generate(window_size, sample_rate),
        }
    }
}
