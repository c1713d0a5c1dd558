//! Configuration loaded once at startup
//!
//! The whole pipeline is sized from this file: window and hop lengths, the
//! spectral emission interval, the bucket map, and the UDP destination.
//! Nothing here changes while audio is running.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::spectrum::LogSpacedLayout;

/// Default UDP port the lighting controller listens on
pub const DEFAULT_PORT: u16 = 3010;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub spectrum: SpectrumConfig,
    pub network: NetworkConfig,
    pub telemetry: TelemetryConfig,
}

/// Capture parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; the host default device when unset
    pub device: Option<String>,
    /// Requested hardware period in frames; device default when unset
    pub period_frames: Option<u32>,
    /// Staging capacity for one hardware block, in samples
    pub block_capacity: usize,
    /// Feed the whole zero-padded staging buffer when a block comes up short
    pub pad_short_blocks: bool,
    /// Largest mono block handed to the pipeline at once; longer device
    /// callbacks are split
    pub max_block_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            period_frames: None,
            block_capacity: 1024,
            pad_short_blocks: false,
            max_block_frames: 8192,
        }
    }
}

/// What to do with the rest of a hardware block once an onset fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetPolicy {
    /// Keep accumulating the remaining samples of the block
    Continue,
    /// Drop the remaining samples of the block
    DiscardBlockRemainder,
}

/// Per-window analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analysis window length W in samples
    pub window_size: usize,
    /// Samples between completed windows (1..=window_size)
    pub hop_size: usize,
    /// Minimum samples between two spectrum emissions
    pub spectrum_interval_samples: u64,
    /// Apply a Hann window before the FFT
    pub hann_window: bool,
    pub onset_policy: OnsetPolicy,
    pub onset: OnsetDetectionConfig,
    pub pitch: PitchConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            hop_size: 1024,
            spectrum_interval_samples: 1024,
            hann_window: true,
            onset_policy: OnsetPolicy::DiscardBlockRemainder,
            onset: OnsetDetectionConfig::default(),
            pitch: PitchConfig::default(),
        }
    }
}

/// Onset detection algorithm parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetDetectionConfig {
    pub enabled: bool,
    /// Added to the scaled median flux for adaptive thresholding
    pub threshold_offset: f32,
    /// Scales the median flux before the offset is added
    pub threshold_multiplier: f32,
    /// Number of past flux values the median is taken over
    pub history_len: usize,
    /// Minimum time between two onsets
    pub min_interval_ms: f32,
    /// Windows quieter than this never produce an onset
    pub silence_db: f32,
}

impl Default for OnsetDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_offset: 0.1,
            threshold_multiplier: 1.5,
            history_len: 16,
            min_interval_ms: 50.0,
            silence_db: -70.0,
        }
    }
}

/// Pitch estimation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub enabled: bool,
    /// YIN absolute threshold on the normalized difference function
    pub tolerance: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0.15,
            min_frequency_hz: 40.0,
            max_frequency_hz: 2000.0,
        }
    }
}

/// Where the bucket map comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketMapSource {
    /// Hand-tuned table stored as JSON
    File { path: PathBuf },
    /// Generated at startup from a log-frequency layout
    LogSpaced(LogSpacedLayout),
}

impl Default for BucketMapSource {
    fn default() -> Self {
        BucketMapSource::LogSpaced(LogSpacedLayout::default())
    }
}

/// Spectral reduction parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub bucket_map: BucketMapSource,
}

/// UDP destination and sender queue sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// Events that can wait between the audio callback and the sender
    pub queue_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            queue_capacity: 64,
        }
    }
}

impl NetworkConfig {
    pub fn destination(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Stats reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Seconds between pipeline counter reports; 0 disables them
    pub report_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let config: AppConfig =
            serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        config.validate()?;
        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    /// or unusable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "[Config] {} ({:?}). Using defaults.",
                    err,
                    path.as_ref()
                );
                Self::default()
            }
        }
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analysis = &self.analysis;
        if analysis.window_size < 4 || analysis.window_size % 2 != 0 {
            return Err(ConfigError::invalid(
                "analysis.window_size",
                format!("must be even and >= 4 (got {})", analysis.window_size),
            ));
        }
        if analysis.hop_size == 0 || analysis.hop_size > analysis.window_size {
            return Err(ConfigError::invalid(
                "analysis.hop_size",
                format!(
                    "must be within 1..={} (got {})",
                    analysis.window_size, analysis.hop_size
                ),
            ));
        }
        if analysis.spectrum_interval_samples == 0 {
            return Err(ConfigError::invalid(
                "analysis.spectrum_interval_samples",
                "must be > 0",
            ));
        }
        if analysis.onset.history_len == 0 {
            return Err(ConfigError::invalid(
                "analysis.onset.history_len",
                "must be > 0",
            ));
        }
        if !analysis.onset.min_interval_ms.is_finite() || analysis.onset.min_interval_ms < 0.0 {
            return Err(ConfigError::invalid(
                "analysis.onset.min_interval_ms",
                "must be a non-negative number",
            ));
        }
        let pitch = &analysis.pitch;
        if !(pitch.tolerance > 0.0 && pitch.tolerance < 1.0) {
            return Err(ConfigError::invalid(
                "analysis.pitch.tolerance",
                format!("must be within (0, 1) (got {})", pitch.tolerance),
            ));
        }
        if !(pitch.min_frequency_hz > 0.0 && pitch.min_frequency_hz < pitch.max_frequency_hz) {
            return Err(ConfigError::invalid(
                "analysis.pitch.min_frequency_hz",
                "must be positive and below max_frequency_hz",
            ));
        }

        let audio = &self.audio;
        if audio.block_capacity == 0 {
            return Err(ConfigError::invalid("audio.block_capacity", "must be > 0"));
        }
        if audio.max_block_frames == 0 {
            return Err(ConfigError::invalid("audio.max_block_frames", "must be > 0"));
        }
        if audio.period_frames == Some(0) {
            return Err(ConfigError::invalid("audio.period_frames", "must be > 0"));
        }

        let network = &self.network;
        if network.host.trim().is_empty() {
            return Err(ConfigError::invalid("network.host", "must not be empty"));
        }
        if network.port == 0 {
            return Err(ConfigError::invalid("network.port", "must be non-zero"));
        }
        if network.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "network.queue_capacity",
                "must be > 0",
            ));
        }

        Ok(())
    }
}
