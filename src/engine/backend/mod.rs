//! Audio input backends.
//!
//! A backend owns the source of hardware blocks and drives a
//! [`CapturePipeline`] with them on its own thread: the cpal callback thread
//! for live input, a feeder thread for files and synthetic signals.

use crate::audio::CapturePipeline;
use crate::engine::ShutdownSignal;
use crate::error::AudioError;

/// Trait implemented by every input backend.
///
/// `start` moves the pipeline onto the backend's audio thread. A backend
/// that hits an unrecoverable stream error triggers `shutdown` itself.
pub trait AudioBackend {
    /// Human-readable input description for logs
    fn describe(&self) -> String;

    /// Sample rate the pipeline will be fed at
    fn sample_rate(&self) -> u32;

    fn start(&mut self, pipeline: CapturePipeline, shutdown: ShutdownSignal) -> Result<(), AudioError>;

    /// Stop delivering blocks and release the pipeline
    fn stop(&mut self) -> Result<(), AudioError>;
}

mod cpal;
mod feeder;
mod sources;

pub use self::cpal::{list_input_devices, CpalBackend};
pub use feeder::{BlockRead, BlockSource, FeederBackend, Pacing};
pub use sources::{SyntheticSource, SyntheticSpec, WavSource};
