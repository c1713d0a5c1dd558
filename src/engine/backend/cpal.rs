//! CPAL input backend for live capture (Linux, macOS, Windows).
//!
//! Opens the named or default input device, converts whatever sample format
//! it offers to f32, keeps the first channel and hands the mono block to the
//! pipeline inside the callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use super::AudioBackend;
use crate::audio::CapturePipeline;
use crate::config::AudioConfig;
use crate::engine::{ShutdownReason, ShutdownSignal};
use crate::error::AudioError;

/// Names of the input devices on the default host
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceUnavailable {
            reason: format!("Failed to enumerate input devices: {}", e),
        })?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

pub struct CpalBackend {
    device: cpal::Device,
    device_name: String,
    stream_config: cpal::StreamConfig,
    sample_format: SampleFormat,
    max_block_frames: usize,
    stream: Option<cpal::Stream>,
}

impl CpalBackend {
    /// Open the configured input device without starting it
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = match &config.device {
            Some(name) => host
                .input_devices()
                .map_err(|e| AudioError::DeviceUnavailable {
                    reason: format!("Failed to enumerate input devices: {}", e),
                })?
                .find(|d| d.name().ok().as_deref() == Some(name.as_str()))
                .ok_or_else(|| AudioError::DeviceUnavailable {
                    reason: format!("No input device named '{}'", name),
                })?,
            None => host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceUnavailable {
                    reason: "No default input device found".to_string(),
                })?,
        };

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {}", e),
            })?;
        let sample_format = supported.sample_format();
        let mut stream_config: cpal::StreamConfig = supported.into();
        if let Some(frames) = config.period_frames {
            stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
        }

        let device_name = device.name().unwrap_or_else(|_| "unknown device".to_string());

        Ok(Self {
            device,
            device_name,
            stream_config,
            sample_format,
            max_block_frames: config.max_block_frames.max(1),
            stream: None,
        })
    }

    fn build_stream<T>(
        &self,
        pipeline: CapturePipeline,
        shutdown: ShutdownSignal,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: Sample + SizedSample,
        f32: FromSample<T>,
    {
        let channels = (self.stream_config.channels as usize).max(1);
        let max_block_frames = self.max_block_frames;
        let mut pipeline = pipeline;
        // Sized once; the callback only clears and refills it
        let mut mono: Vec<f32> = Vec::with_capacity(max_block_frames);

        self.device
            .build_input_stream(
                &self.stream_config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    for frames in data.chunks(max_block_frames * channels) {
                        mono.clear();
                        // De-interleave: take first channel
                        mono.extend(frames.chunks(channels).map(|frame| frame[0].to_sample::<f32>()));
                        pipeline.process_block(&mono);
                    }
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        tracing::error!("input device disconnected");
                        shutdown.trigger(ShutdownReason::DeviceLost(
                            "device no longer available".to_string(),
                        ));
                    }
                    other => tracing::warn!("input stream error: {}", other),
                },
                None,
            )
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("{}", e),
            })
    }
}

impl AudioBackend for CpalBackend {
    fn describe(&self) -> String {
        format!(
            "{} ({} ch, {:?})",
            self.device_name, self.stream_config.channels, self.sample_format
        )
    }

    fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    fn start(&mut self, pipeline: CapturePipeline, shutdown: ShutdownSignal) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(pipeline, shutdown)?,
            SampleFormat::I16 => self.build_stream::<i16>(pipeline, shutdown)?,
            SampleFormat::U16 => self.build_stream::<u16>(pipeline, shutdown)?,
            other => {
                return Err(AudioError::UnsupportedFormat {
                    format: format!("{:?}", other),
                })
            }
        };

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        tracing::info!(
            "Listening at {:.1} kHz on {}",
            self.sample_rate() as f32 / 1000.0,
            self.device_name
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        match self.stream.take() {
            // Dropping the stream stops the callback and frees the pipeline
            Some(stream) => {
                drop(stream);
                Ok(())
            }
            None => Err(AudioError::NotRunning),
        }
    }
}
