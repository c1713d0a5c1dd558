//! Offline block sources: WAV replay and a synthetic test signal.

use std::f32::consts::PI;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::feeder::{BlockRead, BlockSource};
use crate::error::AudioError;

/// Replays the first channel of a WAV file
pub struct WavSource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
    name: String,
}

impl WavSource {
    pub fn open(path: &Path) -> Result<Self, AudioError> {
        let (samples, sample_rate) = read_wav(path)?;
        Ok(Self {
            samples,
            position: 0,
            sample_rate,
            name: path.display().to_string(),
        })
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
            name: "in-memory samples".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl BlockSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn describe(&self) -> String {
        format!("file {}", self.name)
    }

    fn read_into(&mut self, buffer: &mut [f32]) -> BlockRead {
        let remaining = self.samples.len().saturating_sub(self.position);
        if remaining == 0 {
            return BlockRead::Finished;
        }
        let count = remaining.min(buffer.len());
        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        BlockRead::Data {
            frames_written: count,
            finished: self.position >= self.samples.len(),
        }
    }
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::InputFile {
        reason: format!("failed to open {}: {err}", path.display()),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::InputFile {
            reason: format!("{} has zero channels", path.display()),
        });
    }
    let read_error = |err: hound::Error| AudioError::InputFile {
        reason: format!("error reading {}: {err}", path.display()),
    };

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(read_error))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|sample| sample.map(|v| v as f32 / i16::MAX as f32).map_err(read_error))
                .collect::<Result<Vec<f32>, _>>()?,
            bits @ (24 | 32) => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / scale).map_err(read_error))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            bits => {
                return Err(AudioError::UnsupportedFormat {
                    format: format!("{}-bit integer WAV ({})", bits, path.display()),
                })
            }
        },
    };

    let channels = spec.channels as usize;
    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved.chunks(channels).map(|frame| frame[0]).collect()
    };

    Ok((mono, spec.sample_rate))
}

/// Parameters of the synthetic test signal: a tone with periodic clicks and
/// a little noise, enough to exercise pitch, onset and spectrum paths.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub sample_rate: u32,
    /// Total length; `None` runs until stopped
    pub duration_secs: Option<f32>,
    pub tone_hz: f32,
    pub tone_amplitude: f32,
    /// Time between clicks; 0 disables them
    pub click_interval_ms: f32,
    pub click_amplitude: f32,
    pub noise_amplitude: f32,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            duration_secs: Some(5.0),
            tone_hz: 440.0,
            tone_amplitude: 0.3,
            click_interval_ms: 500.0,
            click_amplitude: 0.8,
            noise_amplitude: 0.01,
            seed: 0x5A5A_FFF0,
        }
    }
}

/// Length of one click burst in milliseconds
const CLICK_MS: f32 = 5.0;

pub struct SyntheticSource {
    spec: SyntheticSpec,
    rng: StdRng,
    phase: f32,
    total_frames: Option<u64>,
    frames_emitted: u64,
    click_interval: u64,
    click_len: u64,
}

impl SyntheticSource {
    pub fn new(spec: SyntheticSpec) -> Self {
        let sr = spec.sample_rate.max(1) as f32;
        let total_frames = spec
            .duration_secs
            .map(|secs| (secs.max(0.0) * sr).round() as u64);
        let click_interval = (spec.click_interval_ms.max(0.0) * sr / 1000.0) as u64;
        let click_len = ((CLICK_MS * sr / 1000.0) as u64).max(1);

        Self {
            rng: StdRng::seed_from_u64(spec.seed),
            spec,
            phase: 0.0,
            total_frames,
            frames_emitted: 0,
            click_interval,
            click_len,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let mut value = (2.0 * PI * self.phase).sin() * self.spec.tone_amplitude;
        self.phase += self.spec.tone_hz / self.spec.sample_rate.max(1) as f32;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        if self.click_interval > 0 {
            let offset = self.frames_emitted % self.click_interval;
            // First click lands one interval in, after some quiet history
            if self.frames_emitted >= self.click_interval && offset < self.click_len {
                let decay = 1.0 - offset as f32 / self.click_len as f32;
                value += self.spec.click_amplitude * decay;
            }
        }

        if self.spec.noise_amplitude > 0.0 {
            value += self
                .rng
                .gen_range(-self.spec.noise_amplitude..self.spec.noise_amplitude);
        }

        self.frames_emitted += 1;
        value.clamp(-1.0, 1.0)
    }
}

impl BlockSource for SyntheticSource {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn describe(&self) -> String {
        format!(
            "synthetic {:.0} Hz tone, clicks every {:.0} ms",
            self.spec.tone_hz, self.spec.click_interval_ms
        )
    }

    fn read_into(&mut self, buffer: &mut [f32]) -> BlockRead {
        let count = match self.total_frames {
            Some(total) => {
                let remaining = total.saturating_sub(self.frames_emitted);
                if remaining == 0 {
                    return BlockRead::Finished;
                }
                (remaining as usize).min(buffer.len())
            }
            None => buffer.len(),
        };

        for sample in &mut buffer[..count] {
            *sample = self.next_sample();
        }

        let finished = self
            .total_frames
            .is_some_and(|total| self.frames_emitted >= total);
        BlockRead::Data {
            frames_written: count,
            finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_source_blocks_and_tail() {
        let mut source = WavSource::from_samples((0..10).map(|v| v as f32).collect(), 8_000);
        let mut buffer = [0.0; 4];

        assert_eq!(
            source.read_into(&mut buffer),
            BlockRead::Data {
                frames_written: 4,
                finished: false
            }
        );
        assert_eq!(buffer, [0.0, 1.0, 2.0, 3.0]);
        source.read_into(&mut buffer);
        assert_eq!(
            source.read_into(&mut buffer),
            BlockRead::Data {
                frames_written: 2,
                finished: true
            }
        );
        assert_eq!(&buffer[..2], &[8.0, 9.0]);
        assert_eq!(source.read_into(&mut buffer), BlockRead::Finished);
    }

    #[test]
    fn test_wav_roundtrip_keeps_first_channel() {
        let path = std::env::temp_dir().join(format!("firemix-wav-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        {
            let mut writer = hound::WavWriter::create(&path, spec).unwrap();
            for i in 0..100 {
                writer.write_sample(i as i16 * 100).unwrap();
                writer.write_sample(-1000i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let source = WavSource::open(&path).unwrap();
        assert_eq!(source.sample_rate(), 22_050);
        assert_eq!(source.len(), 100);
        assert!(source.samples.iter().all(|s| *s >= 0.0));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_wav_is_input_error() {
        let err = WavSource::open(Path::new("/definitely/not/here.wav"))
            .err()
            .unwrap();
        assert!(matches!(err, AudioError::InputFile { .. }));
    }

    #[test]
    fn test_synthetic_duration() {
        let spec = SyntheticSpec {
            sample_rate: 1_000,
            duration_secs: Some(0.5),
            ..SyntheticSpec::default()
        };
        let mut source = SyntheticSource::new(spec);
        let mut buffer = [0.0; 128];
        let mut total = 0;
        loop {
            match source.read_into(&mut buffer) {
                BlockRead::Data {
                    frames_written,
                    finished,
                } => {
                    total += frames_written;
                    if finished {
                        break;
                    }
                }
                BlockRead::Finished => break,
            }
        }
        assert_eq!(total, 500);
    }

    #[test]
    fn test_synthetic_is_deterministic_and_bounded() {
        let mut a = SyntheticSource::new(SyntheticSpec::default());
        let mut b = SyntheticSource::new(SyntheticSpec::default());
        let mut buf_a = vec![0.0; 4096];
        let mut buf_b = vec![0.0; 4096];
        a.read_into(&mut buf_a);
        b.read_into(&mut buf_b);
        assert_eq!(buf_a, buf_b);
        assert!(buf_a.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}
