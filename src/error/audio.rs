// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes;

impl AudioErrorCodes {
    /// No usable input device
    pub const DEVICE_UNAVAILABLE: i32 = 1001;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1002;

    /// Device offers a sample format we cannot convert
    pub const UNSUPPORTED_FORMAT: i32 = 1003;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1004;

    /// Capture is already running
    pub const ALREADY_RUNNING: i32 = 1005;

    /// Capture is not running
    pub const NOT_RUNNING: i32 = 1006;

    /// Audio stream disconnected or feeder thread failed
    pub const STREAM_FAILURE: i32 = 1007;

    /// Replay input could not be read
    pub const INPUT_FILE: i32 = 1008;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Capture, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover device discovery, stream management and the offline
/// inputs that stand in for a device. All of them are startup or lifecycle
/// failures; nothing on the per-block path produces one.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No usable input device (none present, or the named one is missing)
    DeviceUnavailable { reason: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Device sample format cannot be converted to f32
    UnsupportedFormat { format: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Capture is already running
    AlreadyRunning,

    /// Capture is not running
    NotRunning,

    /// Stream or feeder thread failed unexpectedly
    StreamFailure { reason: String },

    /// Replay input could not be opened or decoded
    InputFile { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::InputFile { .. } => AudioErrorCodes::INPUT_FILE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::DeviceUnavailable { reason } => {
                format!("Input device unavailable: {}", reason)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::UnsupportedFormat { format } => {
                format!("Unsupported input sample format: {}", format)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::AlreadyRunning => {
                "Capture already running. Call stop() first.".to_string()
            }
            AudioError::NotRunning => "Capture not running. Call start() first.".to_string(),
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::InputFile { reason } => {
                format!("Failed to read input file: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::DeviceUnavailable {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::DEVICE_UNAVAILABLE
        );
        assert_eq!(
            AudioError::UnsupportedFormat {
                format: "I8".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            AudioError::AlreadyRunning.code(),
            AudioErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(AudioError::NotRunning.code(), AudioErrorCodes::NOT_RUNNING);
        assert_eq!(
            AudioError::InputFile {
                reason: "missing".to_string()
            }
            .code(),
            1008
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::DeviceUnavailable {
            reason: "no default input device".to_string(),
        };
        assert_eq!(
            err.message(),
            "Input device unavailable: no default input device"
        );

        let err = AudioError::AlreadyRunning;
        assert!(err.message().contains("already running"));

        let err = AudioError::HardwareError {
            details: "test error".to_string(),
        };
        assert_eq!(err.message(), "Hardware error: test error");
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::NotRunning;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }
}
